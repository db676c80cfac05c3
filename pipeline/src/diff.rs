//! Computes the minimal delta between a parsed snapshot and the cache.
//!
//! Per package: resolve it, canonicalize and stage its URLs, move its link
//! set toward the snapshot (append-only), and diff its dependency edges at
//! (dependency, type) granularity after collapsing duplicate declarations
//! to the single highest-priority type.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use canonical_url::canonical;
use postgres_db::ingest::{Delta, DependencyKey, PackageUrlKey, UserPackageKey};
use postgres_db::packages::{NewPackage, PackageUpdate};
use postgres_db::urls::NewUrl;
use postgres_db::users::NewUser;

use crate::cache::Cache;
use crate::config::Config;
use crate::normalized::{DependencyKind, NormalizedPackage};

pub fn diff_snapshot(
    config: &Config,
    cache: &Cache,
    snapshot: &[NormalizedPackage],
    now: DateTime<Utc>,
) -> Delta {
    let mut delta = Delta::default();

    // duplicate import ids in one snapshot would make the ingest upsert
    // touch the same row twice in one statement
    let mut seen_packages: HashSet<&str> = HashSet::with_capacity(snapshot.len());
    let snapshot_ids: HashSet<&str> = snapshot.iter().map(|p| p.import_id.as_str()).collect();

    let mut staged_urls: HashSet<(String, i64)> = HashSet::new();
    let mut staged_links: HashSet<(String, String, i64)> = HashSet::new();
    let mut staged_users: HashSet<&str> = HashSet::new();
    let mut staged_user_packages: HashSet<(String, String)> = HashSet::new();

    for pkg in snapshot {
        if !seen_packages.insert(pkg.import_id.as_str()) {
            log::warn!("duplicate import_id {} in snapshot, skipping", pkg.import_id);
            continue;
        }

        let cached = cache.package_map.get(&pkg.import_id);
        diff_package(config, cached, pkg, now, &mut delta);

        let resolved_urls = canonicalized_urls(config, pkg);
        diff_urls(cache, &resolved_urls, now, &mut staged_urls, &mut delta);
        diff_links(
            cache,
            pkg,
            cached.map(|c| c.id),
            &resolved_urls,
            &mut staged_links,
            &mut delta,
        );
        diff_dependencies(config, cache, pkg, &snapshot_ids, &mut delta);

        for username in &pkg.users {
            if staged_users.insert(username) {
                delta.new_users.push(NewUser {
                    username: username.clone(),
                    source_id: config.user_source_id,
                    created_at: now,
                });
            }
            if staged_user_packages.insert((username.clone(), pkg.import_id.clone())) {
                delta.new_user_packages.push(UserPackageKey {
                    username: username.clone(),
                    import_id: pkg.import_id.clone(),
                });
            }
        }
    }

    delta.sort();
    delta
}

fn diff_package(
    config: &Config,
    cached: Option<&crate::cache::CachedPackage>,
    pkg: &NormalizedPackage,
    now: DateTime<Utc>,
    delta: &mut Delta,
) {
    match cached {
        None => delta.new_packages.push(NewPackage {
            derived_id: format!("{}/{}", config.pm_name, pkg.import_id),
            name: pkg.name.clone(),
            package_manager_id: config.pm_id,
            import_id: pkg.import_id.clone(),
            readme: pkg.readme.clone(),
            created_at: now,
            updated_at: now,
        }),
        Some(row) => {
            // readme is the one mutable attribute the snapshot carries
            if row.readme != pkg.readme {
                delta.updated_packages.push(PackageUpdate {
                    id: row.id,
                    readme: pkg.readme.clone(),
                    updated_at: now,
                });
            }
        }
    }
}

// Canonical (url_type_id, url) pairs for one package; malformed URLs are
// dropped here and never abort a run.
fn canonicalized_urls(config: &Config, pkg: &NormalizedPackage) -> Vec<(i64, String)> {
    let mut resolved = Vec::with_capacity(pkg.urls.len());
    for (kind, raw) in &pkg.urls {
        if raw.is_empty() {
            continue;
        }
        match canonical(raw) {
            Ok(url) => resolved.push((kind.type_id(&config.url_types), url)),
            Err(e) => log::debug!("{}: dropping malformed url {:?}: {}", pkg.import_id, raw, e),
        }
    }
    resolved
}

fn diff_urls(
    cache: &Cache,
    resolved_urls: &[(i64, String)],
    now: DateTime<Utc>,
    staged_urls: &mut HashSet<(String, i64)>,
    delta: &mut Delta,
) {
    for (type_id, url) in resolved_urls {
        let key = (url.clone(), *type_id);
        if cache.url_map.contains_key(&key) || !staged_urls.insert(key) {
            continue;
        }
        delta.new_urls.push(NewUrl {
            url: url.clone(),
            url_type_id: *type_id,
            created_at: now,
            updated_at: now,
        });
    }
}

// Links move toward the snapshot but are never removed: URLs a source once
// advertised stay attached as history.
fn diff_links(
    cache: &Cache,
    pkg: &NormalizedPackage,
    package_id: Option<i64>,
    resolved_urls: &[(i64, String)],
    staged_links: &mut HashSet<(String, String, i64)>,
    delta: &mut Delta,
) {
    let existing = package_id.and_then(|id| cache.package_urls.get(&id));

    for (type_id, url) in resolved_urls {
        let already_linked = match (existing, cache.url_map.get(&(url.clone(), *type_id))) {
            (Some(links), Some(url_id)) => links.contains(url_id),
            _ => false,
        };
        if already_linked {
            continue;
        }
        if staged_links.insert((pkg.import_id.clone(), url.clone(), *type_id)) {
            delta.new_package_urls.push(PackageUrlKey {
                import_id: pkg.import_id.clone(),
                url: url.clone(),
                url_type_id: *type_id,
            });
        }
    }
}

fn diff_dependencies(
    config: &Config,
    cache: &Cache,
    pkg: &NormalizedPackage,
    snapshot_ids: &HashSet<&str>,
    delta: &mut Delta,
) {
    // collapse duplicate declarations to the highest-priority type
    let mut winners: HashMap<&str, (DependencyKind, Option<&str>)> = HashMap::new();
    for dep in &pkg.dependencies {
        if dep.import_id.is_empty() {
            continue;
        }
        let entry = winners
            .entry(dep.import_id.as_str())
            .or_insert((dep.kind, dep.semver_range.as_deref()));
        if dep.kind.priority() < entry.0.priority() {
            *entry = (dep.kind, dep.semver_range.as_deref());
        }
    }

    // resolvable endpoints only: in the store already, or staged this run
    let mut actual: HashMap<&str, (i64, Option<&str>)> = HashMap::with_capacity(winners.len());
    for (dep_import_id, (kind, semver)) in winners {
        if !cache.package_map.contains_key(dep_import_id) && !snapshot_ids.contains(dep_import_id)
        {
            log::warn!(
                "{}: dependency {} is neither in the store nor in the snapshot, dropping edge",
                pkg.import_id,
                dep_import_id
            );
            continue;
        }
        actual.insert(dep_import_id, (kind.type_id(&config.dependency_types), semver));
    }

    let package = cache.package_map.get(&pkg.import_id);
    let existing: HashMap<&str, i64> = package
        .and_then(|row| cache.dependencies.get(&row.id))
        .map(|edges| {
            edges
                .iter()
                .map(|(dep_id, type_id)| (cache.import_ids[dep_id].as_str(), *type_id))
                .collect()
        })
        .unwrap_or_default();

    // snapshot minus cache, at (dependency, type) granularity; a type
    // change therefore shows up as one remove plus one add
    for (dep_import_id, (type_id, semver)) in &actual {
        if existing.get(dep_import_id) == Some(type_id) {
            continue;
        }
        delta.new_deps.push(DependencyKey {
            import_id: pkg.import_id.clone(),
            dependency_import_id: dep_import_id.to_string(),
            dependency_type_id: *type_id,
            semver_range: semver.map(str::to_string),
        });
    }

    // cache minus snapshot; a surviving pair with a changed type is also
    // removed here (its replacement was staged above)
    if let Some(row) = package {
        if let Some(edges) = cache.dependencies.get(&row.id) {
            for (dep_id, type_id) in edges {
                let dep_import_id = cache.import_ids[dep_id].as_str();
                match actual.get(dep_import_id) {
                    Some((actual_type, _)) if actual_type == type_id => {}
                    _ => delta.removed_deps.push((row.id, *dep_id)),
                }
            }
        }
    }
}

// Only adapters whose upstream is an authoritative full dump may delete:
// everything cached but absent from the snapshot is gone upstream.
pub fn detect_deletions(cache: &Cache, snapshot: &[NormalizedPackage]) -> Vec<String> {
    let snapshot_ids: HashSet<&str> = snapshot.iter().map(|p| p.import_id.as_str()).collect();
    let mut missing: Vec<String> = cache
        .package_map
        .keys()
        .filter(|import_id| !snapshot_ids.contains(import_id.as_str()))
        .cloned()
        .collect();
    missing.sort_unstable();
    missing
}

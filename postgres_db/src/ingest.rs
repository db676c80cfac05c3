//! Atomic application of one pipeline run's delta.
//!
//! New links and dependency edges arrive keyed by import id / URL key
//! because their endpoints may be packages or URLs staged in the same run;
//! ids are resolved inside the transaction, after the upserts that create
//! them.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::connection::DbConnection;
use crate::packages::{NewPackage, PackageUpdate};
use crate::urls::NewUrl;
use crate::users::{NewUser, NewUserPackage};
use crate::{dependencies, load_history, package_urls, packages, urls, users, QueryRunner};

// A package-URL link whose endpoints may not have ids yet.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct PackageUrlKey {
    pub import_id: String,
    pub url: String,
    pub url_type_id: i64,
}

// A dependency edge whose endpoints may not have ids yet.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct DependencyKey {
    pub import_id: String,
    pub dependency_import_id: String,
    pub dependency_type_id: i64,
    pub semver_range: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct UserPackageKey {
    pub username: String,
    pub import_id: String,
}

#[derive(Debug, Default, PartialEq)]
pub struct Delta {
    pub new_packages: Vec<NewPackage>,
    pub updated_packages: Vec<PackageUpdate>,
    pub new_urls: Vec<NewUrl>,
    pub new_package_urls: Vec<PackageUrlKey>,
    pub new_deps: Vec<DependencyKey>,
    pub removed_deps: Vec<(i64, i64)>,
    pub new_users: Vec<NewUser>,
    pub new_user_packages: Vec<UserPackageKey>,
}

impl Delta {
    pub fn is_empty(&self) -> bool {
        self.new_packages.is_empty()
            && self.updated_packages.is_empty()
            && self.new_urls.is_empty()
            && self.new_package_urls.is_empty()
            && self.new_deps.is_empty()
            && self.removed_deps.is_empty()
            && self.new_users.is_empty()
            && self.new_user_packages.is_empty()
    }

    // Deterministic emission order: re-runs over identical input produce
    // byte-identical batches.
    pub fn sort(&mut self) {
        self.new_packages.sort_by(|a, b| a.import_id.cmp(&b.import_id));
        self.updated_packages.sort_by_key(|u| u.id);
        self.new_urls
            .sort_by(|a, b| (&a.url, a.url_type_id).cmp(&(&b.url, b.url_type_id)));
        self.new_package_urls.sort();
        self.new_deps.sort();
        self.removed_deps.sort_unstable();
        self.new_users.sort_by(|a, b| a.username.cmp(&b.username));
        self.new_user_packages.sort();
    }

    pub fn summary(&self) -> String {
        format!(
            "{} new packages, {} updated, {} new urls, {} new links, {} new deps, {} removed deps, {} users",
            self.new_packages.len(),
            self.updated_packages.len(),
            self.new_urls.len(),
            self.new_package_urls.len(),
            self.new_deps.len(),
            self.removed_deps.len(),
            self.new_users.len(),
        )
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct IngestCounts {
    pub packages_inserted: usize,
    pub packages_updated: usize,
    pub urls_inserted: usize,
    pub package_urls_inserted: usize,
    pub deps_inserted: usize,
    pub deps_removed: usize,
    pub users_inserted: usize,
    pub user_packages_inserted: usize,
}

// Applies the whole delta in one transaction; on any error nothing is
// visible. `known_packages` is the cache's import_id -> id map, used as the
// base for resolving edges against pre-existing packages.
pub fn ingest(
    conn: &mut DbConnection,
    pm_id: i64,
    known_packages: &HashMap<String, i64>,
    source_id: i64,
    delta: &Delta,
    now: DateTime<Utc>,
) -> Result<IngestCounts, diesel::result::Error> {
    conn.run_psql_transaction(|mut tx| {
        let mut counts = IngestCounts::default();

        // 1. packages first: everything else hangs off their ids
        let inserted: Vec<(String, i64)> = packages::upsert_new(&mut tx, &delta.new_packages)?;
        counts.packages_inserted = inserted.len();
        let mut package_ids: HashMap<&str, i64> = known_packages
            .iter()
            .map(|(import, id)| (import.as_str(), *id))
            .collect();
        for (import, id) in &inserted {
            package_ids.insert(import.as_str(), *id);
        }

        counts.packages_updated = packages::apply_updates(&mut tx, &delta.updated_packages)?;

        // 2. urls, then the key set needed to wire up links
        counts.urls_inserted = urls::insert_new(&mut tx, &delta.new_urls)?;
        let link_keys: Vec<(String, i64)> = delta
            .new_package_urls
            .iter()
            .map(|link| (link.url.clone(), link.url_type_id))
            .collect();
        let url_ids: HashMap<(String, i64), i64> = urls::ids_for_keys(&mut tx, &link_keys)?
            .into_iter()
            .map(|(u, t, id)| ((u, t), id))
            .collect();

        // 3. package-url links
        let mut link_rows = Vec::with_capacity(delta.new_package_urls.len());
        for link in &delta.new_package_urls {
            let package_id = match package_ids.get(link.import_id.as_str()) {
                Some(id) => *id,
                None => {
                    log::warn!("link for unknown package {}, skipping", link.import_id);
                    continue;
                }
            };
            let url_id = match url_ids.get(&(link.url.clone(), link.url_type_id)) {
                Some(id) => *id,
                None => {
                    log::warn!("link for unknown url {}, skipping", link.url);
                    continue;
                }
            };
            link_rows.push(package_urls::NewPackageUrl {
                package_id,
                url_id,
                created_at: now,
                updated_at: now,
            });
        }
        counts.package_urls_inserted = package_urls::insert_new(&mut tx, &link_rows)?;

        // 4. dependency edges: removals before inserts so a type change
        //    (remove + add of the same pair) lands cleanly
        counts.deps_removed = dependencies::delete_edges(&mut tx, &delta.removed_deps)?;

        let mut dep_rows = Vec::with_capacity(delta.new_deps.len());
        for edge in &delta.new_deps {
            let (package_id, dependency_id) = match (
                package_ids.get(edge.import_id.as_str()),
                package_ids.get(edge.dependency_import_id.as_str()),
            ) {
                (Some(p), Some(d)) => (*p, *d),
                _ => {
                    log::warn!(
                        "dependency {} -> {} has an unresolved endpoint, skipping",
                        edge.import_id,
                        edge.dependency_import_id
                    );
                    continue;
                }
            };
            dep_rows.push(dependencies::NewDependencyRow {
                package_id,
                dependency_id,
                dependency_type_id: edge.dependency_type_id,
                semver_range: edge.semver_range.clone(),
                created_at: now,
                updated_at: now,
            });
        }
        counts.deps_inserted = dependencies::insert_edges(&mut tx, &dep_rows)?;

        // 5. users and ownership links
        counts.users_inserted = users::insert_new(&mut tx, &delta.new_users)?;
        let usernames: Vec<String> = delta
            .new_user_packages
            .iter()
            .map(|up| up.username.clone())
            .collect();
        let user_ids: HashMap<String, i64> = users::ids_for_usernames(&mut tx, source_id, &usernames)?
            .into_iter()
            .collect();
        let mut user_package_rows = Vec::with_capacity(delta.new_user_packages.len());
        for up in &delta.new_user_packages {
            let (user_id, package_id) = match (
                user_ids.get(&up.username),
                package_ids.get(up.import_id.as_str()),
            ) {
                (Some(u), Some(p)) => (*u, *p),
                _ => continue,
            };
            user_package_rows.push(users::NewUserPackage {
                user_id,
                package_id,
                created_at: now,
            });
        }
        counts.user_packages_inserted = users::insert_user_packages(&mut tx, &user_package_rows)?;

        // 6. run marker
        load_history::insert(&mut tx, pm_id, now)?;

        Ok(counts)
    })
}

// Cascade delete for packages gone from an authoritative snapshot: edges on
// either side, links, ownership, canon membership, then the packages.
// Canons themselves are retained.
pub fn delete_packages_by_import_id(
    conn: &mut DbConnection,
    pm_id: i64,
    import_ids: &[String],
) -> Result<usize, diesel::result::Error> {
    use crate::schema::{canon_packages, dependencies, package_urls, packages, user_packages};
    use diesel::prelude::*;

    if import_ids.is_empty() {
        return Ok(0);
    }

    conn.run_psql_transaction(|mut tx| {
        let mut package_ids: Vec<i64> = Vec::with_capacity(import_ids.len());
        for chunk in import_ids.chunks(crate::CHUNK_SIZE) {
            let mut ids: Vec<i64> = tx.load(
                packages::table
                    .filter(
                        packages::package_manager_id
                            .eq(pm_id)
                            .and(packages::import_id.eq_any(chunk)),
                    )
                    .select(packages::id),
            )?;
            package_ids.append(&mut ids);
        }

        for chunk in package_ids.chunks(crate::CHUNK_SIZE) {
            tx.execute(diesel::delete(dependencies::table.filter(
                dependencies::package_id
                    .eq_any(chunk)
                    .or(dependencies::dependency_id.eq_any(chunk)),
            )))?;
            tx.execute(diesel::delete(
                package_urls::table.filter(package_urls::package_id.eq_any(chunk)),
            ))?;
            tx.execute(diesel::delete(
                user_packages::table.filter(user_packages::package_id.eq_any(chunk)),
            ))?;
            tx.execute(diesel::delete(
                canon_packages::table.filter(canon_packages::package_id.eq_any(chunk)),
            ))?;
            tx.execute(diesel::delete(
                packages::table.filter(packages::id.eq_any(chunk)),
            ))?;
        }

        Ok(package_ids.len())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_delta_reports_empty() {
        let delta = Delta::default();
        assert!(delta.is_empty());
    }

    #[test]
    fn sort_orders_every_set_by_natural_key() {
        let mut delta = Delta::default();
        delta.new_deps = vec![
            DependencyKey {
                import_id: "b".into(),
                dependency_import_id: "x".into(),
                dependency_type_id: 1,
                semver_range: None,
            },
            DependencyKey {
                import_id: "a".into(),
                dependency_import_id: "y".into(),
                dependency_type_id: 1,
                semver_range: None,
            },
        ];
        delta.removed_deps = vec![(3, 1), (1, 2)];
        delta.new_package_urls = vec![
            PackageUrlKey {
                import_id: "b".into(),
                url: "https://example.com/b".into(),
                url_type_id: 1,
            },
            PackageUrlKey {
                import_id: "a".into(),
                url: "https://example.com/a".into(),
                url_type_id: 1,
            },
        ];

        delta.sort();

        assert_eq!(delta.new_deps[0].import_id, "a");
        assert_eq!(delta.removed_deps, vec![(1, 2), (3, 1)]);
        assert_eq!(delta.new_package_urls[0].import_id, "a");
        assert!(!delta.is_empty());
    }
}

//! Canonical-project merge. Packages across ecosystems sharing a canonical
//! homepage URL collapse into one canon; a package follows its homepage, so
//! its canon can change between runs. Canons are never garbage-collected.

use std::collections::{HashMap, HashSet};

use chrono::Utc;

use canonical_url::canonical;
use postgres_db::canons::{NewCanon, NewCanonPackage};
use postgres_db::{canons, types, urls, DbConnection};

#[derive(Debug, Default, PartialEq, Eq)]
pub struct DedupePlan {
    // canonical homepage URLs with no canon yet, sorted
    pub new_canons: Vec<String>,
    // package -> target canon url, for packages whose link is missing or stale
    pub links: Vec<(i64, String)>,
}

impl DedupePlan {
    pub fn is_empty(&self) -> bool {
        self.new_canons.is_empty() && self.links.is_empty()
    }
}

// Pure planning step. `latest_homepages` must be ordered so the first row
// per package is its most recently updated homepage URL.
pub fn plan(
    current_canons: &HashMap<String, i64>,
    current_links: &HashMap<i64, i64>,
    latest_homepages: &[(i64, String)],
) -> DedupePlan {
    let mut plan = DedupePlan::default();

    let mut seen_packages: HashSet<i64> = HashSet::new();
    let mut staged_canons: HashSet<String> = HashSet::new();

    for (package_id, raw_url) in latest_homepages {
        if seen_packages.contains(package_id) {
            continue;
        }
        let canon_url = match canonical(raw_url) {
            Ok(url) => url,
            Err(e) => {
                log::debug!("dropping malformed homepage {:?}: {}", raw_url, e);
                continue;
            }
        };
        seen_packages.insert(*package_id);

        match current_canons.get(&canon_url) {
            None => {
                // a project nobody has merged yet
                if staged_canons.insert(canon_url.clone()) {
                    plan.new_canons.push(canon_url.clone());
                }
                plan.links.push((*package_id, canon_url));
            }
            Some(canon_id) => {
                if current_links.get(package_id) != Some(canon_id) {
                    plan.links.push((*package_id, canon_url));
                }
            }
        }
    }

    plan.new_canons.sort_unstable();
    plan.links.sort();
    plan
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct DedupeCounts {
    pub canons_created: usize,
    pub links_written: usize,
}

// Reads the current state, plans, and (unless dry_run) applies the plan in
// one transaction. Running twice over an unchanged store writes nothing the
// second time.
pub fn run(conn: &mut DbConnection, dry_run: bool) -> Result<DedupeCounts, diesel::result::Error> {
    let now = Utc::now();

    let homepage_type_id = types::get_or_create_url_type(conn, "homepage", now)?;
    let current_canons = canons::load_all(conn)?;
    let current_links = canons::load_canon_packages(conn)?;
    let latest_homepages = urls::load_homepages(conn, homepage_type_id)?;

    log::info!(
        "dedupe: {} canons, {} links, {} homepage rows",
        current_canons.len(),
        current_links.len(),
        latest_homepages.len()
    );

    let plan = plan(&current_canons, &current_links, &latest_homepages);
    log::info!(
        "dedupe: {} canons to create, {} links to write",
        plan.new_canons.len(),
        plan.links.len()
    );

    if dry_run {
        log::info!("dedupe: LOAD is not set, skipping writes");
        return Ok(DedupeCounts::default());
    }
    if plan.is_empty() {
        return Ok(DedupeCounts::default());
    }

    conn.run_psql_transaction(|mut tx| {
        let new_canon_rows: Vec<NewCanon> = plan
            .new_canons
            .iter()
            .map(|url| NewCanon {
                url: url.clone(),
                // pretty naming is the ranker's concern, not ours
                name: url.clone(),
                created_at: now,
                updated_at: now,
            })
            .collect();
        let canons_created = canons::insert_new(&mut tx, &new_canon_rows)?;

        let target_urls: Vec<String> = plan.links.iter().map(|(_, url)| url.clone()).collect();
        let canon_ids: HashMap<String, i64> = canons::ids_for_urls(&mut tx, &target_urls)?
            .into_iter()
            .collect();

        let mut link_rows = Vec::with_capacity(plan.links.len());
        for (package_id, canon_url) in &plan.links {
            match canon_ids.get(canon_url) {
                Some(canon_id) => link_rows.push(NewCanonPackage {
                    canon_id: *canon_id,
                    package_id: *package_id,
                    created_at: now,
                    updated_at: now,
                }),
                None => log::warn!("dedupe: canon for {} vanished, skipping link", canon_url),
            }
        }
        let links_written = canons::upsert_canon_packages(&mut tx, &link_rows)?;

        Ok(DedupeCounts {
            canons_created,
            links_written,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canons(entries: &[(&str, i64)]) -> HashMap<String, i64> {
        entries.iter().map(|(u, id)| (u.to_string(), *id)).collect()
    }

    #[test]
    fn two_ecosystems_one_project_one_canon() {
        // a crates package and a homebrew package share a homepage
        let homepages = vec![
            (1, "https://example.com/proj/".to_string()),
            (2, "https://example.com/proj".to_string()),
        ];
        let plan = plan(&HashMap::new(), &HashMap::new(), &homepages);

        assert_eq!(plan.new_canons, vec!["https://example.com/proj".to_string()]);
        assert_eq!(
            plan.links,
            vec![
                (1, "https://example.com/proj".to_string()),
                (2, "https://example.com/proj".to_string()),
            ]
        );
    }

    #[test]
    fn homepage_change_moves_the_package() {
        let current_canons = canons(&[("https://old.example", 10)]);
        let current_links: HashMap<i64, i64> = [(1, 10)].into_iter().collect();
        let homepages = vec![(1, "https://new.example".to_string())];

        let plan = plan(&current_canons, &current_links, &homepages);
        assert_eq!(plan.new_canons, vec!["https://new.example".to_string()]);
        assert_eq!(plan.links, vec![(1, "https://new.example".to_string())]);
    }

    #[test]
    fn reassignment_to_an_existing_canon() {
        let current_canons = canons(&[("https://old.example", 10), ("https://new.example", 11)]);
        let current_links: HashMap<i64, i64> = [(1, 10)].into_iter().collect();
        let homepages = vec![(1, "https://new.example".to_string())];

        let plan = plan(&current_canons, &current_links, &homepages);
        assert!(plan.new_canons.is_empty());
        assert_eq!(plan.links, vec![(1, "https://new.example".to_string())]);
    }

    #[test]
    fn unchanged_input_plans_nothing() {
        let current_canons = canons(&[("https://example.com/proj", 10)]);
        let current_links: HashMap<i64, i64> = [(1, 10), (2, 10)].into_iter().collect();
        let homepages = vec![
            (1, "https://example.com/proj/".to_string()),
            (2, "https://example.com/proj".to_string()),
        ];

        let plan = plan(&current_canons, &current_links, &homepages);
        assert!(plan.is_empty());
    }

    #[test]
    fn only_the_latest_homepage_counts() {
        // rows are ordered latest-first per package
        let homepages = vec![
            (1, "https://new.example".to_string()),
            (1, "https://old.example".to_string()),
        ];
        let plan = plan(&HashMap::new(), &HashMap::new(), &homepages);
        assert_eq!(plan.new_canons, vec!["https://new.example".to_string()]);
        assert_eq!(plan.links.len(), 1);
    }

    #[test]
    fn malformed_homepages_are_dropped() {
        let homepages = vec![
            (1, "ftp://example.com/x".to_string()),
            (1, "https://fallback.example".to_string()),
        ];
        let plan = plan(&HashMap::new(), &HashMap::new(), &homepages);
        // the malformed latest row does not shadow the older valid one
        assert_eq!(plan.new_canons, vec!["https://fallback.example".to_string()]);
    }
}

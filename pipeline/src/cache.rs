//! The in-memory projection of the store's current graph for one package
//! manager, used as the diff baseline. Read-only during a diff: mutations
//! live only in the delta.

use std::collections::{HashMap, HashSet};

use canonical_url::is_canonical;
use diesel::QueryResult;
use postgres_db::{dependencies, package_urls, packages, urls, DbConnection};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedPackage {
    pub id: i64,
    pub readme: Option<String>,
}

#[derive(Debug, Default)]
pub struct Cache {
    // ecosystem-local identifier -> current row
    pub package_map: HashMap<String, CachedPackage>,
    pub import_ids: HashMap<i64, String>,
    // canonical (url, url_type_id) -> url id; non-canonical store rows are
    // omitted so the diff never replicates them
    pub url_map: HashMap<(String, i64), i64>,
    pub package_urls: HashMap<i64, HashSet<i64>>,
    // package id -> dependency package id -> dependency type id
    pub dependencies: HashMap<i64, HashMap<i64, i64>>,
}

impl Cache {
    pub fn load(conn: &mut DbConnection, pm_id: i64) -> QueryResult<Cache> {
        let cache = Cache::from_rows(
            packages::load_for_package_manager(conn, pm_id)?,
            urls::load_for_package_manager(conn, pm_id)?,
            package_urls::load_for_package_manager(conn, pm_id)?,
            dependencies::load_for_package_manager(conn, pm_id)?,
        );
        log::info!(
            "cache loaded: {} packages, {} urls, {} link sets, {} dependency sets",
            cache.package_map.len(),
            cache.url_map.len(),
            cache.package_urls.len(),
            cache.dependencies.len(),
        );
        Ok(cache)
    }

    pub fn from_rows(
        package_rows: Vec<packages::Package>,
        url_rows: Vec<urls::Url>,
        link_rows: Vec<(i64, i64)>,
        dependency_rows: Vec<(i64, i64, i64, Option<String>)>,
    ) -> Cache {
        let mut cache = Cache::default();

        for package in package_rows {
            cache
                .import_ids
                .insert(package.id, package.import_id.clone());
            cache.package_map.insert(
                package.import_id,
                CachedPackage {
                    id: package.id,
                    readme: package.readme,
                },
            );
        }

        for url_row in url_rows {
            if !is_canonical(&url_row.url) {
                log::debug!("skipping non-canonical stored url {}", url_row.url);
                continue;
            }
            cache
                .url_map
                .insert((url_row.url, url_row.url_type_id), url_row.id);
        }

        for (package_id, url_id) in link_rows {
            cache
                .package_urls
                .entry(package_id)
                .or_default()
                .insert(url_id);
        }

        for (package_id, dependency_id, type_id, _semver) in dependency_rows {
            // both endpoints must be in package_map; cross-ecosystem edges
            // are not this pipeline's to diff
            if !cache.import_ids.contains_key(&dependency_id) {
                continue;
            }
            cache
                .dependencies
                .entry(package_id)
                .or_default()
                .insert(dependency_id, type_id);
        }

        cache
    }

    // import_id -> package id, the base map ingest extends with the ids of
    // packages staged in the same run
    pub fn package_ids(&self) -> HashMap<String, i64> {
        self.package_map
            .iter()
            .map(|(import_id, row)| (import_id.clone(), row.id))
            .collect()
    }
}

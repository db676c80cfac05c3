//! Parses each adapter's fixture snapshot, diffs it against an empty cache,
//! replays the delta into a fresh cache the way ingest would, and checks
//! that a second diff over the same snapshot is empty.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{TimeZone, Utc};
use test_case::test_case;

use pipeline::adapters::{crates, debian, homebrew, pkgx};
use pipeline::cache::Cache;
use pipeline::config::{Config, DependencyTypeIds, ExecConfig, UrlTypeIds};
use pipeline::diff::diff_snapshot;
use pipeline::run::SourceAdapter;
use postgres_db::ingest::Delta;
use postgres_db::{packages, urls};

fn config(pm_name: &str) -> Config {
    Config {
        pm_id: 7,
        pm_name: pm_name.to_string(),
        source_url: "http://unused".to_string(),
        user_source_id: 90,
        url_types: UrlTypeIds {
            homepage: 1,
            repository: 2,
            documentation: 3,
            source: 4,
        },
        dependency_types: DependencyTypeIds {
            runtime: 10,
            build: 11,
            test: 12,
            recommended: 13,
            optional: 14,
            uses_from_macos: 15,
        },
        exec: ExecConfig {
            fetch: false,
            no_cache: false,
            test: true,
            frequency_hours: 24,
            enable_scheduler: false,
            debug: false,
            data_root: PathBuf::from("data"),
        },
    }
}

fn fixture_dir(pm: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("test_data").join(pm)
}

// What ingest would leave behind, reconstructed without a database: new
// packages and URLs get sequential ids, links and edges resolve through
// them.
fn cache_after_ingest(delta: &Delta) -> Cache {
    let at = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

    let mut package_rows = Vec::new();
    let mut package_ids: HashMap<&str, i64> = HashMap::new();
    for (i, new_package) in delta.new_packages.iter().enumerate() {
        let id = i as i64 + 1;
        package_ids.insert(new_package.import_id.as_str(), id);
        package_rows.push(packages::Package {
            id,
            derived_id: new_package.derived_id.clone(),
            name: new_package.name.clone(),
            package_manager_id: new_package.package_manager_id,
            import_id: new_package.import_id.clone(),
            readme: new_package.readme.clone(),
            created_at: at,
            updated_at: at,
        });
    }

    let mut url_rows = Vec::new();
    let mut url_ids: HashMap<(&str, i64), i64> = HashMap::new();
    for (i, new_url) in delta.new_urls.iter().enumerate() {
        let id = i as i64 + 1000;
        url_ids.insert((new_url.url.as_str(), new_url.url_type_id), id);
        url_rows.push(urls::Url {
            id,
            url: new_url.url.clone(),
            url_type_id: new_url.url_type_id,
            created_at: at,
            updated_at: at,
        });
    }

    let link_rows: Vec<(i64, i64)> = delta
        .new_package_urls
        .iter()
        .map(|link| {
            (
                package_ids[link.import_id.as_str()],
                url_ids[&(link.url.as_str(), link.url_type_id)],
            )
        })
        .collect();

    let dependency_rows: Vec<(i64, i64, i64, Option<String>)> = delta
        .new_deps
        .iter()
        .map(|edge| {
            (
                package_ids[edge.import_id.as_str()],
                package_ids[edge.dependency_import_id.as_str()],
                edge.dependency_type_id,
                edge.semver_range.clone(),
            )
        })
        .collect();

    Cache::from_rows(package_rows, url_rows, link_rows, dependency_rows)
}

#[test_case(&crates::CratesAdapter ; "crates")]
#[test_case(&homebrew::HomebrewAdapter ; "homebrew")]
#[test_case(&debian::DebianAdapter ; "debian")]
#[test_case(&pkgx::PkgxAdapter ; "pkgx")]
fn snapshot_converges_after_one_ingest(adapter: &dyn SourceAdapter) {
    let config = config(adapter.package_manager());
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

    let snapshot = adapter
        .parse(&fixture_dir(adapter.package_manager()), &config)
        .unwrap();
    assert!(!snapshot.is_empty());

    let first = diff_snapshot(&config, &Cache::default(), &snapshot, now);
    assert!(!first.is_empty());

    let cache = cache_after_ingest(&first);
    let second = diff_snapshot(&config, &cache, &snapshot, now);
    // users are re-staged every run (their upsert is conflict-do-nothing);
    // the graph delta itself must be empty
    assert!(
        second.new_packages.is_empty()
            && second.updated_packages.is_empty()
            && second.new_urls.is_empty()
            && second.new_package_urls.is_empty()
            && second.new_deps.is_empty()
            && second.removed_deps.is_empty(),
        "{}: second diff not empty: {}",
        adapter.package_manager(),
        second.summary()
    );
}

#[test]
fn crates_fixture_delta_covers_every_entity() {
    let config = config("crates");
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    let snapshot = crates::CratesAdapter
        .parse(&fixture_dir("crates"), &config)
        .unwrap();

    let delta = diff_snapshot(&config, &Cache::default(), &snapshot, now);
    assert_eq!(delta.new_packages.len(), 3);
    assert!(delta.new_urls.iter().any(|u| u.url == "https://serde.rs"));
    assert!(!delta.new_package_urls.is_empty());
    assert_eq!(delta.new_deps.len(), 2);
    assert_eq!(delta.new_users.len(), 1);
    assert_eq!(delta.new_user_packages.len(), 1);
    assert!(delta.removed_deps.is_empty());
}

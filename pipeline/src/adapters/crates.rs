//! crates.io database dump adapter. The dump is a tarball of CSV files; the
//! parser walks crates.csv for identity and URLs, default_versions.csv to
//! find each crate's latest version, dependencies.csv (filtered to those
//! versions) for edges, and users.csv + crate_owners.csv for ownership.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use serde::Deserialize;

use crate::config::Config;
use crate::error::PipelineError;
use crate::fetcher::FetchKind;
use crate::normalized::{DependencyKind, NormalizedDependency, NormalizedPackage, UrlKind};
use crate::run::SourceAdapter;

use super::find_file;

pub struct CratesAdapter;

const OWNER_KIND_USER: i32 = 0;

#[derive(Debug, Deserialize)]
struct CrateRow {
    id: i64,
    name: String,
    #[serde(default)]
    readme: String,
    #[serde(default)]
    homepage: String,
    #[serde(default)]
    documentation: String,
    #[serde(default)]
    repository: String,
}

#[derive(Debug, Deserialize)]
struct DefaultVersionRow {
    crate_id: i64,
    version_id: i64,
}

#[derive(Debug, Deserialize)]
struct DependencyRow {
    version_id: i64,
    // the crate being depended on
    crate_id: i64,
    #[serde(default)]
    req: String,
    kind: i32,
}

#[derive(Debug, Deserialize)]
struct UserRow {
    id: i64,
    #[serde(default)]
    gh_login: String,
}

#[derive(Debug, Deserialize)]
struct CrateOwnerRow {
    crate_id: i64,
    owner_id: i64,
    owner_kind: i32,
}

impl SourceAdapter for CratesAdapter {
    fn package_manager(&self) -> &'static str {
        "crates"
    }

    fn default_source(&self) -> &'static str {
        "https://static.crates.io/db-dump.tar.gz"
    }

    fn fetch_kind(&self) -> FetchKind {
        FetchKind::Tarball
    }

    // the dump is the whole registry; absence means deletion
    fn authoritative(&self) -> bool {
        true
    }

    fn parse(
        &self,
        dir: &Path,
        _config: &Config,
    ) -> Result<Vec<NormalizedPackage>, PipelineError> {
        let mut packages: BTreeMap<i64, NormalizedPackage> = BTreeMap::new();
        let mut names: HashMap<i64, String> = HashMap::new();

        for row in read_csv::<CrateRow>(dir, "crates.csv")? {
            names.insert(row.id, row.name.clone());

            let mut urls = Vec::new();
            if !row.homepage.is_empty() {
                urls.push((UrlKind::Homepage, row.homepage));
            }
            if !row.documentation.is_empty() {
                urls.push((UrlKind::Documentation, row.documentation));
            }
            if !row.repository.is_empty() {
                if super::has_host(&row.repository, "github.com") {
                    urls.push((UrlKind::Source, row.repository.clone()));
                }
                urls.push((UrlKind::Repository, row.repository));
            }

            packages.insert(
                row.id,
                NormalizedPackage {
                    import_id: row.name.clone(),
                    name: row.name,
                    readme: if row.readme.is_empty() {
                        None
                    } else {
                        Some(row.readme)
                    },
                    urls,
                    dependencies: Vec::new(),
                    users: Vec::new(),
                },
            );
        }
        log::info!("crates: parsed {} crates", packages.len());

        // latest version per crate; only those versions' dependencies count
        let mut latest_versions: HashSet<i64> = HashSet::new();
        let mut crate_of_version: HashMap<i64, i64> = HashMap::new();
        for row in read_csv::<DefaultVersionRow>(dir, "default_versions.csv")? {
            latest_versions.insert(row.version_id);
            crate_of_version.insert(row.version_id, row.crate_id);
        }

        for row in read_csv::<DependencyRow>(dir, "dependencies.csv")? {
            if !latest_versions.contains(&row.version_id) {
                continue;
            }
            let crate_id = crate_of_version[&row.version_id];
            let kind = match row.kind {
                0 => DependencyKind::Runtime,
                1 => DependencyKind::Build,
                2 => DependencyKind::Test,
                other => {
                    log::warn!("crates: unknown dependency kind {}, skipping", other);
                    continue;
                }
            };
            let dep_name = match names.get(&row.crate_id) {
                Some(name) => name.clone(),
                None => {
                    log::warn!("crates: dependency on unknown crate id {}", row.crate_id);
                    continue;
                }
            };
            if let Some(pkg) = packages.get_mut(&crate_id) {
                pkg.dependencies.push(NormalizedDependency {
                    import_id: dep_name,
                    kind,
                    semver_range: if row.req.is_empty() {
                        None
                    } else {
                        Some(row.req)
                    },
                });
            }
        }

        let mut gh_logins: HashMap<i64, String> = HashMap::new();
        for row in read_csv::<UserRow>(dir, "users.csv")? {
            if !row.gh_login.is_empty() {
                gh_logins.insert(row.id, row.gh_login);
            }
        }
        for row in read_csv::<CrateOwnerRow>(dir, "crate_owners.csv")? {
            if row.owner_kind != OWNER_KIND_USER {
                continue;
            }
            if let (Some(pkg), Some(login)) =
                (packages.get_mut(&row.crate_id), gh_logins.get(&row.owner_id))
            {
                pkg.users.push(login.clone());
            }
        }

        Ok(packages.into_values().collect())
    }
}

fn read_csv<T: for<'de> Deserialize<'de>>(
    dir: &Path,
    file_name: &str,
) -> Result<Vec<T>, PipelineError> {
    let path = find_file(dir, file_name)?;
    let mut reader = csv::Reader::from_path(&path)?;
    let mut rows = Vec::new();
    for record in reader.deserialize() {
        match record {
            Ok(row) => rows.push(row),
            // malformed upstream record: skip it, keep the run alive
            Err(e) => log::warn!("{}: skipping malformed row: {}", file_name, e),
        }
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::tests::{test_config, test_data_dir};

    #[test]
    fn parses_fixture_dump() {
        let config = test_config();
        let snapshot = CratesAdapter
            .parse(&test_data_dir("crates"), &config)
            .unwrap();

        assert_eq!(snapshot.len(), 3);

        let serde = snapshot.iter().find(|p| p.import_id == "serde").unwrap();
        assert_eq!(serde.name, "serde");
        assert!(serde
            .urls
            .contains(&(UrlKind::Homepage, "https://serde.rs/".to_string())));
        // a github repository doubles as the source url
        assert!(serde
            .urls
            .iter()
            .any(|(kind, _)| *kind == UrlKind::Source));
        assert_eq!(serde.users, vec!["dtolnay".to_string()]);

        // only the latest version's dependencies are kept
        let deps: Vec<&str> = serde
            .dependencies
            .iter()
            .map(|d| d.import_id.as_str())
            .collect();
        assert_eq!(deps, vec!["proc-macro2"]);
        assert_eq!(serde.dependencies[0].kind, DependencyKind::Runtime);
        assert_eq!(serde.dependencies[0].semver_range.as_deref(), Some("^1"));

        // teams are not users
        let itoa = snapshot.iter().find(|p| p.import_id == "itoa").unwrap();
        assert!(itoa.users.is_empty());
    }
}

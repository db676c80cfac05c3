//! Homebrew adapter. The formula API is one JSON document listing every
//! formula; deprecated formulae are skipped. The head URL generally points
//! at the development repository, with the stable tarball as backstop.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::config::Config;
use crate::error::PipelineError;
use crate::fetcher::FetchKind;
use crate::normalized::{DependencyKind, NormalizedDependency, NormalizedPackage, UrlKind};
use crate::run::SourceAdapter;

use super::find_file;

pub struct HomebrewAdapter;

pub const FORMULA_FILE: &str = "formula.json";

#[derive(Debug, Deserialize)]
struct Formula {
    name: String,
    #[serde(default)]
    desc: Option<String>,
    #[serde(default)]
    homepage: String,
    #[serde(default)]
    urls: FormulaUrls,
    #[serde(default)]
    deprecated: bool,
    #[serde(default)]
    dependencies: Vec<String>,
    #[serde(default)]
    build_dependencies: Vec<String>,
    #[serde(default)]
    test_dependencies: Vec<String>,
    #[serde(default)]
    recommended_dependencies: Vec<String>,
    #[serde(default)]
    optional_dependencies: Vec<String>,
    #[serde(default)]
    uses_from_macos: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct FormulaUrls {
    #[serde(default)]
    stable: Option<FormulaUrl>,
    #[serde(default)]
    head: Option<FormulaUrl>,
}

#[derive(Debug, Deserialize)]
struct FormulaUrl {
    #[serde(default)]
    url: String,
}

impl SourceAdapter for HomebrewAdapter {
    fn package_manager(&self) -> &'static str {
        "homebrew"
    }

    fn default_source(&self) -> &'static str {
        "https://formulae.brew.sh/api/formula.json"
    }

    fn fetch_kind(&self) -> FetchKind {
        FetchKind::File {
            file_name: FORMULA_FILE,
        }
    }

    // the API reflects only current formulae; absent packages are kept
    fn authoritative(&self) -> bool {
        false
    }

    fn parse(
        &self,
        dir: &Path,
        _config: &Config,
    ) -> Result<Vec<NormalizedPackage>, PipelineError> {
        let path = find_file(dir, FORMULA_FILE)?;
        let body = fs::read_to_string(path)?;
        let formulae: Vec<Formula> =
            serde_json::from_str(&body).map_err(|e| PipelineError::Parse(e.to_string()))?;

        let mut snapshot = Vec::with_capacity(formulae.len());
        for formula in formulae {
            if formula.deprecated {
                continue;
            }

            let mut urls = Vec::new();
            if !formula.homepage.is_empty() {
                urls.push((UrlKind::Homepage, formula.homepage));
            }
            // head over stable: head generally points at the forge
            let source = formula
                .urls
                .head
                .as_ref()
                .or(formula.urls.stable.as_ref())
                .map(|u| u.url.clone())
                .unwrap_or_default();
            if !source.is_empty() {
                if super::has_host(&source, "github.com") || super::has_host(&source, "gitlab.com")
                {
                    urls.push((UrlKind::Repository, source.clone()));
                }
                urls.push((UrlKind::Source, source));
            }

            let mut dependencies = Vec::new();
            let groups = [
                (&formula.dependencies, DependencyKind::Runtime),
                (&formula.build_dependencies, DependencyKind::Build),
                (&formula.test_dependencies, DependencyKind::Test),
                (&formula.recommended_dependencies, DependencyKind::Recommended),
                (&formula.optional_dependencies, DependencyKind::Optional),
            ];
            for (names, kind) in groups {
                for dep in names {
                    if dep.is_empty() {
                        continue;
                    }
                    dependencies.push(NormalizedDependency {
                        import_id: dep.clone(),
                        kind,
                        semver_range: None,
                    });
                }
            }
            // entries are either "zlib" or {"zlib": "build"}
            for entry in &formula.uses_from_macos {
                let name = match entry {
                    Value::String(s) => Some(s.clone()),
                    Value::Object(map) => map.keys().next().cloned(),
                    _ => None,
                };
                if let Some(name) = name {
                    dependencies.push(NormalizedDependency {
                        import_id: name,
                        kind: DependencyKind::UsesFromMacos,
                        semver_range: None,
                    });
                }
            }

            snapshot.push(NormalizedPackage {
                import_id: formula.name.clone(),
                name: formula.name,
                readme: formula.desc.filter(|d| !d.is_empty()),
                urls,
                dependencies,
                users: Vec::new(),
            });
        }

        log::info!("homebrew: parsed {} formulae", snapshot.len());
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::tests::{test_config, test_data_dir};

    #[test]
    fn parses_fixture_formulae() {
        let config = test_config();
        let snapshot = HomebrewAdapter
            .parse(&test_data_dir("homebrew"), &config)
            .unwrap();

        // the deprecated formula is dropped
        assert_eq!(snapshot.len(), 2);

        let jq = snapshot.iter().find(|p| p.import_id == "jq").unwrap();
        assert_eq!(jq.readme.as_deref(), Some("Lightweight JSON processor"));
        assert!(jq
            .urls
            .contains(&(UrlKind::Homepage, "https://jqlang.github.io/jq/".to_string())));
        // head url wins over stable and doubles as the repository
        assert!(jq.urls.contains(&(
            UrlKind::Source,
            "https://github.com/jqlang/jq.git".to_string()
        )));
        assert!(jq
            .urls
            .iter()
            .any(|(kind, _)| *kind == UrlKind::Repository));

        let kinds: Vec<(&str, DependencyKind)> = jq
            .dependencies
            .iter()
            .map(|d| (d.import_id.as_str(), d.kind))
            .collect();
        assert!(kinds.contains(&("oniguruma", DependencyKind::Runtime)));
        assert!(kinds.contains(&("autoconf", DependencyKind::Build)));
        assert!(kinds.contains(&("zlib", DependencyKind::UsesFromMacos)));
    }
}

//! pkgx pantry adapter. The pantry is a git repository of
//! `projects/<import-id>/package.yml` files with wildly varying shapes, so
//! the parser navigates serde_yaml Values instead of a fixed struct.

use std::path::Path;

use serde_yaml::Value;
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::PipelineError;
use crate::fetcher::FetchKind;
use crate::normalized::{DependencyKind, NormalizedDependency, NormalizedPackage, UrlKind};
use crate::run::SourceAdapter;

pub struct PkgxAdapter;

const PROJECTS_DIR: &str = "projects";
const PACKAGE_FILE: &str = "package.yml";

impl SourceAdapter for PkgxAdapter {
    fn package_manager(&self) -> &'static str {
        "pkgx"
    }

    fn default_source(&self) -> &'static str {
        "https://github.com/pkgxdev/pantry"
    }

    fn fetch_kind(&self) -> FetchKind {
        FetchKind::GitClone
    }

    // the pantry clone is the whole universe of pkgx projects
    fn authoritative(&self) -> bool {
        true
    }

    fn parse(
        &self,
        dir: &Path,
        _config: &Config,
    ) -> Result<Vec<NormalizedPackage>, PipelineError> {
        let projects_root = dir.join(PROJECTS_DIR);
        let mut snapshot = Vec::new();

        for entry in WalkDir::new(&projects_root)
            .follow_links(true)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| PipelineError::Parse(e.to_string()))?;
            if !entry.file_type().is_file() || entry.file_name() != PACKAGE_FILE {
                continue;
            }

            let import_id = entry
                .path()
                .parent()
                .and_then(|p| p.strip_prefix(&projects_root).ok())
                .map(|p| p.to_string_lossy().replace('\\', "/"))
                .unwrap_or_default();
            if import_id.is_empty() {
                continue;
            }

            let body = std::fs::read_to_string(entry.path())?;
            match serde_yaml::from_str::<Value>(&body) {
                Ok(doc) => snapshot.push(project_to_package(&import_id, &doc)),
                Err(e) => log::warn!("pkgx: {} does not parse, skipping: {}", import_id, e),
            }
        }

        log::info!("pkgx: parsed {} projects", snapshot.len());
        Ok(snapshot)
    }
}

fn project_to_package(import_id: &str, doc: &Value) -> NormalizedPackage {
    let mut pkg = NormalizedPackage {
        import_id: import_id.to_string(),
        name: import_id.to_string(),
        ..Default::default()
    };

    if let Some(description) = doc.get("description").and_then(Value::as_str) {
        pkg.readme = Some(description.to_string());
    }

    if let Some(homepage) = guess_homepage(import_id) {
        pkg.urls.push((UrlKind::Homepage, homepage));
    }
    if let Some(distributable) = doc
        .get("distributable")
        .and_then(|d| d.get("url"))
        .and_then(Value::as_str)
    {
        if super::has_host(distributable, "github.com") {
            pkg.urls
                .push((UrlKind::Repository, distributable.to_string()));
        }
        pkg.urls.push((UrlKind::Source, distributable.to_string()));
    }

    collect_dependencies(doc.get("dependencies"), DependencyKind::Runtime, &mut pkg);
    collect_dependencies(
        doc.get("build").and_then(|b| b.get("dependencies")),
        DependencyKind::Build,
        &mut pkg,
    );
    collect_dependencies(
        doc.get("test").and_then(|t| t.get("dependencies")),
        DependencyKind::Test,
        &mut pkg,
    );

    pkg
}

// A dependency map's keys are other projects' import ids; platform keys
// (linux, darwin, ...) nest another map of the same shape.
fn collect_dependencies(value: Option<&Value>, kind: DependencyKind, pkg: &mut NormalizedPackage) {
    let Some(Value::Mapping(map)) = value else {
        return;
    };
    for (key, val) in map {
        let Some(name) = key.as_str() else { continue };
        if let Value::Mapping(_) = val {
            collect_dependencies(Some(val), kind, pkg);
            continue;
        }
        let semver_range = match val {
            Value::String(s) if !s.is_empty() && s != "*" => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        };
        pkg.dependencies.push(NormalizedDependency {
            import_id: name.to_string(),
            kind,
            semver_range,
        });
    }
}

// The pantry has no homepage field; the import id itself usually is one.
// Domain-only ids ("zlib.net") and forge paths ("github.com/cli/cli") are
// addresses; registry ids get registry-specific spellings.
fn guess_homepage(import_id: &str) -> Option<String> {
    let slashes = import_id.matches('/').count();

    if let Some(name) = import_id.strip_prefix("crates.io/") {
        return Some(format!("https://crates.io/crates/{}", name));
    }
    if import_id.starts_with("x.org") {
        return Some("https://x.org".to_string());
    }
    if let Some(tool) = import_id.strip_prefix("pkgx.sh/") {
        return Some(format!("https://github.com/pkgxdev/pkgm/{}", tool));
    }
    if slashes == 0 || slashes >= 2 {
        return Some(format!("https://{}", import_id));
    }

    log::debug!("pkgx: no homepage rule for {}", import_id);
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::tests::{test_config, test_data_dir};

    #[test]
    fn parses_fixture_pantry() {
        let config = test_config();
        let snapshot = PkgxAdapter.parse(&test_data_dir("pkgx"), &config).unwrap();

        // sorted walk: deterministic order
        let ids: Vec<&str> = snapshot.iter().map(|p| p.import_id.as_str()).collect();
        assert_eq!(ids, vec!["crates.io/ripgrep", "zlib.net"]);

        let ripgrep = &snapshot[0];
        assert!(ripgrep.urls.contains(&(
            UrlKind::Homepage,
            "https://crates.io/crates/ripgrep".to_string()
        )));
        assert!(ripgrep
            .urls
            .iter()
            .any(|(kind, _)| *kind == UrlKind::Source));

        let zlib = &snapshot[1];
        assert!(zlib
            .urls
            .contains(&(UrlKind::Homepage, "https://zlib.net".to_string())));

        // platform sub-maps flatten into the same dependency group
        let deps: Vec<(&str, DependencyKind)> = ripgrep
            .dependencies
            .iter()
            .map(|d| (d.import_id.as_str(), d.kind))
            .collect();
        assert!(deps.contains(&("pcre.org", DependencyKind::Runtime)));
        assert!(deps.contains(&("rust-lang.org", DependencyKind::Build)));
    }

    #[test]
    fn homepage_rules() {
        assert_eq!(guess_homepage("zlib.net"), Some("https://zlib.net".into()));
        assert_eq!(
            guess_homepage("github.com/cli/cli"),
            Some("https://github.com/cli/cli".into())
        );
        assert_eq!(
            guess_homepage("crates.io/ripgrep"),
            Some("https://crates.io/crates/ripgrep".into())
        );
        assert_eq!(
            guess_homepage("pkgx.sh/brewkit"),
            Some("https://github.com/pkgxdev/pkgm/brewkit".into())
        );
        assert_eq!(guess_homepage("example.org/tool"), None);
    }
}

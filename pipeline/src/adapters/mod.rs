pub mod crates;
pub mod debian;
pub mod homebrew;
pub mod pkgx;

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::PipelineError;

// Dumps nest their payload under changing directory names (the crates dump
// puts everything under <date>/data/); locate a file by name instead of
// hard-coding the layout.
pub(crate) fn find_file(dir: &Path, file_name: &str) -> Result<PathBuf, PipelineError> {
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry.map_err(|e| PipelineError::Parse(e.to_string()))?;
        if entry.file_type().is_file() && entry.file_name() == file_name {
            return Ok(entry.path().to_path_buf());
        }
    }
    Err(PipelineError::Parse(format!(
        "{} not found under {}",
        file_name,
        dir.display()
    )))
}

// Forge detection runs on the canonical form so hosts like
// "notgithub.com" do not sneak through a substring check.
pub(crate) fn has_host(raw: &str, host: &str) -> bool {
    match canonical_url::canonical(raw) {
        Ok(c) => c
            .split_once("://")
            .map(|(_, rest)| rest == host || rest.starts_with(&format!("{}/", host)))
            .unwrap_or(false),
        Err(_) => false,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::path::PathBuf;

    use crate::config::{Config, DependencyTypeIds, ExecConfig, UrlTypeIds};

    pub fn test_data_dir(pm: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("test_data")
            .join(pm)
    }

    #[test]
    fn has_host_matches_hosts_not_substrings() {
        assert!(super::has_host("https://github.com/a/b.git", "github.com"));
        assert!(super::has_host("http://github.com/a/b", "github.com"));
        assert!(!super::has_host("https://notgithub.com/a/b", "github.com"));
        assert!(!super::has_host("https://example.com/github.com/b", "github.com"));
        assert!(!super::has_host("not a url", "github.com"));
    }

    pub fn test_config() -> Config {
        Config {
            pm_id: 1,
            pm_name: "testpm".to_string(),
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
}

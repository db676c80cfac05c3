//! Debian adapter. The Packages index is RFC822-style paragraphs separated
//! by blank lines; continuation lines start with whitespace. No ecosystem
//! crate covers the format, so the paragraph walk is hand-rolled.

use std::fs;
use std::path::Path;

use crate::config::Config;
use crate::error::PipelineError;
use crate::fetcher::FetchKind;
use crate::normalized::{DependencyKind, NormalizedDependency, NormalizedPackage, UrlKind};
use crate::run::SourceAdapter;

use super::find_file;

pub struct DebianAdapter;

pub const PACKAGES_FILE: &str = "Packages";

impl SourceAdapter for DebianAdapter {
    fn package_manager(&self) -> &'static str {
        "debian"
    }

    fn default_source(&self) -> &'static str {
        "http://deb.debian.org/debian/dists/stable/main/binary-amd64/Packages.gz"
    }

    fn fetch_kind(&self) -> FetchKind {
        FetchKind::Gzip {
            file_name: PACKAGES_FILE,
        }
    }

    // one suite's index is not the whole archive; absent packages are kept
    fn authoritative(&self) -> bool {
        false
    }

    fn parse(
        &self,
        dir: &Path,
        _config: &Config,
    ) -> Result<Vec<NormalizedPackage>, PipelineError> {
        let path = find_file(dir, PACKAGES_FILE)?;
        let content = fs::read_to_string(path)?;

        let mut snapshot = Vec::new();
        for paragraph in content.split("\n\n") {
            if paragraph.trim().is_empty() {
                continue;
            }
            match parse_paragraph(paragraph) {
                Some(pkg) => snapshot.push(pkg),
                None => log::warn!("debian: paragraph without a Package field, skipping"),
            }
        }

        log::info!("debian: parsed {} packages", snapshot.len());
        Ok(snapshot)
    }
}

fn parse_paragraph(paragraph: &str) -> Option<NormalizedPackage> {
    let mut pkg = NormalizedPackage::default();

    let mut current_field: Option<(String, String)> = None;
    for line in paragraph.lines() {
        if line.trim().is_empty() {
            continue;
        }
        // leading whitespace continues the previous field
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some((_, value)) = current_field.as_mut() {
                value.push(' ');
                value.push_str(line.trim());
            }
            continue;
        }
        if let Some((field, value)) = current_field.take() {
            apply_field(&mut pkg, &field, &value);
        }
        if let Some((key, value)) = line.split_once(':') {
            current_field = Some((key.trim().to_string(), value.trim().to_string()));
        }
    }
    if let Some((field, value)) = current_field.take() {
        apply_field(&mut pkg, &field, &value);
    }

    if pkg.import_id.is_empty() {
        return None;
    }
    Some(pkg)
}

fn apply_field(pkg: &mut NormalizedPackage, field: &str, value: &str) {
    match field {
        "Package" => {
            pkg.import_id = value.to_string();
            pkg.name = value.to_string();
        }
        "Description" => pkg.readme = Some(value.to_string()),
        "Homepage" => pkg.urls.push((UrlKind::Homepage, value.to_string())),
        "Vcs-Browser" => pkg.urls.push((UrlKind::Repository, value.to_string())),
        "Vcs-Git" => pkg.urls.push((UrlKind::Source, value.to_string())),
        "Depends" | "Pre-Depends" => push_dependencies(pkg, value, DependencyKind::Runtime),
        "Build-Depends" => push_dependencies(pkg, value, DependencyKind::Build),
        "Recommends" => push_dependencies(pkg, value, DependencyKind::Recommended),
        "Suggests" => push_dependencies(pkg, value, DependencyKind::Optional),
        _ => {}
    }
}

// "libc6 (>= 2.34) [amd64] | libc6.1" -> first alternative, name split from
// its version constraint, arch qualifiers and :any suffixes dropped
fn push_dependencies(pkg: &mut NormalizedPackage, value: &str, kind: DependencyKind) {
    for clause in value.split(',') {
        let clause = clause.trim();
        if clause.is_empty() {
            continue;
        }
        let first_alternative = clause.split('|').next().unwrap_or("").trim();

        let mut name = first_alternative;
        let mut semver_range = None;
        if let Some(open) = first_alternative.find('(') {
            name = first_alternative[..open].trim();
            if let Some(close) = first_alternative.find(')') {
                semver_range = Some(first_alternative[open + 1..close].trim().to_string());
            }
        }
        if let Some(bracket) = name.find('[') {
            name = name[..bracket].trim();
        }
        let name = name.split(':').next().unwrap_or("").trim();
        if name.is_empty() {
            continue;
        }

        pkg.dependencies.push(NormalizedDependency {
            import_id: name.to_string(),
            kind,
            semver_range,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::tests::{test_config, test_data_dir};

    #[test]
    fn parses_fixture_index() {
        let config = test_config();
        let snapshot = DebianAdapter
            .parse(&test_data_dir("debian"), &config)
            .unwrap();

        assert_eq!(snapshot.len(), 2);

        let curl = snapshot.iter().find(|p| p.import_id == "curl").unwrap();
        assert_eq!(
            curl.readme.as_deref(),
            Some("command line tool for transferring data with URL syntax")
        );
        assert!(curl.urls.contains(&(
            UrlKind::Homepage,
            "https://curl.se/".to_string()
        )));

        let runtime_deps: Vec<&str> = curl
            .dependencies
            .iter()
            .filter(|d| d.kind == DependencyKind::Runtime)
            .map(|d| d.import_id.as_str())
            .collect();
        // alternatives collapse to their first member; arch lists drop
        assert_eq!(runtime_deps, vec!["libc6", "libcurl4", "zlib1g"]);
        assert_eq!(
            curl.dependencies[0].semver_range.as_deref(),
            Some(">= 2.34")
        );
        assert!(curl
            .dependencies
            .iter()
            .any(|d| d.import_id == "ca-certificates" && d.kind == DependencyKind::Recommended));
    }

    #[test]
    fn continuation_lines_fold_into_the_field() {
        let paragraph = "Package: demo\nDepends: a,\n b (>= 1.0),\n c\n";
        let pkg = parse_paragraph(paragraph).unwrap();
        let names: Vec<&str> = pkg
            .dependencies
            .iter()
            .map(|d| d.import_id.as_str())
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }
}

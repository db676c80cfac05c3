//! Downloads one upstream snapshot into `<data_root>/<pm>/<timestamp>/` and
//! flips the `latest` symlink once the directory is complete. The symlink
//! flip is the commit point of a fetch: a crashed download leaves a dangling
//! timestamped directory, never a half-current `latest`.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use flate2::read::GzDecoder;

use crate::error::PipelineError;
use crate::scheduler::CancelToken;

const HTTP_TIMEOUT: Duration = Duration::from_secs(600);
const LATEST: &str = "latest";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    Tarball,
    Gzip { file_name: &'static str },
    File { file_name: &'static str },
    GitClone,
}

pub struct Fetcher {
    pm_name: String,
    source: String,
    output: PathBuf,
}

impl Fetcher {
    pub fn new(pm_name: &str, source: &str, data_root: &Path) -> Fetcher {
        Fetcher {
            pm_name: pm_name.to_string(),
            source: source.to_string(),
            output: data_root.join(pm_name),
        }
    }

    pub fn latest_dir(&self) -> PathBuf {
        self.output.join(LATEST)
    }

    pub fn fetch(&self, kind: FetchKind, cancel: &CancelToken) -> Result<PathBuf, PipelineError> {
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        let stamp = Utc::now().format("%Y-%m-%dT%H-%M-%S").to_string();
        let dest = self.output.join(&stamp);
        fs::create_dir_all(&dest)?;

        log::info!("{}: fetching {} into {}", self.pm_name, self.source, dest.display());
        match kind {
            FetchKind::Tarball => {
                let body = self.download(cancel)?;
                let mut archive = tar::Archive::new(GzDecoder::new(body.as_slice()));
                archive.unpack(&dest)?;
            }
            FetchKind::Gzip { file_name } => {
                let body = self.download(cancel)?;
                let mut decoded = Vec::new();
                GzDecoder::new(body.as_slice()).read_to_end(&mut decoded)?;
                fs::write(dest.join(file_name), decoded)?;
            }
            FetchKind::File { file_name } => {
                let body = self.download(cancel)?;
                fs::write(dest.join(file_name), body)?;
            }
            FetchKind::GitClone => {
                git2::Repository::clone(&self.source, &dest)?;
            }
        }

        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        self.flip_latest(&stamp)?;
        Ok(dest)
    }

    // NO_CACHE: drop the timestamped artifacts once the ingest committed.
    pub fn cleanup(&self, fetched_dir: &Path) {
        if let Err(e) = fs::remove_dir_all(fetched_dir) {
            log::warn!(
                "{}: failed to remove {}: {}",
                self.pm_name,
                fetched_dir.display(),
                e
            );
        }
    }

    fn download(&self, cancel: &CancelToken) -> Result<Vec<u8>, PipelineError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()?;
        let response = client.get(&self.source).send()?;
        if !response.status().is_success() {
            return Err(PipelineError::FetchStatus(response.status()));
        }
        let body = response.bytes()?.to_vec();
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        Ok(body)
    }

    // Symlink to a temp name, then rename over `latest`: readers see either
    // the old snapshot or the new one, never a missing link.
    fn flip_latest(&self, stamp: &str) -> Result<(), PipelineError> {
        let tmp = self.output.join(".latest.tmp");
        if tmp.symlink_metadata().is_ok() {
            fs::remove_file(&tmp)?;
        }
        std::os::unix::fs::symlink(stamp, &tmp)?;
        fs::rename(&tmp, self.output.join(LATEST))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flip_latest_replaces_existing_symlink() {
        let root = tempfile::tempdir().unwrap();
        let fetcher = Fetcher::new("testpm", "http://unused", root.path());

        for stamp in ["2024-01-01T00-00-00", "2024-01-02T00-00-00"] {
            fs::create_dir_all(root.path().join("testpm").join(stamp)).unwrap();
            fetcher.flip_latest(stamp).unwrap();
        }

        let target = fs::read_link(fetcher.latest_dir()).unwrap();
        assert_eq!(target, PathBuf::from("2024-01-02T00-00-00"));
    }

    #[test]
    fn cleanup_removes_fetched_dir() {
        let root = tempfile::tempdir().unwrap();
        let fetcher = Fetcher::new("testpm", "http://unused", root.path());
        let dir = root.path().join("testpm").join("2024-01-01T00-00-00");
        fs::create_dir_all(dir.join("nested")).unwrap();

        fetcher.cleanup(&dir);
        assert!(!dir.exists());
    }
}

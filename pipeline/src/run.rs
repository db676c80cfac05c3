//! Orchestrates one pipeline invocation:
//! fetch -> parse -> (cache load in parallel) -> diff -> ingest -> delete?.
//! Any stage error fails the run; the ingest transaction guarantees no
//! partial state is ever visible.

use std::path::{Path, PathBuf};
use std::thread;

use chrono::Utc;

use postgres_db::{ingest, DbConnection};

use crate::cache::Cache;
use crate::config::Config;
use crate::diff::{detect_deletions, diff_snapshot};
use crate::error::PipelineError;
use crate::fetcher::{FetchKind, Fetcher};
use crate::normalized::NormalizedPackage;
use crate::scheduler::CancelToken;

pub trait SourceAdapter: Sync {
    fn package_manager(&self) -> &'static str;
    fn default_source(&self) -> &'static str;
    fn fetch_kind(&self) -> FetchKind;
    // authoritative sources are full dumps; absence upstream means deletion
    fn authoritative(&self) -> bool {
        false
    }
    fn parse(&self, dir: &Path, config: &Config)
        -> Result<Vec<NormalizedPackage>, PipelineError>;
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub snapshot_len: usize,
    pub counts: ingest::IngestCounts,
    pub deleted: usize,
}

pub fn run_once<A: SourceAdapter>(
    adapter: &A,
    config: &Config,
    conn: &mut DbConnection,
    cancel: &CancelToken,
) -> Result<RunSummary, PipelineError> {
    let pm = adapter.package_manager();
    let fetcher = Fetcher::new(pm, &config.source_url, &config.exec.data_root);

    let (input_dir, fetched_dir) = resolve_input_dir(adapter, config, &fetcher, cancel)?;

    // parse on its own thread while the cache loads here; both must
    // complete before the diff
    let (snapshot, cache) = thread::scope(|scope| {
        let parser = scope.spawn(|| adapter.parse(&input_dir, config));
        let cache = Cache::load(conn, config.pm_id);
        let snapshot = match parser.join() {
            Ok(result) => result,
            Err(_) => Err(PipelineError::Parse(format!("{} parser panicked", pm))),
        };
        (snapshot, cache)
    });
    let snapshot = snapshot?;
    let cache = cache.map_err(PipelineError::Store)?;

    if cancel.is_cancelled() {
        return Err(PipelineError::Cancelled);
    }

    let now = Utc::now();
    let delta = diff_snapshot(config, &cache, &snapshot, now);
    log::info!("{}: delta has {}", pm, delta.summary());

    if cancel.is_cancelled() {
        return Err(PipelineError::Cancelled);
    }

    let counts = ingest::ingest(
        conn,
        config.pm_id,
        &cache.package_ids(),
        config.user_source_id,
        &delta,
        now,
    )?;

    let mut deleted = 0;
    if adapter.authoritative() {
        let missing = detect_deletions(&cache, &snapshot);
        if !missing.is_empty() {
            if cancel.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }
            deleted = ingest::delete_packages_by_import_id(conn, config.pm_id, &missing)?;
            log::info!("{}: deleted {} packages gone upstream", pm, deleted);
        }
    }

    if config.exec.no_cache {
        if let Some(dir) = fetched_dir {
            fetcher.cleanup(&dir);
        }
    }

    Ok(RunSummary {
        snapshot_len: snapshot.len(),
        counts,
        deleted,
    })
}

pub fn log_summary(pm: &str, summary: &RunSummary) {
    log::info!(
        "{}: snapshot of {} packages ingested ({} new, {} updated, {} new urls, {} new links, {} new deps, {} removed deps), {} deleted",
        pm,
        summary.snapshot_len,
        summary.counts.packages_inserted,
        summary.counts.packages_updated,
        summary.counts.urls_inserted,
        summary.counts.package_urls_inserted,
        summary.counts.deps_inserted,
        summary.counts.deps_removed,
        summary.deleted,
    );
}

// Shared entry point for the per-adapter binaries: run once, or hand the
// pipeline to the scheduler, per ENABLE_SCHEDULER.
pub fn adapter_main<A: SourceAdapter>(adapter: A, source_env_var: &str) -> ! {
    use crate::config::ExecConfig;
    use crate::scheduler::{install_ctrlc_handler, run_scheduled};
    use std::time::Duration;

    let pm = adapter.package_manager();
    utils::check_no_concurrent_processes(pm);

    let exec = ExecConfig::from_env();
    crate::init_logging(exec.debug);

    let source = utils::env_var_or(source_env_var, adapter.default_source());

    let cancel = CancelToken::new();
    install_ctrlc_handler(&cancel);

    let mut conn = DbConnection::connect();
    let config = match Config::initialize(&mut conn, pm, source, exec) {
        Ok(config) => config,
        Err(e) => {
            log::error!("{}: config initialization failed: {}", pm, e);
            std::process::exit(1);
        }
    };

    if config.exec.enable_scheduler {
        let frequency = Duration::from_secs(config.exec.frequency_hours * 3600);
        run_scheduled(pm, frequency, &cancel, |cancel| {
            run_once(&adapter, &config, &mut conn, cancel).map(|summary| log_summary(pm, &summary))
        });
        std::process::exit(0);
    }

    match run_once(&adapter, &config, &mut conn, &cancel) {
        Ok(summary) => {
            log_summary(pm, &summary);
            std::process::exit(0);
        }
        Err(e) => {
            log::error!("{}: run failed: {}", pm, e);
            std::process::exit(1);
        }
    }
}

fn resolve_input_dir<A: SourceAdapter>(
    adapter: &A,
    config: &Config,
    fetcher: &Fetcher,
    cancel: &CancelToken,
) -> Result<(PathBuf, Option<PathBuf>), PipelineError> {
    if config.exec.test {
        // fixture inputs, no fetching
        let dir = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("test_data")
            .join(adapter.package_manager());
        return Ok((dir, None));
    }
    if config.exec.fetch {
        let dir = fetcher.fetch(adapter.fetch_kind(), cancel)?;
        return Ok((dir.clone(), Some(dir)));
    }
    log::info!(
        "{}: fetching disabled, reusing {}",
        adapter.package_manager(),
        fetcher.latest_dir().display()
    );
    Ok((fetcher.latest_dir(), None))
}

//! Drives every adapter pipeline on one shared cycle, one worker per
//! pipeline, and runs the deduplicator strictly after all of them.

use std::sync::Arc;
use std::time::Duration;

use pipeline::adapters::crates::CratesAdapter;
use pipeline::adapters::debian::DebianAdapter;
use pipeline::adapters::homebrew::HomebrewAdapter;
use pipeline::adapters::pkgx::PkgxAdapter;
use pipeline::config::{Config, ExecConfig};
use pipeline::run::{log_summary, run_once, SourceAdapter};
use pipeline::scheduler::{install_ctrlc_handler, run_cycles, CancelToken, Job};
use pipeline::PipelineError;
use postgres_db::DbConnection;
use utils::{check_no_concurrent_processes, env_flag, env_var_or};

fn main() {
    check_no_concurrent_processes("scheduler");

    let exec = ExecConfig::from_env();
    pipeline::init_logging(exec.debug);

    let cancel = CancelToken::new();
    install_ctrlc_handler(&cancel);

    let pipelines = vec![
        pipeline_job(CratesAdapter, "CRATES_SOURCE", exec.clone()),
        pipeline_job(HomebrewAdapter, "HOMEBREW_SOURCE", exec.clone()),
        pipeline_job(DebianAdapter, "DEBIAN_SOURCE", exec.clone()),
        pipeline_job(PkgxAdapter, "PKGX_SOURCE", exec.clone()),
    ];

    let load = env_flag("LOAD", false);
    let dedupe_job = Job::new("dedupe", move |_cancel| {
        let mut conn = DbConnection::connect();
        dedupe::run(&mut conn, !load)
            .map(|counts| {
                log::info!(
                    "dedupe: {} canons created, {} links written",
                    counts.canons_created,
                    counts.links_written
                )
            })
            .map_err(PipelineError::Store)
    });

    if !exec.enable_scheduler {
        log::info!("scheduler disabled, running one cycle");
        for job in &pipelines {
            job.execute(&cancel);
        }
        dedupe_job.execute(&cancel);
        return;
    }

    let frequency = Duration::from_secs(exec.frequency_hours * 3600);
    run_cycles(&pipelines, Some(&dedupe_job), frequency, &cancel);
}

fn pipeline_job<A>(adapter: A, source_env_var: &str, exec: ExecConfig) -> Arc<Job>
where
    A: SourceAdapter + Send + 'static,
{
    let pm = adapter.package_manager();
    let source = env_var_or(source_env_var, adapter.default_source());
    Job::new(pm, move |cancel| {
        let mut conn = DbConnection::connect();
        let config = Config::initialize(&mut conn, pm, source.clone(), exec.clone())
            .map_err(PipelineError::Store)?;
        run_once(&adapter, &config, &mut conn, cancel).map(|summary| log_summary(pm, &summary))
    })
}

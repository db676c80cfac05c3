//! Periodic pipeline driver. Two modes: a single-pipeline loop used by the
//! per-adapter binaries, and a multi-pipeline cycle (one worker thread per
//! pipeline, barrier, then the deduplicator) used by the scheduler binary.
//!
//! Single-flight: at most one run of a pipeline is ever in flight; fires
//! that would land during an active run are dropped, not queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::error::PipelineError;

#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> CancelToken {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub fn install_ctrlc_handler(cancel: &CancelToken) {
    let cancel = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        log::info!("shutdown signal received, cancelling");
        cancel.cancel();
    }) {
        log::warn!("could not install shutdown handler: {}", e);
    }
}

// Next fire strictly after `now`, dropping every fire the last run overran.
fn advance(mut next_fire: Instant, now: Instant, frequency: Duration) -> (Instant, u32) {
    let mut dropped = 0;
    next_fire += frequency;
    while next_fire <= now {
        next_fire += frequency;
        dropped += 1;
    }
    (next_fire, dropped)
}

fn sleep_until(deadline: Instant, cancel: &CancelToken) {
    while !cancel.is_cancelled() {
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        thread::sleep((deadline - now).min(Duration::from_secs(1)));
    }
}

// Immediate run at startup, then one fire per period. A failed run is
// logged; the next fire proceeds normally.
pub fn run_scheduled<F>(name: &str, frequency: Duration, cancel: &CancelToken, mut job: F)
where
    F: FnMut(&CancelToken) -> Result<(), PipelineError>,
{
    log::info!(
        "scheduled {} to run every {} seconds",
        name,
        frequency.as_secs()
    );

    let mut next_fire = Instant::now();
    while !cancel.is_cancelled() {
        match job(cancel) {
            Ok(()) => log::info!("{}: run finished", name),
            Err(PipelineError::Cancelled) => {
                log::info!("{}: run cancelled", name);
                break;
            }
            Err(e) => log::error!("{}: run failed: {}", name, e),
        }

        let (fire, dropped) = advance(next_fire, Instant::now(), frequency);
        next_fire = fire;
        if dropped > 0 {
            log::warn!("{}: run overran, dropped {} fire(s)", name, dropped);
        }
        sleep_until(next_fire, cancel);
    }
    log::info!("stopped {} scheduler", name);
}

pub struct Job {
    pub name: &'static str,
    in_flight: AtomicBool,
    run: Box<dyn Fn(&CancelToken) -> Result<(), PipelineError> + Send + Sync>,
}

impl Job {
    pub fn new<F>(name: &'static str, run: F) -> Arc<Job>
    where
        F: Fn(&CancelToken) -> Result<(), PipelineError> + Send + Sync + 'static,
    {
        Arc::new(Job {
            name,
            in_flight: AtomicBool::new(false),
            run: Box::new(run),
        })
    }

    pub fn execute(&self, cancel: &CancelToken) {
        // the mutual-exclusion flag; a trigger during an active run is dropped
        if self.in_flight.swap(true, Ordering::SeqCst) {
            log::warn!("{}: already in flight, dropping trigger", self.name);
            return;
        }
        match (self.run)(cancel) {
            Ok(()) => log::info!("{}: run finished", self.name),
            Err(PipelineError::Cancelled) => log::info!("{}: run cancelled", self.name),
            Err(e) => log::error!("{}: run failed: {}", self.name, e),
        }
        self.in_flight.store(false, Ordering::SeqCst);
    }
}

// One worker per pipeline per cycle; the deduplicator runs strictly after
// every adapter of the cycle has finished.
pub fn run_cycles(
    pipelines: &[Arc<Job>],
    after_cycle: Option<&Arc<Job>>,
    frequency: Duration,
    cancel: &CancelToken,
) {
    let mut next_fire = Instant::now();
    while !cancel.is_cancelled() {
        thread::scope(|scope| {
            for job in pipelines {
                let job = Arc::clone(job);
                let cancel = cancel.clone();
                scope.spawn(move || job.execute(&cancel));
            }
        });

        if let Some(job) = after_cycle {
            if !cancel.is_cancelled() {
                job.execute(cancel);
            }
        }

        let (fire, dropped) = advance(next_fire, Instant::now(), frequency);
        next_fire = fire;
        if dropped > 0 {
            log::warn!("cycle overran, dropped {} fire(s)", dropped);
        }
        sleep_until(next_fire, cancel);
    }
    log::info!("stopped cycle scheduler");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_skips_missed_fires() {
        let start = Instant::now();
        let freq = Duration::from_secs(10);

        // finished with time to spare: next fire, nothing dropped
        let (next, dropped) = advance(start, start + Duration::from_secs(3), freq);
        assert_eq!(next, start + freq);
        assert_eq!(dropped, 0);

        // overran two and a half periods: those fires are dropped
        let (next, dropped) = advance(start, start + Duration::from_secs(25), freq);
        assert_eq!(next, start + Duration::from_secs(30));
        assert_eq!(dropped, 2);
    }

    #[test]
    fn run_scheduled_stops_on_cancel() {
        let cancel = CancelToken::new();
        let mut runs = 0;
        let job_cancel = cancel.clone();
        run_scheduled("test", Duration::from_millis(1), &cancel, move |_| {
            runs += 1;
            if runs == 3 {
                job_cancel.cancel();
            }
            Ok(())
        });
        assert!(cancel.is_cancelled());
    }

    #[test]
    fn job_drops_overlapping_trigger() {
        let job = Job::new("slow", |_| {
            thread::sleep(Duration::from_millis(50));
            Ok(())
        });
        let cancel = CancelToken::new();

        let started = Instant::now();
        thread::scope(|scope| {
            for _ in 0..3 {
                let job = Arc::clone(&job);
                let cancel = cancel.clone();
                scope.spawn(move || job.execute(&cancel));
            }
        });
        // two of the three triggers were dropped while the first ran
        assert!(started.elapsed() < Duration::from_millis(140));
        assert!(!job.in_flight.load(Ordering::SeqCst));
    }

    #[test]
    fn cancelled_token_reports() {
        let cancel = CancelToken::new();
        assert!(!cancel.is_cancelled());
        cancel.cancel();
        assert!(cancel.is_cancelled());
    }
}

pub mod adapters;
pub mod cache;
pub mod config;
pub mod diff;
pub mod error;
pub mod fetcher;
pub mod normalized;
pub mod run;
pub mod scheduler;

pub use error::PipelineError;

// DEBUG=true turns on row-level diff logging; RUST_LOG still wins.
pub fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
}

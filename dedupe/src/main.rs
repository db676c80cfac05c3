use postgres_db::DbConnection;
use utils::{check_no_concurrent_processes, env_flag};

fn main() {
    check_no_concurrent_processes("dedupe");

    let debug = env_flag("DEBUG", false);
    let default_level = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    // LOAD gates writes: default is a dry run that only logs the plan
    let load = env_flag("LOAD", false);

    let mut conn = DbConnection::connect();
    match dedupe::run(&mut conn, !load) {
        Ok(counts) => {
            log::info!(
                "dedupe done: {} canons created, {} links written",
                counts.canons_created,
                counts.links_written
            );
        }
        Err(e) => {
            log::error!("dedupe failed: {}", e);
            std::process::exit(1);
        }
    }
}

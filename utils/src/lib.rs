use std::collections::HashSet;
use std::env;
use std::process::Command;

// Refuses to start if another copy of the same binary is already running.
// Each pipeline writes a disjoint package_manager partition, so the only
// dangerous overlap is two copies of the same pipeline.
pub fn check_no_concurrent_processes(name: &str) {
    let my_pid = std::process::id();

    let pidof_output = match Command::new("pidof").arg(name).output() {
        Ok(out) => out,
        // pidof missing (e.g. inside a slim container): nothing we can check
        Err(_) => return,
    };

    let mut other_pids: HashSet<u32> = String::from_utf8_lossy(&pidof_output.stdout)
        .split_whitespace()
        .filter_map(|s| s.parse().ok())
        .collect();
    other_pids.remove(&my_pid);

    if !other_pids.is_empty() {
        eprintln!(
            "Cannot run {} concurrently. Already running with PIDs: {}",
            name,
            other_pids
                .iter()
                .map(|pid| pid.to_string())
                .collect::<Vec<_>>()
                .join(" ")
        );
        std::process::exit(1);
    }
}

// Env vars can be "true" or "1" (or anything else, meaning false).
pub fn env_flag(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(val) => {
            let val = val.to_lowercase();
            val == "true" || val == "1"
        }
        Err(_) => default,
    }
}

pub fn env_var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::env_flag;

    #[test]
    fn env_flag_accepts_true_and_one() {
        std::env::set_var("ENV_FLAG_TEST_A", "TRUE");
        std::env::set_var("ENV_FLAG_TEST_B", "1");
        std::env::set_var("ENV_FLAG_TEST_C", "yes");
        assert!(env_flag("ENV_FLAG_TEST_A", false));
        assert!(env_flag("ENV_FLAG_TEST_B", false));
        assert!(!env_flag("ENV_FLAG_TEST_C", true));
    }

    #[test]
    fn env_flag_falls_back_to_default() {
        assert!(env_flag("ENV_FLAG_TEST_UNSET", true));
        assert!(!env_flag("ENV_FLAG_TEST_UNSET", false));
    }
}

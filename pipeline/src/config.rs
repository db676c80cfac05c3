//! One Config value is constructed at pipeline start from environment
//! variables plus a one-shot query for the lookup-row ids, then passed
//! explicitly into every component. No process-wide mutable state.

use std::path::PathBuf;

use chrono::Utc;
use diesel::QueryResult;
use postgres_db::{types, DbConnection};
use utils::{env_flag, env_var_or};

pub const DEFAULT_FREQUENCY_HOURS: u64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UrlTypeIds {
    pub homepage: i64,
    pub repository: i64,
    pub documentation: i64,
    pub source: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DependencyTypeIds {
    pub runtime: i64,
    pub build: i64,
    pub test: i64,
    pub recommended: i64,
    pub optional: i64,
    pub uses_from_macos: i64,
}

#[derive(Debug, Clone)]
pub struct ExecConfig {
    pub fetch: bool,
    pub no_cache: bool,
    pub test: bool,
    pub frequency_hours: u64,
    pub enable_scheduler: bool,
    pub debug: bool,
    pub data_root: PathBuf,
}

impl ExecConfig {
    pub fn from_env() -> ExecConfig {
        dotenv::dotenv().ok();
        ExecConfig {
            fetch: env_flag("FETCH", true),
            no_cache: env_flag("NO_CACHE", false),
            test: env_flag("TEST", false),
            frequency_hours: env_var_or("FREQUENCY", "")
                .parse()
                .unwrap_or(DEFAULT_FREQUENCY_HOURS),
            enable_scheduler: env_flag("ENABLE_SCHEDULER", true),
            debug: env_flag("DEBUG", false),
            data_root: PathBuf::from(env_var_or("DATA_ROOT", "data")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub pm_id: i64,
    pub pm_name: String,
    pub source_url: String,
    // source row for usernames (crate owners come from github)
    pub user_source_id: i64,
    pub url_types: UrlTypeIds,
    pub dependency_types: DependencyTypeIds,
    pub exec: ExecConfig,
}

impl Config {
    pub fn initialize(
        conn: &mut DbConnection,
        pm_name: &str,
        source_url: String,
        exec: ExecConfig,
    ) -> QueryResult<Config> {
        let now = Utc::now();

        let pm_id = types::get_or_create_package_manager(conn, pm_name, now)?;
        types::get_or_create_source(conn, pm_name, now)?;
        let user_source_id = types::get_or_create_source(conn, "github", now)?;

        let url_types = UrlTypeIds {
            homepage: types::get_or_create_url_type(conn, "homepage", now)?,
            repository: types::get_or_create_url_type(conn, "repository", now)?,
            documentation: types::get_or_create_url_type(conn, "documentation", now)?,
            source: types::get_or_create_url_type(conn, "source", now)?,
        };

        let dependency_types = DependencyTypeIds {
            runtime: types::get_or_create_dependency_type(conn, "runtime", now)?,
            build: types::get_or_create_dependency_type(conn, "build", now)?,
            test: types::get_or_create_dependency_type(conn, "test", now)?,
            recommended: types::get_or_create_dependency_type(conn, "recommended", now)?,
            optional: types::get_or_create_dependency_type(conn, "optional", now)?,
            uses_from_macos: types::get_or_create_dependency_type(conn, "uses_from_macos", now)?,
        };

        Ok(Config {
            pm_id,
            pm_name: pm_name.to_string(),
            source_url,
            user_source_id,
            url_types,
            dependency_types,
            exec,
        })
    }
}

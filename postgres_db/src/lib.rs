#[macro_use]
extern crate diesel;

pub mod canons;
pub mod connection;
pub mod dependencies;
pub mod ingest;
pub mod load_history;
pub mod package_urls;
pub mod packages;
mod schema;
pub mod types;
pub mod urls;
pub mod users;

pub use connection::{DbConnection, QueryRunner};

// Bulk statements are chunked so one snapshot-sized delta never exceeds the
// Postgres bind-parameter limit.
pub(crate) const CHUNK_SIZE: usize = 2048;

use chrono::{DateTime, Utc};
use diesel::prelude::*;

use super::connection::QueryRunner;

// The run-level marker: a row here means a full ingest committed.
pub fn insert<R: QueryRunner>(conn: &mut R, pm_id: i64, now: DateTime<Utc>) -> QueryResult<usize> {
    use super::schema::load_history::dsl::*;

    conn.execute(
        diesel::insert_into(load_history).values((package_manager_id.eq(pm_id), created_at.eq(now))),
    )
}

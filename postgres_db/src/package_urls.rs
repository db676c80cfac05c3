use chrono::{DateTime, Utc};
use diesel::prelude::*;

use super::connection::QueryRunner;
use super::schema::{package_urls, packages};
use super::CHUNK_SIZE;

#[derive(Insertable, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = package_urls)]
pub struct NewPackageUrl {
    pub package_id: i64,
    pub url_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// The (package_id, url_id) link set for one ecosystem.
pub fn load_for_package_manager<R: QueryRunner>(
    conn: &mut R,
    pm_id: i64,
) -> QueryResult<Vec<(i64, i64)>> {
    conn.load(
        package_urls::table
            .inner_join(packages::table)
            .filter(packages::package_manager_id.eq(pm_id))
            .select((package_urls::package_id, package_urls::url_id))
            .order((package_urls::package_id, package_urls::url_id)),
    )
}

pub fn insert_new<R: QueryRunner>(conn: &mut R, rows: &[NewPackageUrl]) -> QueryResult<usize> {
    use super::schema::package_urls::dsl::*;

    let mut inserted = 0;
    for chunk in rows.chunks(CHUNK_SIZE) {
        inserted += conn.execute(
            diesel::insert_into(package_urls)
                .values(chunk)
                .on_conflict((package_id, url_id))
                .do_nothing(),
        )?;
    }
    Ok(inserted)
}

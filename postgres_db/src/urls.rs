use chrono::{DateTime, Utc};
use diesel::prelude::*;

use super::connection::QueryRunner;
use super::schema::{package_urls, packages, urls};
use super::CHUNK_SIZE;

#[derive(Queryable, Debug, Clone)]
pub struct Url {
    pub id: i64,
    pub url: String,
    pub url_type_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = urls)]
pub struct NewUrl {
    pub url: String,
    pub url_type_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// All URLs referenced by packages of one ecosystem.
pub fn load_for_package_manager<R: QueryRunner>(
    conn: &mut R,
    pm_id: i64,
) -> QueryResult<Vec<Url>> {
    conn.load(
        urls::table
            .inner_join(package_urls::table.inner_join(packages::table))
            .filter(packages::package_manager_id.eq(pm_id))
            .select(urls::all_columns)
            .distinct()
            .order(urls::id),
    )
}

// Conflict-do-nothing on (url, url_type_id): a URL staged by another
// pipeline between our cache load and our ingest must not fail the run.
pub fn insert_new<R: QueryRunner>(conn: &mut R, rows: &[NewUrl]) -> QueryResult<usize> {
    use super::schema::urls::dsl::*;

    let mut inserted = 0;
    for chunk in rows.chunks(CHUNK_SIZE) {
        inserted += conn.execute(
            diesel::insert_into(urls)
                .values(chunk)
                .on_conflict((url, url_type_id))
                .do_nothing(),
        )?;
    }
    Ok(inserted)
}

// Resolves (url, url_type_id) keys to row ids after insert_new has run.
pub fn ids_for_keys<R: QueryRunner>(
    conn: &mut R,
    keys: &[(String, i64)],
) -> QueryResult<Vec<(String, i64, i64)>> {
    use super::schema::urls::dsl::*;

    let mut resolved = Vec::with_capacity(keys.len());
    for chunk in keys.chunks(CHUNK_SIZE) {
        let strings: Vec<&str> = chunk.iter().map(|(u, _)| u.as_str()).collect();
        let rows: Vec<(String, i64, i64)> = conn.load(
            urls.filter(url.eq_any(strings))
                .select((url, url_type_id, id)),
        )?;
        // the string filter over-fetches across types; keep exact keys only
        let wanted: std::collections::HashSet<(&str, i64)> =
            chunk.iter().map(|(u, t)| (u.as_str(), *t)).collect();
        resolved.extend(
            rows.into_iter()
                .filter(|(u, t, _)| wanted.contains(&(u.as_str(), *t))),
        );
    }
    Ok(resolved)
}

// Latest-first homepage candidates for the deduplicator: every
// (package, homepage-url) pair ordered so the first row seen per package
// is the most recently updated URL.
pub fn load_homepages<R: QueryRunner>(
    conn: &mut R,
    homepage_type_id: i64,
) -> QueryResult<Vec<(i64, String)>> {
    conn.load(
        packages::table
            .inner_join(package_urls::table.inner_join(urls::table))
            .filter(urls::url_type_id.eq(homepage_type_id))
            .order((packages::id.asc(), urls::updated_at.desc()))
            .select((packages::id, urls::url)),
    )
}

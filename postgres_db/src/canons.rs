use chrono::{DateTime, Utc};
use diesel::prelude::*;
use std::collections::HashMap;

use super::connection::QueryRunner;
use super::schema::{canon_packages, canons};
use super::CHUNK_SIZE;

#[derive(Insertable, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = canons)]
pub struct NewCanon {
    pub url: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = canon_packages)]
pub struct NewCanonPackage {
    pub canon_id: i64,
    pub package_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// canonical url -> canon id, for every canon
pub fn load_all<R: QueryRunner>(conn: &mut R) -> QueryResult<HashMap<String, i64>> {
    use super::schema::canons::dsl::*;

    let rows: Vec<(String, i64)> = conn.load(canons.select((url, id)))?;
    Ok(rows.into_iter().collect())
}

// package id -> canon id, for every linked package
pub fn load_canon_packages<R: QueryRunner>(conn: &mut R) -> QueryResult<HashMap<i64, i64>> {
    use super::schema::canon_packages::dsl::*;

    let rows: Vec<(i64, i64)> = conn.load(canon_packages.select((package_id, canon_id)))?;
    Ok(rows.into_iter().collect())
}

pub fn insert_new<R: QueryRunner>(conn: &mut R, rows: &[NewCanon]) -> QueryResult<usize> {
    use super::schema::canons::dsl::*;

    let mut inserted = 0;
    for chunk in rows.chunks(CHUNK_SIZE) {
        inserted += conn.execute(
            diesel::insert_into(canons)
                .values(chunk)
                .on_conflict(url)
                .do_nothing(),
        )?;
    }
    Ok(inserted)
}

pub fn ids_for_urls<R: QueryRunner>(
    conn: &mut R,
    the_urls: &[String],
) -> QueryResult<Vec<(String, i64)>> {
    use super::schema::canons::dsl::*;

    let mut resolved = Vec::with_capacity(the_urls.len());
    for chunk in the_urls.chunks(CHUNK_SIZE) {
        let mut rows: Vec<(String, i64)> =
            conn.load(canons.filter(url.eq_any(chunk)).select((url, id)))?;
        resolved.append(&mut rows);
    }
    Ok(resolved)
}

// A package belongs to exactly one canon: conflicts on package_id move the
// package to its new canon.
pub fn upsert_canon_packages<R: QueryRunner>(
    conn: &mut R,
    rows: &[NewCanonPackage],
) -> QueryResult<usize> {
    use super::schema::canon_packages::dsl::*;
    use diesel::upsert::excluded;

    let mut written = 0;
    for chunk in rows.chunks(CHUNK_SIZE) {
        written += conn.execute(
            diesel::insert_into(canon_packages)
                .values(chunk)
                .on_conflict(package_id)
                .do_update()
                .set((
                    canon_id.eq(excluded(canon_id)),
                    updated_at.eq(excluded(updated_at)),
                )),
        )?;
    }
    Ok(written)
}

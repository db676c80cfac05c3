use chrono::{DateTime, Utc};
use diesel::prelude::*;

use super::connection::QueryRunner;
use super::schema::{user_packages, users};
use super::CHUNK_SIZE;

#[derive(Insertable, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub username: String,
    pub source_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = user_packages)]
pub struct NewUserPackage {
    pub user_id: i64,
    pub package_id: i64,
    pub created_at: DateTime<Utc>,
}

pub fn insert_new<R: QueryRunner>(conn: &mut R, rows: &[NewUser]) -> QueryResult<usize> {
    use super::schema::users::dsl::*;

    let mut inserted = 0;
    for chunk in rows.chunks(CHUNK_SIZE) {
        inserted += conn.execute(
            diesel::insert_into(users)
                .values(chunk)
                .on_conflict((username, source_id))
                .do_nothing(),
        )?;
    }
    Ok(inserted)
}

// Resolves usernames (within one source) to user ids after insert_new.
pub fn ids_for_usernames<R: QueryRunner>(
    conn: &mut R,
    the_source_id: i64,
    names: &[String],
) -> QueryResult<Vec<(String, i64)>> {
    use super::schema::users::dsl::*;

    let mut resolved = Vec::with_capacity(names.len());
    for chunk in names.chunks(CHUNK_SIZE) {
        let mut rows: Vec<(String, i64)> = conn.load(
            users
                .filter(source_id.eq(the_source_id).and(username.eq_any(chunk)))
                .select((username, id)),
        )?;
        resolved.append(&mut rows);
    }
    Ok(resolved)
}

pub fn insert_user_packages<R: QueryRunner>(
    conn: &mut R,
    rows: &[NewUserPackage],
) -> QueryResult<usize> {
    use super::schema::user_packages::dsl::*;

    let mut inserted = 0;
    for chunk in rows.chunks(CHUNK_SIZE) {
        inserted += conn.execute(
            diesel::insert_into(user_packages)
                .values(chunk)
                .on_conflict((user_id, package_id))
                .do_nothing(),
        )?;
    }
    Ok(inserted)
}

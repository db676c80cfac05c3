//! Lookup rows (package managers, url types, dependency types, sources),
//! created on demand at pipeline start.

use chrono::{DateTime, Utc};
use diesel::prelude::*;

use super::connection::QueryRunner;
use super::schema;

pub fn get_or_create_package_manager<R: QueryRunner>(
    conn: &mut R,
    the_name: &str,
    now: DateTime<Utc>,
) -> QueryResult<i64> {
    use schema::package_managers::dsl::*;

    conn.execute(
        diesel::insert_into(package_managers)
            .values((name.eq(the_name), created_at.eq(now)))
            .on_conflict(name)
            .do_nothing(),
    )?;
    conn.first(package_managers.filter(name.eq(the_name)).select(id))
}

pub fn get_or_create_source<R: QueryRunner>(
    conn: &mut R,
    the_name: &str,
    now: DateTime<Utc>,
) -> QueryResult<i64> {
    use schema::sources::dsl::*;

    conn.execute(
        diesel::insert_into(sources)
            .values((name.eq(the_name), created_at.eq(now)))
            .on_conflict(name)
            .do_nothing(),
    )?;
    conn.first(sources.filter(name.eq(the_name)).select(id))
}

pub fn get_or_create_url_type<R: QueryRunner>(
    conn: &mut R,
    the_name: &str,
    now: DateTime<Utc>,
) -> QueryResult<i64> {
    use schema::url_types::dsl::*;

    conn.execute(
        diesel::insert_into(url_types)
            .values((name.eq(the_name), created_at.eq(now)))
            .on_conflict(name)
            .do_nothing(),
    )?;
    conn.first(url_types.filter(name.eq(the_name)).select(id))
}

pub fn get_or_create_dependency_type<R: QueryRunner>(
    conn: &mut R,
    the_name: &str,
    now: DateTime<Utc>,
) -> QueryResult<i64> {
    use schema::dependency_types::dsl::*;

    conn.execute(
        diesel::insert_into(dependency_types)
            .values((name.eq(the_name), created_at.eq(now)))
            .on_conflict(name)
            .do_nothing(),
    )?;
    conn.first(dependency_types.filter(name.eq(the_name)).select(id))
}

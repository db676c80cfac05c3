use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::upsert::excluded;

use super::connection::QueryRunner;
use super::schema::{dependencies, packages};
use super::CHUNK_SIZE;

// One edge of the package-to-package dependency graph. The table holds at
// most one row per (package_id, dependency_id); the diff engine picks the
// winning dependency type before rows ever reach the store.
#[derive(Insertable, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = dependencies)]
pub struct NewDependencyRow {
    pub package_id: i64,
    pub dependency_id: i64,
    pub dependency_type_id: i64,
    pub semver_range: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Edges for one ecosystem: (package_id, dependency_id, type_id, semver).
pub fn load_for_package_manager<R: QueryRunner>(
    conn: &mut R,
    pm_id: i64,
) -> QueryResult<Vec<(i64, i64, i64, Option<String>)>> {
    conn.load(
        dependencies::table
            .inner_join(packages::table.on(packages::id.eq(dependencies::package_id)))
            .filter(packages::package_manager_id.eq(pm_id))
            .select((
                dependencies::package_id,
                dependencies::dependency_id,
                dependencies::dependency_type_id,
                dependencies::semver_range,
            ))
            .order((dependencies::package_id, dependencies::dependency_id)),
    )
}

pub fn insert_edges<R: QueryRunner>(
    conn: &mut R,
    rows: &[NewDependencyRow],
) -> QueryResult<usize> {
    use super::schema::dependencies::dsl::*;

    let mut inserted = 0;
    for chunk in rows.chunks(CHUNK_SIZE) {
        inserted += conn.execute(
            diesel::insert_into(dependencies)
                .values(chunk)
                .on_conflict((package_id, dependency_id))
                .do_update()
                .set((
                    dependency_type_id.eq(excluded(dependency_type_id)),
                    semver_range.eq(excluded(semver_range)),
                    updated_at.eq(excluded(updated_at)),
                )),
        )?;
    }
    Ok(inserted)
}

pub fn delete_edges<R: QueryRunner>(conn: &mut R, edges: &[(i64, i64)]) -> QueryResult<usize> {
    use super::schema::dependencies::dsl::*;

    let mut deleted = 0;
    for (pkg, dep) in edges {
        deleted += conn.execute(diesel::delete(
            dependencies.filter(package_id.eq(pkg).and(dependency_id.eq(dep))),
        ))?;
    }
    Ok(deleted)
}

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::upsert::excluded;

use super::connection::QueryRunner;
use super::schema::packages;
use super::CHUNK_SIZE;

#[derive(Queryable, Debug, Clone)]
pub struct Package {
    pub id: i64,
    pub derived_id: String,
    pub name: String,
    pub package_manager_id: i64,
    pub import_id: String,
    pub readme: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = packages)]
pub struct NewPackage {
    pub derived_id: String,
    pub name: String,
    pub package_manager_id: i64,
    pub import_id: String,
    pub readme: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Only the fields the diff found changed; everything else is left alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageUpdate {
    pub id: i64,
    pub readme: Option<String>,
    pub updated_at: DateTime<Utc>,
}

pub fn load_for_package_manager<R: QueryRunner>(
    conn: &mut R,
    pm_id: i64,
) -> QueryResult<Vec<Package>> {
    use super::schema::packages::dsl::*;

    conn.load(packages.filter(package_manager_id.eq(pm_id)).order(id))
}

// Upserts keyed on (package_manager_id, import_id), returning
// (import_id, id) for every row so staged identities can be resolved.
pub fn upsert_new<R: QueryRunner>(
    conn: &mut R,
    rows: &[NewPackage],
) -> QueryResult<Vec<(String, i64)>> {
    use super::schema::packages::dsl::*;

    let mut resolved = Vec::with_capacity(rows.len());
    for chunk in rows.chunks(CHUNK_SIZE) {
        let mut chunk_ids: Vec<(String, i64)> = conn.get_results(
            diesel::insert_into(packages)
                .values(chunk)
                .on_conflict((package_manager_id, import_id))
                .do_update()
                .set((
                    name.eq(excluded(name)),
                    readme.eq(excluded(readme)),
                    updated_at.eq(excluded(updated_at)),
                ))
                .returning((import_id, id)),
        )?;
        resolved.append(&mut chunk_ids);
    }
    Ok(resolved)
}

pub fn apply_updates<R: QueryRunner>(
    conn: &mut R,
    changes: &[PackageUpdate],
) -> QueryResult<usize> {
    use super::schema::packages::dsl::*;

    let mut updated = 0;
    for change in changes {
        updated += conn.execute(
            diesel::update(packages.find(change.id)).set((
                readme.eq(change.readme.as_deref()),
                updated_at.eq(change.updated_at),
            )),
        )?;
    }
    Ok(updated)
}

table! {
    package_managers (id) {
        id -> Int8,
        name -> Varchar,
        created_at -> Timestamptz,
    }
}

table! {
    sources (id) {
        id -> Int8,
        name -> Varchar,
        created_at -> Timestamptz,
    }
}

table! {
    packages (id) {
        id -> Int8,
        derived_id -> Varchar,
        name -> Varchar,
        package_manager_id -> Int8,
        import_id -> Varchar,
        readme -> Nullable<Text>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

table! {
    url_types (id) {
        id -> Int8,
        name -> Varchar,
        created_at -> Timestamptz,
    }
}

table! {
    urls (id) {
        id -> Int8,
        url -> Varchar,
        url_type_id -> Int8,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

table! {
    package_urls (id) {
        id -> Int8,
        package_id -> Int8,
        url_id -> Int8,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

table! {
    dependency_types (id) {
        id -> Int8,
        name -> Varchar,
        created_at -> Timestamptz,
    }
}

table! {
    dependencies (id) {
        id -> Int8,
        package_id -> Int8,
        dependency_id -> Int8,
        dependency_type_id -> Int8,
        semver_range -> Nullable<Varchar>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

table! {
    users (id) {
        id -> Int8,
        username -> Varchar,
        source_id -> Int8,
        created_at -> Timestamptz,
    }
}

table! {
    user_packages (id) {
        id -> Int8,
        user_id -> Int8,
        package_id -> Int8,
        created_at -> Timestamptz,
    }
}

table! {
    canons (id) {
        id -> Int8,
        url -> Varchar,
        name -> Varchar,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

table! {
    canon_packages (id) {
        id -> Int8,
        canon_id -> Int8,
        package_id -> Int8,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

table! {
    tea_ranks (canon_id) {
        canon_id -> Int8,
        rank -> Varchar,
        calculated_at -> Timestamptz,
    }
}

table! {
    load_history (id) {
        id -> Int8,
        package_manager_id -> Int8,
        created_at -> Timestamptz,
    }
}

joinable!(packages -> package_managers (package_manager_id));
joinable!(urls -> url_types (url_type_id));
joinable!(package_urls -> packages (package_id));
joinable!(package_urls -> urls (url_id));
joinable!(dependencies -> dependency_types (dependency_type_id));
joinable!(users -> sources (source_id));
joinable!(user_packages -> users (user_id));
joinable!(user_packages -> packages (package_id));
joinable!(canon_packages -> canons (canon_id));
joinable!(canon_packages -> packages (package_id));
joinable!(tea_ranks -> canons (canon_id));
joinable!(load_history -> package_managers (package_manager_id));

allow_tables_to_appear_in_same_query!(
    package_managers,
    sources,
    packages,
    url_types,
    urls,
    package_urls,
    dependency_types,
    dependencies,
    users,
    user_packages,
    canons,
    canon_packages,
    tea_ranks,
    load_history,
);

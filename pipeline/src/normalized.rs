//! The uniform record shape every adapter's parser produces. Parsers are
//! the only code that knows source-specific shapes; from here on the
//! pipeline is ecosystem-agnostic.

use crate::config::{DependencyTypeIds, UrlTypeIds};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UrlKind {
    Homepage,
    Repository,
    Documentation,
    Source,
}

impl UrlKind {
    pub fn type_id(self, ids: &UrlTypeIds) -> i64 {
        match self {
            UrlKind::Homepage => ids.homepage,
            UrlKind::Repository => ids.repository,
            UrlKind::Documentation => ids.documentation,
            UrlKind::Source => ids.source,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyKind {
    Runtime,
    Build,
    Test,
    Recommended,
    Optional,
    UsesFromMacos,
}

impl DependencyKind {
    // Lower wins: when one (package, dependency) pair is declared with
    // several types, the store keeps the single highest-priority edge.
    pub fn priority(self) -> u8 {
        match self {
            DependencyKind::Runtime => 0,
            DependencyKind::Build => 1,
            DependencyKind::Test => 2,
            DependencyKind::Recommended => 3,
            DependencyKind::Optional => 4,
            DependencyKind::UsesFromMacos => 5,
        }
    }

    pub fn type_id(self, ids: &DependencyTypeIds) -> i64 {
        match self {
            DependencyKind::Runtime => ids.runtime,
            DependencyKind::Build => ids.build,
            DependencyKind::Test => ids.test,
            DependencyKind::Recommended => ids.recommended,
            DependencyKind::Optional => ids.optional,
            DependencyKind::UsesFromMacos => ids.uses_from_macos,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedDependency {
    pub import_id: String,
    pub kind: DependencyKind,
    pub semver_range: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NormalizedPackage {
    pub import_id: String,
    pub name: String,
    pub readme: Option<String>,
    pub urls: Vec<(UrlKind, String)>,
    pub dependencies: Vec<NormalizedDependency>,
    pub users: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::DependencyKind::*;

    #[test]
    fn priority_order_runtime_first() {
        let mut kinds = vec![UsesFromMacos, Test, Runtime, Optional, Build, Recommended];
        kinds.sort_by_key(|k| k.priority());
        assert_eq!(
            kinds,
            vec![Runtime, Build, Test, Recommended, Optional, UsesFromMacos]
        );
    }
}

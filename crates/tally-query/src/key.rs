//! Cache keys.

use std::fmt;

use tally_api::{PrincipalId, Resource};

/// The identifier a fetched result is cached under, e.g. `"transactions"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey(String);

impl QueryKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for QueryKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for QueryKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl From<Resource> for QueryKey {
    fn from(resource: Resource) -> Self {
        Self::new(resource.query_key())
    }
}

/// A query key qualified by the principal it was fetched for.
///
/// The principal is part of the key, so two users asking for the same
/// query key can never be handed each other's entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub principal: PrincipalId,
    pub key: QueryKey,
}

impl CacheKey {
    pub fn new(principal: PrincipalId, key: impl Into<QueryKey>) -> Self {
        Self {
            principal,
            key: key.into(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.principal, self.key)
    }
}

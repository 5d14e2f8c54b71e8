//! Endpoint catalogue of the budget API.
//!
//! Paths are relative to the configured API base address
//! (e.g. `http://localhost:8000/api`).

use std::fmt;

use serde::{Deserialize, Serialize};

pub(crate) const LOGIN: &str = "auth/login/";
pub(crate) const REGISTER: &str = "auth/register/";
pub(crate) const REFRESH: &str = "auth/token/refresh/";
pub(crate) const LOGOUT: &str = "auth/logout/";

/// A data endpoint the application pages read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Transactions,
    Categories,
    Accounts,
    RecurringTransactions,
    Dashboard,
    Trends,
    CategoryAnalysis,
    Anomalies,
    Forecast,
    Profile,
    UserStats,
}

impl Resource {
    /// Every resource, in catalogue order.
    pub const ALL: [Resource; 11] = [
        Self::Transactions,
        Self::Categories,
        Self::Accounts,
        Self::RecurringTransactions,
        Self::Dashboard,
        Self::Trends,
        Self::CategoryAnalysis,
        Self::Anomalies,
        Self::Forecast,
        Self::Profile,
        Self::UserStats,
    ];

    /// The GET path for this resource.
    pub fn path(self) -> &'static str {
        match self {
            Self::Transactions => "transactions/transactions/",
            Self::Categories => "transactions/categories/",
            Self::Accounts => "transactions/accounts/",
            Self::RecurringTransactions => "transactions/recurring/",
            Self::Dashboard => "analytics/dashboard/",
            Self::Trends => "analytics/trends/",
            Self::CategoryAnalysis => "analytics/categories/",
            Self::Anomalies => "analytics/anomalies/",
            Self::Forecast => "analytics/forecast/",
            Self::Profile => "auth/profile/",
            Self::UserStats => "auth/stats/",
        }
    }

    /// The cache key this resource is stored under.
    pub fn query_key(self) -> &'static str {
        match self {
            Self::Transactions => "transactions",
            Self::Categories => "categories",
            Self::Accounts => "accounts",
            Self::RecurringTransactions => "recurring-transactions",
            Self::Dashboard => "dashboard",
            Self::Trends => "trends",
            Self::CategoryAnalysis => "category-analysis",
            Self::Anomalies => "anomalies",
            Self::Forecast => "forecast",
            Self::Profile => "profile",
            Self::UserStats => "user-stats",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.query_key())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_query_keys_are_unique() {
        let keys: HashSet<_> = Resource::ALL.iter().map(|r| r.query_key()).collect();
        assert_eq!(keys.len(), Resource::ALL.len());
    }

    #[test]
    fn test_paths_are_relative_with_trailing_slash() {
        for resource in Resource::ALL {
            let path = resource.path();
            assert!(!path.starts_with('/'), "{path} must be relative");
            assert!(path.ends_with('/'), "{path} must end with a slash");
        }
    }
}

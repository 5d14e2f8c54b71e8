//! Route declarations and the ordered route table.

use serde::{Deserialize, Serialize};

/// Path of the login view.
pub const LOGIN_PATH: &str = "/login";

/// Path of the registration view.
pub const REGISTER_PATH: &str = "/register";

/// The default protected landing path (the dashboard).
pub const LANDING_PATH: &str = "/";

/// Who may see a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Private,
}

/// The views of the budget application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Page {
    Login,
    Register,
    Dashboard,
    Transactions,
    Analytics,
    Settings,
}

/// One entry of the route table.
pub struct Route<V> {
    pattern: String,
    visibility: Visibility,
    factory: Box<dyn Fn() -> V + Send + Sync>,
    layout: bool,
}

impl<V> Route<V> {
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    /// Whether the view renders inside the shared application layout.
    pub fn layout(&self) -> bool {
        self.layout
    }

    /// Builds a new instance of the view.
    pub fn build(&self) -> V {
        (self.factory)()
    }
}

/// An ordered table of routes. The first matching pattern wins.
///
/// Patterns are exact paths after normalization; query strings and
/// fragments never take part in matching.
pub struct RouteTable<V> {
    routes: Vec<Route<V>>,
}

impl<V> RouteTable<V> {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Adds a public route, rendered without the layout.
    pub fn public(self, pattern: &str, factory: impl Fn() -> V + Send + Sync + 'static) -> Self {
        self.with(pattern, Visibility::Public, false, factory)
    }

    /// Adds a private route, rendered inside the layout.
    pub fn private(self, pattern: &str, factory: impl Fn() -> V + Send + Sync + 'static) -> Self {
        self.with(pattern, Visibility::Private, true, factory)
    }

    fn with(
        mut self,
        pattern: &str,
        visibility: Visibility,
        layout: bool,
        factory: impl Fn() -> V + Send + Sync + 'static,
    ) -> Self {
        self.routes.push(Route {
            pattern: normalize(pattern),
            visibility,
            factory: Box::new(factory),
            layout,
        });
        self
    }

    /// Finds the route for `path`, if any.
    pub fn lookup(&self, path: &str) -> Option<&Route<V>> {
        let path = normalize(path);
        let route = route_part(&path);
        self.routes.iter().find(|r| r.pattern == route)
    }

    /// Visibility of `path`. Paths without a route are private.
    pub fn visibility_of(&self, path: &str) -> Visibility {
        self.lookup(path)
            .map_or(Visibility::Private, Route::visibility)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl<V> Default for RouteTable<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteTable<Page> {
    /// The budget application's routes.
    pub fn standard() -> Self {
        Self::new()
            .public(LOGIN_PATH, || Page::Login)
            .public(REGISTER_PATH, || Page::Register)
            .private(LANDING_PATH, || Page::Dashboard)
            .private("/transactions", || Page::Transactions)
            .private("/analytics", || Page::Analytics)
            .private("/settings", || Page::Settings)
    }
}

/// Canonical form of a path: leading slash, no trailing slash (except for
/// the root), query string and fragment kept as given.
pub fn normalize(path: &str) -> String {
    let (route, rest) = match path.find(['?', '#']) {
        Some(i) => path.split_at(i),
        None => (path, ""),
    };
    let route = route.trim_end_matches('/');
    let mut out = String::with_capacity(route.len() + rest.len() + 1);
    if !route.starts_with('/') {
        out.push('/');
    }
    out.push_str(route);
    out.push_str(rest);
    out
}

/// The part of a path that routes are matched on.
pub(crate) fn route_part(path: &str) -> &str {
    path.find(['?', '#']).map_or(path, |i| &path[..i])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_trailing_slash() {
        assert_eq!(normalize("/transactions/"), "/transactions");
        assert_eq!(normalize("settings"), "/settings");
        assert_eq!(normalize("/"), "/");
        assert_eq!(normalize(""), "/");
        assert_eq!(normalize("/analytics/?range=30d"), "/analytics?range=30d");
    }

    #[test]
    fn test_lookup_ignores_query() {
        let table = RouteTable::standard();

        let route = table.lookup("/transactions?page=3").unwrap();

        assert_eq!(route.build(), Page::Transactions);
        assert!(route.layout());
    }

    #[test]
    fn test_standard_table_visibility() {
        let table = RouteTable::standard();

        assert_eq!(table.visibility_of("/login"), Visibility::Public);
        assert_eq!(table.visibility_of("/register"), Visibility::Public);
        assert_eq!(table.visibility_of("/"), Visibility::Private);
        assert_eq!(table.visibility_of("/settings"), Visibility::Private);
        assert_eq!(table.visibility_of("/nowhere"), Visibility::Private);
        assert_eq!(table.len(), 6);
    }
}

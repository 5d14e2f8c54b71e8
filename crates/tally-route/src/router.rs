//! The router: resolves a requested path to a view, following the guard's
//! redirects.

use tally_session::Session;

use crate::guard::{self, GuardDecision};
use crate::{LANDING_PATH, RouteError, RouteTable, normalize};

/// Maximum redirects followed while resolving one navigation.
pub const MAX_REDIRECTS: usize = 4;

/// A view ready to be rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered<V> {
    /// The path actually rendered, after redirects.
    pub path: String,
    pub view: V,
    /// Whether the view renders inside the shared application layout.
    pub layout: bool,
}

/// Result of a navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<V> {
    Render(Rendered<V>),
    /// The session isn't settled yet. Show a loading state and call
    /// [`Router::reload`] once it is.
    Loading { path: String },
}

impl<V> Outcome<V> {
    /// The path this outcome is for.
    pub fn path(&self) -> &str {
        match self {
            Self::Render(r) => &r.path,
            Self::Loading { path } => path,
        }
    }

    pub fn view(&self) -> Option<&V> {
        match self {
            Self::Render(r) => Some(&r.view),
            Self::Loading { .. } => None,
        }
    }
}

/// Client-side router over a [`RouteTable`].
///
/// Holds the current location, the history of rendered paths, and the
/// path to resume once the user logs in.
pub struct Router<V> {
    table: RouteTable<V>,
    location: Option<String>,
    history: Vec<String>,
    resume: Option<String>,
}

impl<V> Router<V> {
    pub fn new(table: RouteTable<V>) -> Self {
        Self {
            table,
            location: None,
            history: Vec::new(),
            resume: None,
        }
    }

    /// The path last rendered or waited on.
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// The path that will be resumed after login, if one was preserved.
    pub fn pending_resume(&self) -> Option<&str> {
        self.resume.as_deref()
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }

    pub fn table(&self) -> &RouteTable<V> {
        &self.table
    }

    /// Navigates to `path` for `session`.
    ///
    /// # Errors
    /// [`RouteError::RedirectLoop`] if more than [`MAX_REDIRECTS`]
    /// redirects are needed.
    pub fn navigate(&mut self, path: &str, session: &Session) -> Result<Outcome<V>, RouteError> {
        self.resolve(path, session, true)
    }

    /// Re-evaluates the current location, e.g. after the session changed.
    /// Falls back to the landing path before the first navigation.
    pub fn reload(&mut self, session: &Session) -> Result<Outcome<V>, RouteError> {
        let path = self
            .location
            .clone()
            .unwrap_or_else(|| LANDING_PATH.to_string());
        self.resolve(&path, session, false)
    }

    /// Navigates to the path preserved by the last login redirect, or to
    /// the landing path if none was.
    pub fn resume_after_login(&mut self, session: &Session) -> Result<Outcome<V>, RouteError> {
        let path = self
            .resume
            .take()
            .unwrap_or_else(|| LANDING_PATH.to_string());
        tracing::debug!(%path, "resuming after login");
        self.resolve(&path, session, true)
    }

    /// Goes back to the previously rendered path. Returns `None` when there
    /// is nothing to go back to.
    pub fn back(&mut self, session: &Session) -> Option<Result<Outcome<V>, RouteError>> {
        if self.history.len() < 2 {
            return None;
        }
        self.history.pop();
        let previous = self.history.pop()?;
        Some(self.resolve(&previous, session, true))
    }

    fn resolve(
        &mut self,
        requested: &str,
        session: &Session,
        push: bool,
    ) -> Result<Outcome<V>, RouteError> {
        let requested = normalize(requested);
        let mut target = requested.clone();

        for hops in 0..=MAX_REDIRECTS {
            let visibility = self.table.visibility_of(&target);
            let decision = guard::decide(&target, visibility, session);
            tracing::debug!(path = %target, ?visibility, ?decision, hops, "guard decision");

            match decision {
                GuardDecision::Allow => match self.table.lookup(&target) {
                    Some(route) => {
                        let rendered = Rendered {
                            path: target.clone(),
                            view: route.build(),
                            layout: route.layout(),
                        };
                        if push && self.history.last() != Some(&target) {
                            self.history.push(target.clone());
                        }
                        self.location = Some(target);
                        return Ok(Outcome::Render(rendered));
                    }
                    None => {
                        tracing::debug!(path = %target, "no route, falling back to landing");
                        target = LANDING_PATH.to_string();
                    }
                },
                GuardDecision::Suspend => {
                    self.location = Some(target.clone());
                    return Ok(Outcome::Loading { path: target });
                }
                GuardDecision::Redirect { to, resume } => {
                    if let Some(resume) = resume {
                        self.resume = Some(resume);
                    }
                    target = normalize(&to);
                }
            }
        }

        tracing::warn!(path = %requested, hops = MAX_REDIRECTS, "redirect loop");
        Err(RouteError::RedirectLoop {
            path: requested,
            hops: MAX_REDIRECTS,
        })
    }
}

impl Router<crate::Page> {
    /// A router over the budget application's routes.
    pub fn standard() -> Self {
        Self::new(RouteTable::standard())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Page;
    use tally_api::{Principal, PrincipalId, Timestamp};

    fn authenticated() -> Session {
        Session::authenticated(
            "tok",
            Timestamp(10_000),
            Principal::new(PrincipalId(1), "ana@example.com"),
        )
    }

    #[test]
    fn test_navigate_private_anonymous_renders_login() {
        let mut router = Router::standard();

        let outcome = router.navigate("/transactions", &Session::anonymous()).unwrap();

        assert_eq!(outcome.view(), Some(&Page::Login));
        assert_eq!(outcome.path(), "/login");
        assert_eq!(router.pending_resume(), Some("/transactions"));
    }

    #[test]
    fn test_resume_after_login_returns_to_preserved_path() {
        let mut router = Router::standard();
        router.navigate("/analytics/", &Session::anonymous()).unwrap();

        let outcome = router.resume_after_login(&authenticated()).unwrap();

        assert_eq!(
            outcome,
            Outcome::Render(Rendered {
                path: "/analytics".into(),
                view: Page::Analytics,
                layout: true,
            })
        );
        assert_eq!(router.pending_resume(), None);
    }

    #[test]
    fn test_resume_without_preserved_path_goes_to_landing() {
        let mut router = Router::standard();

        let outcome = router.resume_after_login(&authenticated()).unwrap();

        assert_eq!(outcome.view(), Some(&Page::Dashboard));
    }

    #[test]
    fn test_navigate_while_restoring_is_loading() {
        let mut router = Router::standard();

        let outcome = router.navigate("/settings", &Session::restoring()).unwrap();

        assert_eq!(outcome, Outcome::Loading { path: "/settings".into() });
        assert_eq!(router.location(), Some("/settings"));

        let outcome = router.reload(&authenticated()).unwrap();
        assert_eq!(outcome.view(), Some(&Page::Settings));
    }

    #[test]
    fn test_unknown_path_authenticated_falls_back_to_landing() {
        let mut router = Router::standard();

        let outcome = router.navigate("/nowhere", &authenticated()).unwrap();

        assert_eq!(outcome.view(), Some(&Page::Dashboard));
    }

    #[test]
    fn test_unknown_path_anonymous_redirects_to_login() {
        let mut router = Router::standard();

        let outcome = router.navigate("/nowhere", &Session::anonymous()).unwrap();

        assert_eq!(outcome.view(), Some(&Page::Login));
        assert_eq!(router.pending_resume(), Some("/nowhere"));
    }

    #[test]
    fn test_missing_landing_route_is_redirect_loop() {
        let mut router = Router::new(RouteTable::new().public("/login", || Page::Login));

        let result = router.navigate("/login", &authenticated());

        assert_eq!(
            result,
            Err(RouteError::RedirectLoop {
                path: "/login".into(),
                hops: MAX_REDIRECTS,
            })
        );
    }

    #[test]
    fn test_back_returns_to_previous_page() {
        let mut router = Router::standard();
        let session = authenticated();
        router.navigate("/transactions", &session).unwrap();
        router.navigate("/settings", &session).unwrap();

        let outcome = router.back(&session).unwrap().unwrap();

        assert_eq!(outcome.view(), Some(&Page::Transactions));
        assert_eq!(router.history(), ["/transactions".to_string()]);
        assert!(router.back(&session).is_none());
    }
}

//! The route guard: a pure function from `(path, visibility, session)` to
//! a decision. No side effects, no I/O; the router acts on the result.

use tally_session::{Session, SessionStatus};

use crate::{LANDING_PATH, LOGIN_PATH, REGISTER_PATH, Visibility, normalize, route_part};

/// What the router should do with a requested path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Render the requested view.
    Allow,

    /// Navigate to `to` instead. `resume` is the path to return to once
    /// the user has logged in.
    Redirect { to: String, resume: Option<String> },

    /// The startup restore hasn't committed yet, so the session isn't known:
    /// show a neutral loading state and decide again later.
    Suspend,
}

impl GuardDecision {
    pub fn allow(&self) -> bool {
        matches!(self, Self::Allow)
    }

    pub fn redirect_to(&self) -> Option<&str> {
        match self {
            Self::Redirect { to, .. } => Some(to),
            _ => None,
        }
    }
}

/// Decides whether `path` may be rendered for `session`.
///
/// | visibility | status                        | decision                          |
/// |------------|-------------------------------|-----------------------------------|
/// | public     | authenticated, login/register | redirect to the landing path      |
/// | public     | anything else                 | allow                             |
/// | private    | authenticated, refreshing     | allow                             |
/// | private    | restoring at startup          | suspend                           |
/// | private    | anything else                 | redirect to login, resume at path |
///
/// A login in progress is `Authenticating` but not restoring; its private
/// requests go to the login page so the path survives until it succeeds.
pub fn decide(path: &str, visibility: Visibility, session: &Session) -> GuardDecision {
    let path = normalize(path);
    let status = session.status();
    match visibility {
        Visibility::Public => {
            let route = route_part(&path);
            if status == SessionStatus::Authenticated
                && (route == LOGIN_PATH || route == REGISTER_PATH)
            {
                GuardDecision::Redirect {
                    to: LANDING_PATH.to_string(),
                    resume: None,
                }
            } else {
                GuardDecision::Allow
            }
        }
        Visibility::Private => match status {
            SessionStatus::Authenticated | SessionStatus::Refreshing => GuardDecision::Allow,
            SessionStatus::Authenticating if session.is_restoring() => GuardDecision::Suspend,
            SessionStatus::Anonymous
            | SessionStatus::Authenticating
            | SessionStatus::Expired
            | SessionStatus::Error => {
                GuardDecision::Redirect {
                    to: LOGIN_PATH.to_string(),
                    resume: Some(path),
                }
            }
        },
    }
}

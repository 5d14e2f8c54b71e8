//! Guard and router behavior across every session status.

use tally_api::{Principal, PrincipalId, Timestamp};
use tally_route::{
    GuardDecision, LANDING_PATH, LOGIN_PATH, Outcome, Page, REGISTER_PATH, Router, Visibility,
    decide,
};
use tally_session::{Session, SessionError, SessionStatus};

fn ana() -> Principal {
    Principal::new(PrincipalId(1), "ana@example.com")
}

/// One session per status.
fn every_status() -> Vec<Session> {
    vec![
        Session::anonymous(),
        Session::restoring(),
        Session::authenticating(),
        Session::authenticated("tok", Timestamp(10_000), ana()),
        Session::refreshing("tok", Some(Timestamp(10_000)), Some(ana())),
        Session::expired(Some(ana())),
        Session::failed(SessionError::StorageUnavailable("disk".into())),
    ]
}

const PRIVATE_PATHS: [&str; 5] = ["/", "/transactions", "/analytics", "/settings", "/unknown"];

#[test]
fn test_private_paths_without_token_redirect_to_login_with_resume() {
    for session in every_status() {
        if session.status().has_token() || session.is_restoring() {
            continue;
        }
        for path in PRIVATE_PATHS {
            let decision = decide(path, Visibility::Private, &session);

            assert!(!decision.allow(), "{path} allowed for {}", session.status());
            assert_eq!(
                decision,
                GuardDecision::Redirect {
                    to: LOGIN_PATH.into(),
                    resume: Some(path.into()),
                }
            );
        }
    }
}

#[test]
fn test_private_paths_with_token_allow() {
    for session in every_status().into_iter().filter(|s| s.status().has_token()) {
        for path in PRIVATE_PATHS {
            assert!(decide(path, Visibility::Private, &session).allow());
        }
    }
}

#[test]
fn test_public_auth_paths_redirect_only_when_authenticated() {
    for session in every_status() {
        for path in [LOGIN_PATH, REGISTER_PATH] {
            let decision = decide(path, Visibility::Public, &session);

            if session.status() == SessionStatus::Authenticated {
                assert_eq!(decision.redirect_to(), Some(LANDING_PATH));
            } else {
                assert!(decision.allow(), "{path} refused for {}", session.status());
            }
        }
    }
}

#[test]
fn test_router_never_redirects_while_restoring() {
    let mut router = Router::standard();

    for path in PRIVATE_PATHS {
        let outcome = router.navigate(path, &Session::restoring()).unwrap();

        assert!(matches!(outcome, Outcome::Loading { .. }), "{path}");
    }
    assert_eq!(router.pending_resume(), None);
}

#[test]
fn test_router_during_login_keeps_requested_path() {
    let mut router = Router::standard();

    let outcome = router.navigate("/settings", &Session::authenticating()).unwrap();
    assert_eq!(outcome.view(), Some(&Page::Login));
    assert_eq!(router.pending_resume(), Some("/settings"));

    let authenticated = Session::authenticated("tok", Timestamp(10_000), ana());
    let outcome = router.resume_after_login(&authenticated).unwrap();
    assert_eq!(outcome.view(), Some(&Page::Settings));
}

#[test]
fn test_expired_session_redirects_then_resumes() {
    let mut router = Router::standard();
    let authenticated = Session::authenticated("tok", Timestamp(10_000), ana());
    router.navigate("/transactions", &authenticated).unwrap();

    let outcome = router.reload(&Session::expired(Some(ana()))).unwrap();
    assert_eq!(outcome.view(), Some(&Page::Login));

    let outcome = router.resume_after_login(&authenticated).unwrap();
    assert_eq!(outcome.view(), Some(&Page::Transactions));
}

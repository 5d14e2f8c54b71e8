//! Error types for routing.

/// Errors that can occur while resolving a navigation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    /// Redirects kept bouncing without reaching a renderable route.
    /// Always a route table misconfiguration.
    #[error("redirect loop while navigating to {path} ({hops} redirects)")]
    RedirectLoop { path: String, hops: usize },
}

//! Read-only distribution of the session to consumers.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::{Clock, Session};

/// A consumer's view of the session.
///
/// Obtained from `SessionStore::subscribe()`. Every handle sees the same
/// committed state; none of them can change it. Lazy expiry applies to
/// reads through here exactly as it does to `SessionStore::current()`.
///
/// A slow consumer that misses intermediate transitions still always
/// wakes up to the latest one.
#[derive(Clone)]
pub struct AuthContext {
    receiver: watch::Receiver<Session>,
    clock: Arc<dyn Clock>,
}

impl AuthContext {
    pub(crate) fn new(receiver: watch::Receiver<Session>, clock: Arc<dyn Clock>) -> Self {
        Self { receiver, clock }
    }

    /// The session as of now.
    pub fn session(&self) -> Session {
        self.receiver.borrow().clone().classify(self.clock.now())
    }

    /// Returns `true` if a transition was committed since this handle last
    /// waited on [`changed()`](Self::changed).
    pub fn has_changed(&self) -> bool {
        self.receiver.has_changed().unwrap_or(false)
    }

    /// Waits for the next transition and returns the new session.
    ///
    /// Returns `None` once the store has been dropped.
    pub async fn changed(&mut self) -> Option<Session> {
        self.receiver.changed().await.ok()?;
        let session = self.receiver.borrow_and_update().clone();
        Some(session.classify(self.clock.now()))
    }

    /// Spawns a task that calls `render` with the current session and
    /// again after every transition, until the store goes away.
    pub fn spawn_consumer<F>(mut self, mut render: F) -> JoinHandle<()>
    where
        F: FnMut(&Session) + Send + 'static,
    {
        tokio::spawn(async move {
            let initial = self.receiver.borrow_and_update().clone();
            render(&initial.classify(self.clock.now()));
            while let Some(session) = self.changed().await {
                render(&session);
            }
        })
    }
}

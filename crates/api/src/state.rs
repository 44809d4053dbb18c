//! Shared application state

use std::sync::Arc;

use investhub_entitlements::{AccessPolicy, IdentitySource};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::sessions::SessionRegistry;

/// State handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub identity: Arc<dyn IdentitySource>,
    pub sessions: Arc<SessionRegistry>,
    pub policy: AccessPolicy,
    /// Cancelled on shutdown; request-scoped tokens are children of it
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        config: Config,
        identity: Arc<dyn IdentitySource>,
        sessions: Arc<SessionRegistry>,
    ) -> Self {
        let policy = config.access_policy();
        Self {
            config: Arc::new(config),
            identity,
            sessions,
            policy,
            shutdown: CancellationToken::new(),
        }
    }

    /// Cancellation token for one request's worth of work
    pub fn request_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }
}

//! Proactive background token refresh
//!
//! Spawns a periodic task that runs a coordinator refresh whenever a session
//! exists. The flow manager only contacts the token endpoint once the expiry
//! clock says the token is due, so most cycles are local checks. A failed
//! refresh logs out through the coordinator like any other refresh.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::coordinator::AuthCoordinator;
use crate::state::LoginState;

/// Spawn a background task that refreshes the session every `interval`.
///
/// Returns a `JoinHandle` for the spawned task.
pub fn spawn_refresh_task(
    coordinator: Arc<AuthCoordinator>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // Skip the immediate first tick; state was just derived at startup
        ticker.tick().await;

        loop {
            ticker.tick().await;
            refresh_cycle(&coordinator).await;
        }
    })
}

/// Run one refresh cycle. Logged-out sessions are skipped.
async fn refresh_cycle(coordinator: &AuthCoordinator) {
    let state = coordinator.state();
    if state == LoginState::LoggedOut {
        debug!("no session, skipping background refresh");
        return;
    }

    match coordinator.refresh().await {
        Ok(outcome) if outcome.state == LoginState::FullyAuthenticated => {
            debug!(warnings = outcome.warnings.len(), "background refresh ok");
        }
        Ok(outcome) => {
            info!(state = outcome.state.label(), "background refresh ended the session");
        }
        Err(e) => {
            warn!(error = %e, "background refresh failed, session ended");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Backend, Harness};
    use provider_auth::ACCESS_TOKEN_KEY;
    use secret_store::SecretStore;
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn refresh_cycle_skips_logged_out() {
        let harness = Harness::start(Backend::default()).await;
        refresh_cycle(&harness.coordinator).await;
        assert_eq!(harness.token_hits.load(Ordering::SeqCst), 0);
        assert_eq!(harness.coordinator.state(), LoginState::LoggedOut);
    }

    #[tokio::test]
    async fn refresh_cycle_leaves_fresh_session_alone() {
        let harness = Harness::start(Backend::default()).await;
        harness.coordinator.begin_login();
        harness.coordinator.login("code-1").await.unwrap();

        refresh_cycle(&harness.coordinator).await;
        assert_eq!(harness.token_hits.load(Ordering::SeqCst), 1);
        assert!(harness.coordinator.is_logged_in());
    }

    #[tokio::test]
    async fn refresh_cycle_rolls_back_half_session() {
        let harness = Harness::start(Backend::default()).await;
        harness.store.save(ACCESS_TOKEN_KEY, b"at_stale").unwrap();
        let coordinator = harness.rebuild();
        assert_eq!(coordinator.state(), LoginState::ProviderOnly);

        refresh_cycle(&coordinator).await;
        assert_eq!(coordinator.state(), LoginState::LoggedOut);
        assert!(harness.store.is_empty());
    }

    #[tokio::test]
    async fn spawned_task_refreshes_due_token() {
        let harness = Harness::start(Backend::default()).await;
        harness.coordinator.begin_login();
        harness.coordinator.login("code-1").await.unwrap();
        harness.clock.advance(Duration::from_secs(3600));

        let handle = spawn_refresh_task(harness.coordinator.clone(), Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.abort();

        assert!(harness.token_hits.load(Ordering::SeqCst) >= 2);
        assert!(harness.coordinator.is_logged_in());
        assert_eq!(
            harness.store.load_string(ACCESS_TOKEN_KEY).as_deref(),
            Some("at_refresh_token")
        );
    }
}

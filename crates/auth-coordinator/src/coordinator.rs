//! Login state machine
//!
//! Composes the provider flow and identity federation into one all-or-nothing
//! login. The only durable truths are "both credentials present" and
//! "neither": a federation failure after a successful code exchange revokes
//! the provider credential, and a failed refresh logs out completely.
//!
//! Every transition runs under one FIFO async mutex, so a logout issued while
//! a login is in flight waits for the login to settle and then wins. Refresh
//! is single-flight: callers that queued behind an in-flight refresh receive
//! its outcome instead of issuing their own request.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use federation::IdentityFederation;
use provider_auth::{AuthorizationRequest, OAuthFlowManager, Persisted};
use tokio::sync::{Mutex, MutexGuard, watch};
use tracing::{debug, info, warn};

use crate::error::AuthError;
use crate::state::{Alert, AuthObserver, AuthStatus, LoginState, Outcome, Transition};

/// Result of a coordinator transition.
pub type TransitionResult = Result<Outcome, AuthError>;

pub struct AuthCoordinator {
    flow: Arc<OAuthFlowManager>,
    federation: Arc<dyn IdentityFederation>,
    transition: Mutex<()>,
    status: watch::Sender<AuthStatus>,
    observers: RwLock<Vec<Arc<dyn AuthObserver>>>,
    /// Bumped after every completed refresh; compared before and after
    /// queueing on the transition lock. Any other transition clears
    /// `last_refresh`, so only back-to-back refreshes are joined.
    refresh_generation: AtomicU64,
    last_refresh: std::sync::Mutex<Option<TransitionResult>>,
}

impl AuthCoordinator {
    /// Build a coordinator whose initial state reflects what is already held:
    /// fully authenticated only when both credentials are present.
    pub fn new(flow: Arc<OAuthFlowManager>, federation: Arc<dyn IdentityFederation>) -> Self {
        let provider_authenticated = flow.has_credential();
        let federated = federation.current_identity().is_some();
        let state = LoginState::derive(provider_authenticated, federated);
        info!(
            state = state.label(),
            provider_authenticated, federated, "auth coordinator initialized"
        );

        Self {
            flow,
            federation,
            transition: Mutex::new(()),
            status: watch::Sender::new(AuthStatus {
                state,
                provider_authenticated,
                federated,
            }),
            observers: RwLock::new(Vec::new()),
            refresh_generation: AtomicU64::new(0),
            last_refresh: std::sync::Mutex::new(None),
        }
    }

    pub fn add_observer(&self, observer: Arc<dyn AuthObserver>) {
        self.observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    /// Latest published snapshot.
    pub fn status(&self) -> AuthStatus {
        *self.status.borrow()
    }

    pub fn state(&self) -> LoginState {
        self.status().state
    }

    pub fn is_logged_in(&self) -> bool {
        self.status().logged_in()
    }

    /// Receiver that observes every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<AuthStatus> {
        self.status.subscribe()
    }

    /// Start an authorization attempt and return the consent URL.
    ///
    /// Supersedes any outstanding attempt. Not a transition: state is
    /// unchanged until the code comes back.
    pub fn begin_login(&self) -> Persisted<AuthorizationRequest> {
        self.flow.begin_authorization()
    }

    /// Complete a login with an authorization code.
    pub async fn login(&self, code: &str) -> TransitionResult {
        let _guard = self.lock_other_transition().await;
        self.login_locked(code).await
    }

    /// Complete a login from the full redirect URL.
    pub async fn complete_login_from_redirect(&self, redirect: &str) -> TransitionResult {
        self.complete_callback(provider_auth::parse_callback(redirect))
            .await
    }

    /// Complete a login from already-split `code` / `error` query parameters.
    pub async fn complete_login(&self, code: Option<&str>, error: Option<&str>) -> TransitionResult {
        self.complete_callback(provider_auth::code_from_params(code, error))
            .await
    }

    /// The user abandoned consent. Clears the outstanding verifier and
    /// reports `UserCanceled`; the login state is untouched.
    pub async fn cancel_authorization(&self) -> TransitionResult {
        let _guard = self.lock_other_transition().await;
        let mut warnings = Vec::new();
        if let Err(e) = self.flow.discard_verifier() {
            warnings.push(e.into());
        }
        self.settle(Transition::Cancel, Err(AuthError::UserCanceled), warnings)
    }

    /// Refresh the provider credential and re-check federation.
    ///
    /// Anything short of "provider usable and federation live" ends in a
    /// full logout.
    pub async fn refresh(&self) -> TransitionResult {
        let observed = self.refresh_generation.load(Ordering::Acquire);
        let _guard = self.transition.lock().await;

        if self.refresh_generation.load(Ordering::Acquire) != observed {
            let joined = self
                .last_refresh
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            if let Some(outcome) = joined {
                debug!("joined in-flight refresh");
                return outcome;
            }
        }

        let outcome = self.refresh_locked().await;
        *self
            .last_refresh
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(outcome.clone());
        self.refresh_generation.fetch_add(1, Ordering::Release);
        outcome
    }

    /// Revoke the provider credential and end the federated session.
    ///
    /// Always ends `LoggedOut`; individual failures come back as warnings.
    pub async fn logout(&self) -> Outcome {
        let _guard = self.lock_other_transition().await;
        let mut warnings = Vec::new();
        self.clear_all(&mut warnings);
        if !warnings.is_empty() {
            warn!(
                failures = warnings.len(),
                "one or more services failed to log out completely"
            );
        }
        self.publish(LoginState::LoggedOut);
        self.report(Transition::Logout, None, &warnings);
        Outcome {
            state: LoginState::LoggedOut,
            warnings,
        }
    }

    /// Take the transition lock for anything other than a refresh. The
    /// cached refresh outcome is dropped so a refresh queued behind this
    /// transition runs against the state it leaves instead of joining an
    /// older result.
    async fn lock_other_transition(&self) -> MutexGuard<'_, ()> {
        let guard = self.transition.lock().await;
        self.last_refresh
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        guard
    }

    async fn complete_callback(&self, parsed: provider_auth::Result<String>) -> TransitionResult {
        match parsed {
            Ok(code) => self.login(&code).await,
            Err(provider_auth::Error::UserCanceled) => self.cancel_authorization().await,
            Err(invalid) => {
                let _guard = self.lock_other_transition().await;
                let mut warnings = Vec::new();
                if let Err(e) = self.flow.discard_verifier() {
                    warnings.push(e.into());
                }
                self.settle(Transition::Login, Err(invalid.into()), warnings)
            }
        }
    }

    async fn login_locked(&self, code: &str) -> TransitionResult {
        let started_from = self.state();
        let mut warnings = Vec::new();

        let credential = match self.flow.exchange_code(code).await {
            Ok(persisted) => {
                warnings.extend(persisted.warnings.into_iter().map(AuthError::from));
                persisted.value
            }
            Err(e) => {
                if started_from == LoginState::ProviderOnly {
                    // Half session left over from an earlier run.
                    self.clear_all(&mut warnings);
                    self.publish(LoginState::LoggedOut);
                }
                return self.settle(Transition::Login, Err(e.into()), warnings);
            }
        };
        self.publish(LoginState::ProviderOnly);

        match self
            .federation
            .federate(credential.access_token.expose_str())
            .await
        {
            Ok(persisted) => {
                warnings.extend(persisted.warnings.into_iter().map(AuthError::from));
                self.publish(LoginState::FullyAuthenticated);
                self.settle(
                    Transition::Login,
                    Ok(LoginState::FullyAuthenticated),
                    warnings,
                )
            }
            Err(e) => {
                let error = AuthError::from(e);
                warn!(error = %error, "federation failed, rolling back provider credential");
                self.clear_all(&mut warnings);
                self.publish(LoginState::LoggedOut);
                self.settle(Transition::Login, Err(error), warnings)
            }
        }
    }

    async fn refresh_locked(&self) -> TransitionResult {
        let mut warnings = Vec::new();

        let error = match self.flow.refresh_if_needed().await {
            Ok(persisted) => {
                warnings.extend(persisted.warnings.into_iter().map(AuthError::from));
                if !persisted.value {
                    info!("nothing to refresh with, logging out");
                    self.clear_all(&mut warnings);
                    self.publish(LoginState::LoggedOut);
                    return self.settle(Transition::Refresh, Ok(LoginState::LoggedOut), warnings);
                }
                if self.federation.current_identity().is_some() {
                    self.publish(LoginState::FullyAuthenticated);
                    return self.settle(
                        Transition::Refresh,
                        Ok(LoginState::FullyAuthenticated),
                        warnings,
                    );
                }
                AuthError::FederationUnauthenticated("federated session is no longer active".into())
            }
            Err(e) => e.into(),
        };

        warn!(error = %error, "refresh failed, logging out");
        self.clear_all(&mut warnings);
        self.publish(LoginState::LoggedOut);
        self.settle(Transition::Refresh, Err(error), warnings)
    }

    /// Revoke the provider credential and sign out of federation. Both are
    /// attempted regardless of the other's outcome.
    fn clear_all(&self, warnings: &mut Vec<AuthError>) {
        if let Err(e) = self.flow.revoke() {
            warnings.push(e.into());
        }
        if let Err(e) = self.federation.sign_out() {
            warnings.push(e.into());
        }
    }

    /// Publish a new snapshot. Observers hear about state changes only.
    fn publish(&self, state: LoginState) {
        let status = AuthStatus {
            state,
            provider_authenticated: self.flow.has_credential(),
            federated: self.federation.current_identity().is_some(),
        };
        let previous = self.status.send_replace(status);
        if previous.state == state {
            return;
        }

        info!(
            from = previous.state.label(),
            to = state.label(),
            "login state changed"
        );
        for observer in self.observers() {
            observer.on_state_changed(state);
        }
    }

    fn settle(
        &self,
        transition: Transition,
        result: Result<LoginState, AuthError>,
        warnings: Vec<AuthError>,
    ) -> TransitionResult {
        self.report(transition, result.as_ref().err(), &warnings);
        result.map(|state| Outcome { state, warnings })
    }

    /// Count, log, and alert once for a finished transition attempt.
    fn report(&self, transition: Transition, error: Option<&AuthError>, warnings: &[AuthError]) {
        let outcome = match error {
            Some(AuthError::UserCanceled) => "canceled",
            Some(_) => "error",
            None if warnings.is_empty() => "ok",
            None => "degraded",
        };
        metrics::counter!(
            "auth_transitions_total",
            "transition" => transition.label(),
            "outcome" => outcome
        )
        .increment(1);

        match error {
            Some(e) => warn!(
                transition = transition.label(),
                kind = e.kind(),
                error = %e,
                warnings = warnings.len(),
                "transition failed"
            ),
            None => info!(
                transition = transition.label(),
                outcome,
                warnings = warnings.len(),
                "transition completed"
            ),
        }

        if error.is_none() && warnings.is_empty() {
            return;
        }
        let alert = Alert {
            transition,
            error: error.cloned(),
            warnings: warnings.to_vec(),
        };
        for observer in self.observers() {
            observer.on_alert(&alert);
        }
    }

    fn observers(&self) -> Vec<Arc<dyn AuthObserver>> {
        self.observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl std::fmt::Debug for AuthCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthCoordinator")
            .field("status", &self.status())
            .field("flow", &self.flow)
            .finish_non_exhaustive()
    }
}

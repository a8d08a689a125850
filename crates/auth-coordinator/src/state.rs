//! Login state, published status, and observer hooks

use crate::error::AuthError;

/// Combined login state.
///
/// Transitions:
/// - LoggedOut → ProviderOnly (code exchanged, federation pending)
/// - ProviderOnly → FullyAuthenticated (federation succeeded)
/// - ProviderOnly → LoggedOut (federation failed, rolled back)
/// - FullyAuthenticated → FullyAuthenticated (refresh succeeded)
/// - * → LoggedOut (logout, failed refresh)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoginState {
    LoggedOut,
    ProviderOnly,
    FullyAuthenticated,
}

impl LoginState {
    /// Derive the state from what is actually held.
    pub fn derive(provider_authenticated: bool, federated: bool) -> Self {
        match (provider_authenticated, federated) {
            (true, true) => LoginState::FullyAuthenticated,
            (true, false) => LoginState::ProviderOnly,
            (false, _) => LoginState::LoggedOut,
        }
    }

    /// Label for health/logging.
    pub fn label(&self) -> &'static str {
        match self {
            LoginState::LoggedOut => "logged_out",
            LoginState::ProviderOnly => "provider_only",
            LoginState::FullyAuthenticated => "fully_authenticated",
        }
    }
}

/// Snapshot published to subscribers after every transition step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthStatus {
    pub state: LoginState,
    pub provider_authenticated: bool,
    pub federated: bool,
}

impl AuthStatus {
    pub fn logged_in(&self) -> bool {
        self.state == LoginState::FullyAuthenticated
    }
}

/// The coordinator operation an alert belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    Login,
    Refresh,
    Logout,
    Cancel,
}

impl Transition {
    pub fn label(&self) -> &'static str {
        match self {
            Transition::Login => "login",
            Transition::Refresh => "refresh",
            Transition::Logout => "logout",
            Transition::Cancel => "cancel",
        }
    }
}

/// One per transition attempt that has something to report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub transition: Transition,
    pub error: Option<AuthError>,
    pub warnings: Vec<AuthError>,
}

/// Result of a transition that reached its intended state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub state: LoginState,
    /// Non-fatal failures (storage writes, partial logout)
    pub warnings: Vec<AuthError>,
}

/// Hook for presentation layers. Called while the transition lock is held,
/// so callbacks see transitions in order and must not block.
pub trait AuthObserver: Send + Sync {
    fn on_state_changed(&self, state: LoginState);

    fn on_alert(&self, _alert: &Alert) {}
}

//! Federated login coordinator
//!
//! Unifies the provider's PKCE login and identity federation into one
//! all-or-nothing login state. Consumers see a single `logged_in` flag (plus
//! the two provider-level flags) through [`AuthCoordinator::subscribe`] or an
//! [`AuthObserver`]; token material never leaves the lower crates.
//!
//! Session lifecycle:
//! 1. `begin_login()` returns the consent URL (verifier persisted)
//! 2. `login(code)` exchanges the code → `ProviderOnly`, then federates →
//!    `FullyAuthenticated`; a federation failure rolls back to `LoggedOut`
//! 3. `refresh()` (single-flight) keeps the provider token fresh; any failure
//!    logs out completely
//! 4. `logout()` revokes both sides and always ends `LoggedOut`
//! 5. A background task calls `refresh()` periodically

pub mod coordinator;
pub mod error;
pub mod refresh;
pub mod state;

#[cfg(test)]
mod testing;

pub use coordinator::{AuthCoordinator, TransitionResult};
pub use error::AuthError;
pub use refresh::spawn_refresh_task;
pub use state::{Alert, AuthObserver, AuthStatus, LoginState, Outcome, Transition};

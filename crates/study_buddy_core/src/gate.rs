//! crates/study_buddy_core/src/gate.rs
//!
//! The route-level auth gate. A fresh gate is mounted for every protected route
//! and starts in `Resolving`; nothing protected renders until the session
//! provider has answered.

use tracing::{debug, info};

use crate::domain::{SessionEvent, User};
use crate::ports::{PortError, SessionProvider};

/// Why the gate ended up unauthenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignedOutReason {
    NoSession,
    SignedOut,
    Expired,
    ProviderError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateState {
    Resolving,
    Authenticated(User),
    Unauthenticated(SignedOutReason),
}

/// What the route should do right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Session state is still resolving; render nothing protected.
    Wait,
    Render,
    /// The only effect allowed once unauthenticated.
    Redirect(String),
}

#[derive(Debug)]
pub struct AuthGate {
    state: GateState,
    sign_in_path: String,
}

impl AuthGate {
    /// Mounts a gate for a protected route.
    pub fn mount(sign_in_path: impl Into<String>) -> Self {
        Self {
            state: GateState::Resolving,
            sign_in_path: sign_in_path.into(),
        }
    }

    pub fn state(&self) -> &GateState {
        &self.state
    }

    pub fn user(&self) -> Option<&User> {
        match &self.state {
            GateState::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    pub fn decision(&self) -> GateDecision {
        match self.state {
            GateState::Resolving => GateDecision::Wait,
            GateState::Authenticated(_) => GateDecision::Render,
            GateState::Unauthenticated(_) => GateDecision::Redirect(self.sign_in_path.clone()),
        }
    }

    /// Asks the provider for a session and settles the gate.
    pub async fn resolve<P: SessionProvider + ?Sized>(&mut self, provider: &P) -> GateDecision {
        if !matches!(self.state, GateState::Resolving) {
            return self.decision();
        }
        match provider.current_session().await {
            Ok(session) => {
                debug!(user_id = %session.user.id, "Auth gate resolved to authenticated");
                self.state = GateState::Authenticated(session.user);
            }
            Err(PortError::Unauthenticated) => {
                self.sign_out(SignedOutReason::NoSession);
            }
            Err(e) => {
                info!("Session provider failed while resolving auth gate: {}", e);
                self.sign_out(SignedOutReason::ProviderError);
            }
        }
        self.decision()
    }

    /// Applies a session-change event from the provider.
    pub fn on_session_event(&mut self, event: &SessionEvent) -> GateDecision {
        match event {
            SessionEvent::SignedOut => self.sign_out(SignedOutReason::SignedOut),
            SessionEvent::Expired => self.sign_out(SignedOutReason::Expired),
            SessionEvent::SignedIn(user) | SessionEvent::TokenRefreshed(user) => {
                if let GateState::Authenticated(current) = &mut self.state {
                    *current = user.clone();
                }
            }
            SessionEvent::Initial => {}
        }
        self.decision()
    }

    /// Applies the outcome of an API call; only auth failures affect the gate.
    pub fn on_api_error(&mut self, err: &PortError) -> GateDecision {
        if err.is_unauthenticated() {
            self.sign_out(SignedOutReason::Expired);
        }
        self.decision()
    }

    /// Follows the provider's events until the gate stops being authenticated
    /// or the provider goes away.
    pub async fn watch<P: SessionProvider + ?Sized>(&mut self, provider: &P) -> GateDecision {
        let mut events = provider.subscribe();
        while matches!(self.state, GateState::Authenticated(_)) {
            if events.changed().await.is_err() {
                self.sign_out(SignedOutReason::ProviderError);
                break;
            }
            let event = events.borrow_and_update().clone();
            self.on_session_event(&event);
        }
        self.decision()
    }

    // `Unauthenticated` is terminal for this mount.
    fn sign_out(&mut self, reason: SignedOutReason) {
        if matches!(self.state, GateState::Unauthenticated(_)) {
            return;
        }
        debug!(?reason, "Auth gate transitioned to unauthenticated");
        self.state = GateState::Unauthenticated(reason);
    }
}

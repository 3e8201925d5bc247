//! Admin authorization
//!
//! A single shared secret unlocks privileged actions for a fixed window.
//! The window is absolute: it is not extended by later activity, and expiry
//! is only noticed the next time a privileged action is attempted.

use crate::session::{PrivilegedAction, Session, WaitingFor};
use chrono::{DateTime, TimeDelta, Utc};

/// Outcome of a password submission
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verification {
    /// Secret matched; carries the action to resume, if one was pending
    Authenticated(Option<PrivilegedAction>),
    /// Secret did not match; session left untouched
    Rejected,
}

/// Evaluates, grants and revokes admin rights stored in a [`Session`].
#[derive(Clone, Debug)]
pub struct AuthGate {
    secret: String,
    timeout_minutes: u32,
}

impl AuthGate {
    /// Create a gate for the configured secret and session length.
    #[must_use]
    pub fn new(secret: impl Into<String>, timeout_minutes: u32) -> Self {
        Self {
            secret: secret.into(),
            timeout_minutes,
        }
    }

    /// Configured session length in minutes
    #[must_use]
    pub const fn timeout_minutes(&self) -> u32 {
        self.timeout_minutes
    }

    fn window(&self) -> TimeDelta {
        TimeDelta::minutes(i64::from(self.timeout_minutes))
    }

    /// True iff an expiry is stored and `now` is strictly before it.
    #[must_use]
    pub fn is_authorized(session: &Session, now: DateTime<Utc>) -> bool {
        session.authorized_until.is_some_and(|until| now < until)
    }

    /// Ask for the password and remember what to do afterwards.
    pub fn challenge(session: &mut Session, action: PrivilegedAction) {
        session.set_waiting(WaitingFor::Password);
        session.pending_action = Some(action);
    }

    /// Check a submitted secret.
    ///
    /// On a match the session is authorized until `now + timeout`, the
    /// pending mode is cleared and the remembered action is handed back.
    pub fn verify(&self, session: &mut Session, submitted: &str, now: DateTime<Utc>) -> Verification {
        if submitted != self.secret {
            return Verification::Rejected;
        }

        session.authorized_until = Some(now + self.window());
        let action = session.pending_action.take();
        session.set_waiting(WaitingFor::None);
        Verification::Authenticated(action)
    }

    /// Immediate logout.
    pub fn revoke(session: &mut Session) {
        session.authorized_until = None;
    }
}

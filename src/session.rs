//! Per-conversation session record.
//!
//! One `Session` exists per chat. The transport keeps it in teloxide's
//! dialogue storage; a chat without a stored record starts from
//! `Session::default()`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pending-input mode of a conversation. At most one is active.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum WaitingFor {
    /// No pending input
    #[default]
    None,
    /// Next text is the name of a new category
    NewCategoryName,
    /// Next text selects the category that receives uploads
    UploadTarget,
    /// Next text selects the category to sample from
    RandomTarget,
    /// Next text is the admin password
    Password,
}

/// Privileged action remembered while the password is requested
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum PrivilegedAction {
    /// Create a new category
    CreateCategory,
    /// Start an upload session
    Upload,
}

/// Mutable state of a single conversation
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    /// Pending-input mode
    pub waiting_for: WaitingFor,
    /// Category currently accepting photo uploads
    pub target_category: Option<String>,
    /// Action to resume after a successful password check
    pub pending_action: Option<PrivilegedAction>,
    /// Admin rights hold while the current time is strictly before this instant
    pub authorized_until: Option<DateTime<Utc>>,
}

impl Session {
    /// Whether photo attachments are currently stored.
    #[must_use]
    pub fn upload_target(&self) -> Option<&str> {
        self.target_category.as_deref()
    }

    /// Switch the pending-input mode.
    ///
    /// A remembered action only survives while the password is awaited.
    pub fn set_waiting(&mut self, mode: WaitingFor) {
        self.waiting_for = mode;
        if mode != WaitingFor::Password {
            self.pending_action = None;
        }
    }

    /// Drop the pending-input mode and any remembered action.
    pub fn clear_pending(&mut self) {
        self.set_waiting(WaitingFor::None);
    }
}

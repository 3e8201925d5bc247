//! Conversation state machine
//!
//! Interprets one inbound [`Event`] against a [`Session`], drives the
//! catalog, and answers with transport-agnostic [`Reply`] values. The
//! session is passed in by the caller, which is responsible for loading it
//! before and persisting it after the call.
//!
//! Text precedence: a pending password check wins over everything, then the
//! menu labels, then the pending-input mode. A category named after a menu
//! label, or after the password, is therefore unreachable by typing.

use crate::auth::{AuthGate, Verification};
use crate::presentation::{render_stats, MenuItem};
use crate::session::{PrivilegedAction, Session, WaitingFor};
use crate::storage::{CatalogError, CatalogStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Downloads the bytes behind an attachment id
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Fetch the full content of `file_id`
    async fn fetch(&self, file_id: &str) -> anyhow::Result<Vec<u8>>;
}

/// Inbound event of a conversation
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// `/start`
    Start,
    /// `/list`
    List,
    /// `/random`
    Random,
    /// `/add_species`
    AddCategory,
    /// `/upload`
    Upload,
    /// `/logout`
    Logout,
    /// `/cancel`
    Cancel,
    /// `/done`
    Done,
    /// Free text, including reply-keyboard labels
    Text(String),
    /// Photo attachment (largest size)
    Photo {
        /// Transport file id
        file_id: String,
    },
    /// Tap on the statistics refresh button
    RefreshList,
}

/// Keyboard instruction attached to a text reply
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Keyboard {
    /// Leave whatever keyboard the user has
    Keep,
    /// Hide the reply keyboard
    Remove,
    /// Full menu shown on `/start`
    MainMenu,
    /// Menu shown after finishing a flow
    ShortMenu,
    /// Category picker
    Categories(Vec<String>),
    /// Single `/done` button during uploads
    Done,
}

/// Outbound action for the transport
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    /// Plain text message
    Text {
        /// Message body
        text: String,
        /// Keyboard instruction
        keyboard: Keyboard,
    },
    /// Statistics, already escaped for MarkdownV2
    Stats {
        /// Escaped body
        text: String,
        /// Attach the inline refresh button
        refreshable: bool,
    },
    /// Replace the statistics message the refresh button belongs to
    EditStats {
        /// Escaped body
        text: String,
    },
    /// Photo from local storage
    Photo {
        /// File to upload
        path: PathBuf,
        /// Caption
        caption: String,
    },
    /// Remove the message that triggered this event
    DeleteIncoming,
    /// Acknowledge a button tap
    AckCallback,
}

impl Reply {
    fn text(text: impl Into<String>, keyboard: Keyboard) -> Self {
        Self::Text {
            text: text.into(),
            keyboard,
        }
    }
}

/// Drives conversations over a catalog
pub struct ConversationController {
    store: Arc<dyn CatalogStore>,
    fetcher: Arc<dyn MediaFetcher>,
    gate: AuthGate,
}

impl ConversationController {
    /// Create a controller over `store`, downloading attachments with `fetcher`.
    #[must_use]
    pub fn new(store: Arc<dyn CatalogStore>, fetcher: Arc<dyn MediaFetcher>, gate: AuthGate) -> Self {
        Self {
            store,
            fetcher,
            gate,
        }
    }

    /// Process one event, mutating `session` in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be read or written. Conflicts
    /// and invalid names are answered, not returned. The session may already
    /// be partially updated when an error is returned.
    pub async fn handle(
        &self,
        session: &mut Session,
        event: Event,
        now: DateTime<Utc>,
    ) -> Result<Vec<Reply>, CatalogError> {
        match event {
            Event::Start => Ok(vec![Reply::text(
                "Welcome! Use the menu below to manage the plant database.",
                Keyboard::MainMenu,
            )]),
            Event::List => self.list(true).await,
            Event::Random => self.random_prompt(session).await,
            Event::AddCategory => {
                self.request_privileged(session, PrivilegedAction::CreateCategory, now)
                    .await
            }
            Event::Upload => {
                self.request_privileged(session, PrivilegedAction::Upload, now)
                    .await
            }
            Event::Logout => Ok(Self::logout(session, "Admin session ended.")),
            Event::Cancel => Ok(Self::cancel(session)),
            Event::Done => {
                session.target_category = None;
                Ok(vec![Reply::text("Finished.", Keyboard::ShortMenu)])
            }
            Event::Text(text) => self.handle_text(session, &text, now).await,
            Event::Photo { file_id } => Ok(self.handle_photo(session, &file_id).await),
            Event::RefreshList => {
                let text = render_stats(&self.category_stats().await?);
                Ok(vec![Reply::EditStats { text }, Reply::AckCallback])
            }
        }
    }

    async fn handle_text(
        &self,
        session: &mut Session,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Reply>, CatalogError> {
        if session.waiting_for == WaitingFor::Password {
            return self.submit_password(session, text, now).await;
        }

        if let Some(item) = MenuItem::from_label(text) {
            return match item {
                MenuItem::List => self.list(false).await,
                MenuItem::Upload => {
                    self.request_privileged(session, PrivilegedAction::Upload, now)
                        .await
                }
                MenuItem::AddNew => {
                    self.request_privileged(session, PrivilegedAction::CreateCategory, now)
                        .await
                }
                MenuItem::Random => self.random_prompt(session).await,
                MenuItem::Logout => Ok(Self::logout(session, "Logged out.")),
                MenuItem::Cancel => Ok(Self::cancel(session)),
            };
        }

        match session.waiting_for {
            WaitingFor::NewCategoryName => self.create_category(session, text).await,
            WaitingFor::UploadTarget => self.select_upload_target(session, text).await,
            WaitingFor::RandomTarget => self.pick_random(session, text).await,
            WaitingFor::None | WaitingFor::Password => Ok(Vec::new()),
        }
    }

    /// Prompt for the action's input if authorized, otherwise challenge.
    async fn request_privileged(
        &self,
        session: &mut Session,
        action: PrivilegedAction,
        now: DateTime<Utc>,
    ) -> Result<Vec<Reply>, CatalogError> {
        if !AuthGate::is_authorized(session, now) {
            AuthGate::challenge(session, action);
            return Ok(vec![Reply::text(
                "🔐 Admin session required. Please enter the password:",
                Keyboard::Remove,
            )]);
        }

        match action {
            PrivilegedAction::CreateCategory => {
                session.set_waiting(WaitingFor::NewCategoryName);
                Ok(vec![Reply::text(
                    "Enter the name of the new plant species:",
                    Keyboard::Keep,
                )])
            }
            PrivilegedAction::Upload => {
                let categories = self.store.list_categories().await?;
                session.set_waiting(WaitingFor::UploadTarget);
                Ok(vec![Reply::text(
                    "Select a species to upload to:",
                    Keyboard::Categories(categories),
                )])
            }
        }
    }

    async fn submit_password(
        &self,
        session: &mut Session,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Reply>, CatalogError> {
        match self.gate.verify(session, text, now) {
            Verification::Rejected => Ok(vec![Reply::text(
                "❌ Wrong password. Try again or /cancel.",
                Keyboard::Keep,
            )]),
            Verification::Authenticated(action) => {
                info!("Admin session granted for {} minutes", self.gate.timeout_minutes());
                let mut replies = vec![
                    Reply::DeleteIncoming,
                    Reply::text(
                        format!(
                            "✅ Authenticated for {} minutes.",
                            self.gate.timeout_minutes()
                        ),
                        Keyboard::Keep,
                    ),
                ];
                if let Some(action) = action {
                    replies.extend(self.request_privileged(session, action, now).await?);
                }
                Ok(replies)
            }
        }
    }

    async fn create_category(
        &self,
        session: &mut Session,
        name: &str,
    ) -> Result<Vec<Reply>, CatalogError> {
        match self.store.create_category(name).await {
            Ok(()) => {
                session.set_waiting(WaitingFor::None);
                Ok(vec![Reply::text(
                    format!("✅ Added \"{name}\""),
                    Keyboard::ShortMenu,
                )])
            }
            Err(CatalogError::AlreadyExists(_)) => {
                Ok(vec![Reply::text("Already exists!", Keyboard::Keep)])
            }
            Err(CatalogError::InvalidName(_)) => Ok(vec![Reply::text(
                "This name cannot be used. Avoid slashes, names like \".\" or \"..\", and very long names.",
                Keyboard::Keep,
            )]),
            Err(e) => Err(e),
        }
    }

    async fn select_upload_target(
        &self,
        session: &mut Session,
        name: &str,
    ) -> Result<Vec<Reply>, CatalogError> {
        // Unknown names are ignored without a reply
        if !self.store.category_exists(name).await? {
            return Ok(Vec::new());
        }

        session.target_category = Some(name.to_string());
        session.set_waiting(WaitingFor::None);
        Ok(vec![Reply::text(
            format!("Ready for \"{name}\". Send photos, then /done."),
            Keyboard::Done,
        )])
    }

    async fn random_prompt(&self, session: &mut Session) -> Result<Vec<Reply>, CatalogError> {
        let categories = self.store.list_categories().await?;
        if categories.is_empty() {
            return Ok(vec![Reply::text("DB is empty.", Keyboard::Keep)]);
        }

        session.set_waiting(WaitingFor::RandomTarget);
        Ok(vec![Reply::text(
            "Pick a species:",
            Keyboard::Categories(categories),
        )])
    }

    async fn pick_random(
        &self,
        session: &mut Session,
        name: &str,
    ) -> Result<Vec<Reply>, CatalogError> {
        let picked = self.store.pick_random(name).await?;
        session.set_waiting(WaitingFor::None);

        Ok(vec![match picked {
            Some(id) => Reply::Photo {
                path: self.store.media_path(name, &id),
                caption: format!("Random {name}"),
            },
            None => Reply::text("No images found.", Keyboard::Keep),
        }])
    }

    async fn handle_photo(&self, session: &Session, file_id: &str) -> Vec<Reply> {
        let Some(target) = session.upload_target() else {
            return Vec::new();
        };

        let bytes = match self.fetcher.fetch(file_id).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to download photo for '{target}': {e}");
                return vec![Reply::text("⚠️ Could not download the photo.", Keyboard::Keep)];
            }
        };

        match self.store.store_media(target, bytes).await {
            Ok(id) => {
                info!("Saved {id} to '{target}'");
                vec![Reply::text("📷 Saved! Send more or /done.", Keyboard::Keep)]
            }
            Err(e) => {
                error!("Failed to store photo in '{target}': {e}");
                vec![Reply::text("⚠️ Could not save the photo.", Keyboard::Keep)]
            }
        }
    }

    async fn list(&self, refreshable: bool) -> Result<Vec<Reply>, CatalogError> {
        let text = render_stats(&self.category_stats().await?);
        Ok(vec![Reply::Stats { text, refreshable }])
    }

    async fn category_stats(&self) -> Result<Vec<(String, usize)>, CatalogError> {
        let mut stats = Vec::new();
        for name in self.store.list_categories().await? {
            let count = self.store.count_media(&name).await?;
            stats.push((name, count));
        }
        Ok(stats)
    }

    fn logout(session: &mut Session, text: &str) -> Vec<Reply> {
        AuthGate::revoke(session);
        vec![Reply::text(text, Keyboard::Remove)]
    }

    fn cancel(session: &mut Session) -> Vec<Reply> {
        session.clear_pending();
        vec![Reply::text("Action cancelled.", Keyboard::ShortMenu)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FsMediaStore, MockCatalogStore};
    use chrono::TimeDelta;
    use mockall::predicate::eq;
    use tempfile::TempDir;

    const SECRET: &str = "admin123";

    struct Harness {
        controller: ConversationController,
        store: Arc<FsMediaStore>,
        session: Session,
        now: DateTime<Utc>,
        _temp: TempDir,
    }

    impl Harness {
        async fn new(fetcher: MockMediaFetcher) -> anyhow::Result<Self> {
            let temp = TempDir::new()?;
            let store = Arc::new(
                FsMediaStore::open(temp.path().join("storage"), temp.path().join("plants.json"))
                    .await?,
            );
            let controller = ConversationController::new(
                store.clone(),
                Arc::new(fetcher),
                AuthGate::new(SECRET, 30),
            );
            Ok(Self {
                controller,
                store,
                session: Session::default(),
                now: Utc::now(),
                _temp: temp,
            })
        }

        async fn send(&mut self, event: Event) -> Result<Vec<Reply>, CatalogError> {
            self.controller.handle(&mut self.session, event, self.now).await
        }

        async fn text(&mut self, text: &str) -> Result<Vec<Reply>, CatalogError> {
            self.send(Event::Text(text.to_string())).await
        }

        fn authorize(&mut self) {
            self.session.authorized_until = Some(self.now + TimeDelta::minutes(30));
        }
    }

    fn fetcher_returning(bytes: &'static [u8]) -> MockMediaFetcher {
        let mut fetcher = MockMediaFetcher::new();
        fetcher.expect_fetch().returning(move |_| Ok(bytes.to_vec()));
        fetcher
    }

    fn first_text(replies: &[Reply]) -> Option<&str> {
        replies.iter().find_map(|r| match r {
            Reply::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }

    #[tokio::test]
    async fn test_unauthorized_add_challenges() -> anyhow::Result<()> {
        let mut h = Harness::new(MockMediaFetcher::new()).await?;

        let replies = h.send(Event::AddCategory).await?;

        assert_eq!(h.session.waiting_for, WaitingFor::Password);
        assert_eq!(h.session.pending_action, Some(PrivilegedAction::CreateCategory));
        assert_eq!(
            replies,
            vec![Reply::text(
                "🔐 Admin session required. Please enter the password:",
                Keyboard::Remove
            )]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_password_resumes_pending_action_once() -> anyhow::Result<()> {
        let mut h = Harness::new(MockMediaFetcher::new()).await?;
        h.send(Event::AddCategory).await?;

        let replies = h.text(SECRET).await?;

        assert_eq!(replies[0], Reply::DeleteIncoming);
        assert_eq!(
            replies[1],
            Reply::text("✅ Authenticated for 30 minutes.", Keyboard::Keep)
        );
        let prompts = replies
            .iter()
            .filter(|r| {
                matches!(r, Reply::Text { text, .. } if text == "Enter the name of the new plant species:")
            })
            .count();
        assert_eq!(prompts, 1);
        assert_eq!(h.session.waiting_for, WaitingFor::NewCategoryName);
        assert!(h.session.pending_action.is_none());
        assert!(AuthGate::is_authorized(&h.session, h.now));
        Ok(())
    }

    #[tokio::test]
    async fn test_wrong_password_keeps_challenge() -> anyhow::Result<()> {
        let mut h = Harness::new(MockMediaFetcher::new()).await?;
        h.send(Event::Upload).await?;

        let replies = h.text("guess").await?;

        assert_eq!(
            first_text(&replies),
            Some("❌ Wrong password. Try again or /cancel.")
        );
        assert_eq!(h.session.waiting_for, WaitingFor::Password);
        assert_eq!(h.session.pending_action, Some(PrivilegedAction::Upload));
        assert!(h.session.authorized_until.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_password_checked_before_menu_labels() -> anyhow::Result<()> {
        let mut h = Harness::new(MockMediaFetcher::new()).await?;
        h.send(Event::AddCategory).await?;

        let replies = h.text(crate::presentation::LABEL_LIST).await?;

        assert_eq!(
            first_text(&replies),
            Some("❌ Wrong password. Try again or /cancel.")
        );
        assert_eq!(h.session.waiting_for, WaitingFor::Password);
        Ok(())
    }

    #[tokio::test]
    async fn test_upload_after_password_shows_picker() -> anyhow::Result<()> {
        let mut h = Harness::new(MockMediaFetcher::new()).await?;
        h.store.create_category("Fern").await?;
        h.store.create_category("Moss").await?;
        h.send(Event::Upload).await?;

        let replies = h.text(SECRET).await?;

        assert_eq!(
            replies.last(),
            Some(&Reply::text(
                "Select a species to upload to:",
                Keyboard::Categories(vec!["Fern".to_string(), "Moss".to_string()])
            ))
        );
        assert_eq!(h.session.waiting_for, WaitingFor::UploadTarget);
        Ok(())
    }

    #[tokio::test]
    async fn test_expired_authorization_challenges_again() -> anyhow::Result<()> {
        let mut h = Harness::new(MockMediaFetcher::new()).await?;
        h.session.authorized_until = Some(h.now);

        h.send(Event::AddCategory).await?;

        assert_eq!(h.session.waiting_for, WaitingFor::Password);
        Ok(())
    }

    #[tokio::test]
    async fn test_create_category_flow() -> anyhow::Result<()> {
        let mut h = Harness::new(MockMediaFetcher::new()).await?;
        h.authorize();
        h.send(Event::AddCategory).await?;

        let replies = h.text("Fern").await?;

        assert_eq!(
            replies,
            vec![Reply::text("✅ Added \"Fern\"", Keyboard::ShortMenu)]
        );
        assert_eq!(h.session.waiting_for, WaitingFor::None);
        assert!(h.store.category_exists("Fern").await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_duplicate_category_stays_waiting() -> anyhow::Result<()> {
        let mut h = Harness::new(MockMediaFetcher::new()).await?;
        h.store.create_category("Fern").await?;
        h.authorize();
        h.send(Event::AddCategory).await?;

        let replies = h.text("Fern").await?;

        assert_eq!(first_text(&replies), Some("Already exists!"));
        assert_eq!(h.session.waiting_for, WaitingFor::NewCategoryName);
        assert_eq!(h.store.list_categories().await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_category_name_stays_waiting() -> anyhow::Result<()> {
        let mut h = Harness::new(MockMediaFetcher::new()).await?;
        h.authorize();
        h.send(Event::AddCategory).await?;

        h.text("../etc").await?;

        assert_eq!(h.session.waiting_for, WaitingFor::NewCategoryName);
        assert!(h.store.list_categories().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_overlong_category_name_is_answered() -> anyhow::Result<()> {
        let mut h = Harness::new(MockMediaFetcher::new()).await?;
        h.authorize();
        h.send(Event::AddCategory).await?;

        let replies = h.text(&"Папоротник".repeat(13)).await?;

        assert_eq!(replies.len(), 1);
        assert!(first_text(&replies).is_some_and(|t| t.starts_with("This name cannot be used.")));
        assert_eq!(h.session.waiting_for, WaitingFor::NewCategoryName);
        assert!(h.store.list_categories().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_upload_target_is_silent() -> anyhow::Result<()> {
        let mut h = Harness::new(MockMediaFetcher::new()).await?;
        h.authorize();
        h.send(Event::Upload).await?;

        let replies = h.text("Nope").await?;

        assert!(replies.is_empty());
        assert_eq!(h.session.waiting_for, WaitingFor::UploadTarget);
        assert!(h.session.target_category.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_photo_saved_while_target_set() -> anyhow::Result<()> {
        let mut h = Harness::new(fetcher_returning(b"img")).await?;
        h.store.create_category("Fern").await?;
        h.authorize();
        h.send(Event::Upload).await?;
        let replies = h.text("Fern").await?;
        assert_eq!(
            replies,
            vec![Reply::text(
                "Ready for \"Fern\". Send photos, then /done.",
                Keyboard::Done
            )]
        );

        let replies = h
            .send(Event::Photo {
                file_id: "abc".to_string(),
            })
            .await?;

        assert_eq!(first_text(&replies), Some("📷 Saved! Send more or /done."));
        assert_eq!(h.store.count_media("Fern").await?, 1);
        assert_eq!(h.session.target_category.as_deref(), Some("Fern"));
        Ok(())
    }

    #[tokio::test]
    async fn test_photo_without_target_is_not_downloaded() -> anyhow::Result<()> {
        let mut fetcher = MockMediaFetcher::new();
        fetcher.expect_fetch().never();
        let mut h = Harness::new(fetcher).await?;

        let replies = h
            .send(Event::Photo {
                file_id: "abc".to_string(),
            })
            .await?;

        assert!(replies.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_photo_download_failure_reported() -> anyhow::Result<()> {
        let mut fetcher = MockMediaFetcher::new();
        fetcher
            .expect_fetch()
            .with(eq("abc"))
            .returning(|_| Err(anyhow::anyhow!("network down")));
        let mut h = Harness::new(fetcher).await?;
        h.store.create_category("Fern").await?;
        h.session.target_category = Some("Fern".to_string());

        let replies = h
            .send(Event::Photo {
                file_id: "abc".to_string(),
            })
            .await?;

        assert_eq!(first_text(&replies), Some("⚠️ Could not download the photo."));
        assert_eq!(h.store.count_media("Fern").await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_upload_mode_survives_other_commands() -> anyhow::Result<()> {
        let mut h = Harness::new(fetcher_returning(b"img")).await?;
        h.store.create_category("Fern").await?;
        h.session.target_category = Some("Fern".to_string());

        h.send(Event::List).await?;
        h.send(Event::Cancel).await?;
        h.send(Event::Photo {
            file_id: "abc".to_string(),
        })
        .await?;

        assert_eq!(h.store.count_media("Fern").await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_done_clears_target() -> anyhow::Result<()> {
        let mut h = Harness::new(MockMediaFetcher::new()).await?;
        h.session.target_category = Some("Fern".to_string());
        h.session.set_waiting(WaitingFor::RandomTarget);

        let replies = h.send(Event::Done).await?;

        assert_eq!(replies, vec![Reply::text("Finished.", Keyboard::ShortMenu)]);
        assert!(h.session.target_category.is_none());
        assert_eq!(h.session.waiting_for, WaitingFor::RandomTarget);
        Ok(())
    }

    #[tokio::test]
    async fn test_cancel_clears_pending() -> anyhow::Result<()> {
        let mut h = Harness::new(MockMediaFetcher::new()).await?;
        h.send(Event::Upload).await?;

        h.send(Event::Cancel).await?;

        assert_eq!(h.session.waiting_for, WaitingFor::None);
        assert!(h.session.pending_action.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_logout_label_revokes() -> anyhow::Result<()> {
        let mut h = Harness::new(MockMediaFetcher::new()).await?;
        h.authorize();

        let replies = h.text(crate::presentation::LABEL_LOGOUT).await?;

        assert_eq!(replies, vec![Reply::text("Logged out.", Keyboard::Remove)]);
        assert!(h.session.authorized_until.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_random_on_empty_catalog() -> anyhow::Result<()> {
        let mut h = Harness::new(MockMediaFetcher::new()).await?;

        let replies = h.send(Event::Random).await?;

        assert_eq!(replies, vec![Reply::text("DB is empty.", Keyboard::Keep)]);
        assert_eq!(h.session.waiting_for, WaitingFor::None);
        Ok(())
    }

    #[tokio::test]
    async fn test_menu_labels_match_commands() -> anyhow::Result<()> {
        let mut h = Harness::new(MockMediaFetcher::new()).await?;

        let replies = h.text(crate::presentation::LABEL_RANDOM).await?;
        assert_eq!(replies, vec![Reply::text("DB is empty.", Keyboard::Keep)]);

        h.send(Event::Upload).await?;
        let replies = h.text(crate::presentation::LABEL_CANCEL).await?;
        // The password check wins while it is pending
        assert_eq!(first_text(&replies), Some("❌ Wrong password. Try again or /cancel."));

        h.send(Event::Cancel).await?;
        h.authorize();
        h.send(Event::AddCategory).await?;
        let replies = h.text(crate::presentation::LABEL_CANCEL).await?;
        assert_eq!(replies, vec![Reply::text("Action cancelled.", Keyboard::ShortMenu)]);
        assert_eq!(h.session.waiting_for, WaitingFor::None);
        Ok(())
    }

    #[tokio::test]
    async fn test_random_pick_without_images() -> anyhow::Result<()> {
        let mut h = Harness::new(MockMediaFetcher::new()).await?;
        h.store.create_category("Fern").await?;
        h.text(crate::presentation::LABEL_RANDOM).await?;
        assert_eq!(h.session.waiting_for, WaitingFor::RandomTarget);

        let replies = h.text("Fern").await?;

        assert_eq!(replies, vec![Reply::text("No images found.", Keyboard::Keep)]);
        assert_eq!(h.session.waiting_for, WaitingFor::None);
        Ok(())
    }

    #[tokio::test]
    async fn test_random_pick_returns_photo() -> anyhow::Result<()> {
        let mut h = Harness::new(MockMediaFetcher::new()).await?;
        h.store.create_category("Fern").await?;
        let id = h.store.store_media_at("Fern", b"img", h.now).await?;
        h.send(Event::Random).await?;

        let replies = h.text("Fern").await?;

        assert_eq!(
            replies,
            vec![Reply::Photo {
                path: h.store.media_path("Fern", &id),
                caption: "Random Fern".to_string(),
            }]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_random_during_challenge_forgets_pending_action() -> anyhow::Result<()> {
        let mut h = Harness::new(MockMediaFetcher::new()).await?;
        h.store.create_category("Fern").await?;
        h.send(Event::AddCategory).await?;
        assert_eq!(h.session.pending_action, Some(PrivilegedAction::CreateCategory));

        h.send(Event::Random).await?;
        assert_eq!(h.session.waiting_for, WaitingFor::RandomTarget);
        assert!(h.session.pending_action.is_none());

        h.text("Fern").await?;
        assert_eq!(h.session.waiting_for, WaitingFor::None);
        assert!(h.session.pending_action.is_none());

        // A later login must not resume the abandoned action
        h.send(Event::Upload).await?;
        let replies = h.text(SECRET).await?;
        assert!(replies.iter().any(
            |r| matches!(r, Reply::Text { text, .. } if text == "Select a species to upload to:")
        ));
        assert_eq!(h.session.waiting_for, WaitingFor::UploadTarget);
        Ok(())
    }

    #[tokio::test]
    async fn test_list_and_refresh() -> anyhow::Result<()> {
        let mut h = Harness::new(MockMediaFetcher::new()).await?;
        h.store.create_category("Fern").await?;

        let listed = h.send(Event::List).await?;
        let refreshed = h.send(Event::RefreshList).await?;

        let body = "🌿 \\*Fern\\*: 0 images".to_string();
        assert_eq!(
            listed,
            vec![Reply::Stats {
                text: body.clone(),
                refreshable: true
            }]
        );
        assert_eq!(
            refreshed,
            vec![Reply::EditStats { text: body }, Reply::AckCallback]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_idle_text_ignored() -> anyhow::Result<()> {
        let mut h = Harness::new(MockMediaFetcher::new()).await?;

        assert!(h.text("hello").await?.is_empty());
        assert_eq!(h.session, Session::default());
        Ok(())
    }

    #[tokio::test]
    async fn test_store_failure_on_save_is_reported() -> anyhow::Result<()> {
        let mut store = MockCatalogStore::new();
        store
            .expect_store_media()
            .returning(|_, _| Err(CatalogError::Io(std::io::Error::other("disk full"))));
        let controller = ConversationController::new(
            Arc::new(store),
            Arc::new(fetcher_returning(b"img")),
            AuthGate::new(SECRET, 30),
        );
        let mut session = Session {
            target_category: Some("Fern".to_string()),
            ..Session::default()
        };

        let replies = controller
            .handle(
                &mut session,
                Event::Photo {
                    file_id: "abc".to_string(),
                },
                Utc::now(),
            )
            .await?;

        assert_eq!(first_text(&replies), Some("⚠️ Could not save the photo."));
        Ok(())
    }

    #[tokio::test]
    async fn test_index_failure_propagates() {
        let mut store = MockCatalogStore::new();
        store
            .expect_list_categories()
            .returning(|| Err(CatalogError::Io(std::io::Error::other("unreadable"))));
        let controller = ConversationController::new(
            Arc::new(store),
            Arc::new(MockMediaFetcher::new()),
            AuthGate::new(SECRET, 30),
        );
        let mut session = Session::default();

        let result = controller.handle(&mut session, Event::List, Utc::now()).await;

        assert!(matches!(result, Err(CatalogError::Io(_))));
    }
}

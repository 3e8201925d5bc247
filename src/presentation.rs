//! Text rendering for catalog replies.
//!
//! Reply-keyboard labels live here because the controller matches incoming
//! text against them before looking at the pending-input mode.

// lazy_regex! uses once_cell internally
#![allow(clippy::non_std_lazy_statics)]

use lazy_regex::lazy_regex;

/// Characters MarkdownV2 treats as markup
static RE_MARKDOWN_SPECIAL: lazy_regex::Lazy<regex::Regex> =
    lazy_regex!(r"[_*\[\]()~`>#+\-=|{}.!]");

/// Menu button: show statistics
pub const LABEL_LIST: &str = "🌿 List Species";
/// Menu button: start an upload session
pub const LABEL_UPLOAD: &str = "📷 Upload";
/// Menu button: request a random photo
pub const LABEL_RANDOM: &str = "🎲 Random Photo";
/// Menu button: create a category
pub const LABEL_ADD: &str = "➕ Add New";
/// Menu button: abort the pending input
pub const LABEL_CANCEL: &str = "❌ Cancel";
/// Menu button: end the admin session
pub const LABEL_LOGOUT: &str = "🔓 Logout";
/// Reply-keyboard button shown during uploads
pub const LABEL_DONE: &str = "/done";
/// Inline button under the statistics message
pub const LABEL_REFRESH: &str = "🔄 Refresh";
/// Callback data of the refresh button
pub const CALLBACK_REFRESH_LIST: &str = "refresh_list";

/// Reply-keyboard shortcut recognised in free text
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MenuItem {
    /// Show statistics
    List,
    /// Start an upload session
    Upload,
    /// Request a random photo
    Random,
    /// Create a category
    AddNew,
    /// End the admin session
    Logout,
    /// Abort the pending input
    Cancel,
}

impl MenuItem {
    /// Map an exact button label to its shortcut.
    #[must_use]
    pub fn from_label(text: &str) -> Option<Self> {
        match text {
            LABEL_LIST => Some(Self::List),
            LABEL_UPLOAD => Some(Self::Upload),
            LABEL_RANDOM => Some(Self::Random),
            LABEL_ADD => Some(Self::AddNew),
            LABEL_LOGOUT => Some(Self::Logout),
            LABEL_CANCEL => Some(Self::Cancel),
            _ => None,
        }
    }
}

/// Prefix every MarkdownV2 special character with a backslash.
///
/// # Examples
///
/// ```
/// use herbarium_bot::presentation::escape_markdown;
/// assert_eq!(escape_markdown("a.b!"), "a\\.b\\!");
/// ```
#[must_use]
pub fn escape_markdown(text: &str) -> String {
    RE_MARKDOWN_SPECIAL.replace_all(text, r"\$0").into_owned()
}

/// One line per category with its photo count, unescaped.
#[must_use]
pub fn format_stats(stats: &[(String, usize)]) -> String {
    if stats.is_empty() {
        return "No species in database yet.".to_string();
    }
    stats
        .iter()
        .map(|(name, count)| format!("🌿 *{name}*: {count} images"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Statistics ready to send with MarkdownV2 parsing.
#[must_use]
pub fn render_stats(stats: &[(String, usize)]) -> String {
    escape_markdown(&format_stats(stats))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_full_set() {
        let input = "_*[]()~`>#+-=|{}.!";
        let expected = r"\_\*\[\]\(\)\~\`\>\#\+\-\=\|\{\}\.\!";
        assert_eq!(escape_markdown(input), expected);
    }

    #[test]
    fn test_escape_leaves_other_chars() {
        // Backslash and angle-left are not part of the set
        assert_eq!(escape_markdown(r"Rosa \ canina <x"), r"Rosa \ canina <x");
        assert_eq!(escape_markdown("Привет 🌿"), "Привет 🌿");
    }

    #[test]
    fn test_stats_empty() {
        assert_eq!(render_stats(&[]), r"No species in database yet\.");
    }

    #[test]
    fn test_stats_lines() {
        let stats = vec![("Fern".to_string(), 3), ("Aloe vera".to_string(), 0)];
        assert_eq!(
            render_stats(&stats),
            "🌿 \\*Fern\\*: 3 images\n🌿 \\*Aloe vera\\*: 0 images"
        );
    }

    #[test]
    fn test_stats_escape_names() {
        let stats = vec![("St.-John's-wort".to_string(), 1)];
        assert_eq!(
            render_stats(&stats),
            "🌿 \\*St\\.\\-John's\\-wort\\*: 1 images"
        );
    }

    #[test]
    fn test_menu_labels() {
        assert_eq!(MenuItem::from_label(LABEL_LIST), Some(MenuItem::List));
        assert_eq!(MenuItem::from_label(LABEL_CANCEL), Some(MenuItem::Cancel));
        assert_eq!(MenuItem::from_label("List Species"), None);
        assert_eq!(MenuItem::from_label(LABEL_DONE), None);
    }
}

//! Catalog UI components
//!
//! Maps the controller's keyboard instructions to Telegram markup.

use crate::controller::Keyboard;
use crate::presentation::{
    CALLBACK_REFRESH_LIST, LABEL_ADD, LABEL_CANCEL, LABEL_DONE, LABEL_LIST, LABEL_LOGOUT,
    LABEL_RANDOM, LABEL_REFRESH, LABEL_UPLOAD,
};
use teloxide::types::{
    InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup, KeyboardRemove,
    ReplyMarkup,
};

/// Buttons per row in the category picker
pub const CATEGORY_COLUMNS: usize = 2;

/// Rows shared by the full and the short menu
fn menu_rows() -> Vec<Vec<KeyboardButton>> {
    vec![
        vec![KeyboardButton::new(LABEL_LIST), KeyboardButton::new(LABEL_UPLOAD)],
        vec![KeyboardButton::new(LABEL_RANDOM), KeyboardButton::new(LABEL_ADD)],
    ]
}

/// Get the full menu keyboard shown on `/start`
///
/// # Examples
///
/// ```
/// use herbarium_bot::bot::views::get_main_keyboard;
/// let keyboard = get_main_keyboard();
/// assert_eq!(keyboard.keyboard.len(), 3);
/// ```
#[must_use]
pub fn get_main_keyboard() -> KeyboardMarkup {
    let mut rows = menu_rows();
    rows.push(vec![
        KeyboardButton::new(LABEL_CANCEL),
        KeyboardButton::new(LABEL_LOGOUT),
    ]);
    KeyboardMarkup::new(rows).resize_keyboard()
}

/// Get the menu shown after a flow completes
#[must_use]
pub fn get_short_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(menu_rows()).resize_keyboard()
}

/// Get the category picker, two names per row
#[must_use]
pub fn get_categories_keyboard(categories: &[String]) -> KeyboardMarkup {
    let rows = categories
        .chunks(CATEGORY_COLUMNS)
        .map(|chunk| chunk.iter().map(|name| KeyboardButton::new(name.clone())).collect())
        .collect::<Vec<Vec<_>>>();
    KeyboardMarkup::new(rows).resize_keyboard()
}

/// Get the single-button keyboard shown during uploads
#[must_use]
pub fn get_done_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![vec![KeyboardButton::new(LABEL_DONE)]]).resize_keyboard()
}

/// Get the inline refresh button for the statistics message
#[must_use]
pub fn refresh_list_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        LABEL_REFRESH,
        CALLBACK_REFRESH_LIST,
    )]])
}

/// Telegram markup for a keyboard instruction; `None` leaves the current one.
///
/// An empty category picker hides the keyboard, since Telegram rejects
/// keyboards without buttons.
#[must_use]
pub fn reply_markup(keyboard: &Keyboard) -> Option<ReplyMarkup> {
    match keyboard {
        Keyboard::Keep => None,
        Keyboard::Remove => Some(ReplyMarkup::KeyboardRemove(KeyboardRemove::new())),
        Keyboard::MainMenu => Some(ReplyMarkup::Keyboard(get_main_keyboard())),
        Keyboard::ShortMenu => Some(ReplyMarkup::Keyboard(get_short_keyboard())),
        Keyboard::Categories(names) if names.is_empty() => {
            Some(ReplyMarkup::KeyboardRemove(KeyboardRemove::new()))
        }
        Keyboard::Categories(names) => {
            Some(ReplyMarkup::Keyboard(get_categories_keyboard(names)))
        }
        Keyboard::Done => Some(ReplyMarkup::Keyboard(get_done_keyboard())),
    }
}

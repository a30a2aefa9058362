//! The catalog of syncable item types.
//!
//! Over the wire an item's type is never sent as a standalone field: it is
//! implied by which variant of the entity specifics is populated. Inside the
//! server it is convenient to have a proper enum.

use crate::error::CodecError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Well-known server tag of the top-level folder.
pub const TOP_LEVEL_FOLDER_TAG: &str = "google_chrome";

/// The parent id that marks a top-level node.
pub const ROOT_ID: &str = "0";

/// A kind of data that can be synced.
///
/// On the wire a data type travels as its protocol field number. The
/// distinguished [`DataType::TopLevel`] type has no field number; it only
/// exists server-side as the type of the top-level permanent folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum DataType {
    /// The type of the top-level folder.
    TopLevel,
    /// Installed apps.
    Apps,
    /// App notifications.
    AppNotification,
    /// Per-app settings.
    AppSettings,
    /// Autofill entries.
    Autofill,
    /// Autofill profiles.
    AutofillProfile,
    /// Bookmarks and bookmark folders.
    Bookmark,
    /// Installed extensions.
    Extensions,
    /// Encryption keys.
    Nigori,
    /// Saved passwords.
    Password,
    /// Preferences.
    Preference,
    /// Search engines.
    SearchEngine,
    /// Open sessions.
    Session,
    /// Themes.
    Theme,
    /// Typed URLs.
    TypedUrl,
    /// Per-extension settings.
    ExtensionSettings,
}

impl DataType {
    /// Every data type, top-level first.
    pub const ALL: [DataType; 16] = [
        DataType::TopLevel,
        DataType::Apps,
        DataType::AppNotification,
        DataType::AppSettings,
        DataType::Autofill,
        DataType::AutofillProfile,
        DataType::Bookmark,
        DataType::Extensions,
        DataType::Nigori,
        DataType::Password,
        DataType::Preference,
        DataType::SearchEngine,
        DataType::Session,
        DataType::Theme,
        DataType::TypedUrl,
        DataType::ExtensionSettings,
    ];

    /// Returns the protocol field number of this type's specifics.
    pub fn protocol_id(self) -> Option<u32> {
        let id = match self {
            DataType::TopLevel => return None,
            DataType::Apps => 48364,
            DataType::AppNotification => 45184,
            DataType::AppSettings => 103656,
            DataType::Autofill => 31729,
            DataType::AutofillProfile => 63951,
            DataType::Bookmark => 32904,
            DataType::Extensions => 48119,
            DataType::Nigori => 47745,
            DataType::Password => 45873,
            DataType::Preference => 37702,
            DataType::SearchEngine => 88610,
            DataType::Session => 50119,
            DataType::Theme => 41210,
            DataType::TypedUrl => 40781,
            DataType::ExtensionSettings => 96159,
        };
        Some(id)
    }

    /// Looks up a type by its protocol field number.
    pub fn from_protocol_id(id: u32) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|data_type| data_type.protocol_id() == Some(id))
    }

    /// Returns the protocol name of this type.
    pub fn name(self) -> &'static str {
        match self {
            DataType::TopLevel => "top_level",
            DataType::Apps => "app",
            DataType::AppNotification => "app_notification",
            DataType::AppSettings => "app_setting",
            DataType::Autofill => "autofill",
            DataType::AutofillProfile => "autofill_profile",
            DataType::Bookmark => "bookmark",
            DataType::Extensions => "extension",
            DataType::Nigori => "nigori",
            DataType::Password => "password",
            DataType::Preference => "preference",
            DataType::SearchEngine => "search_engine",
            DataType::Session => "session",
            DataType::Theme => "theme",
            DataType::TypedUrl => "typed_url",
            DataType::ExtensionSettings => "extension_setting",
        }
    }

    /// Parses a type name typed by a human.
    ///
    /// Capitalization and pluralization are ignored, and a bare protocol
    /// field number is accepted too. The top-level type cannot be named.
    pub fn from_str_loose(text: &str) -> Option<Self> {
        if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) {
            return text.parse().ok().and_then(Self::from_protocol_id);
        }
        let wanted = text.to_ascii_lowercase();
        let wanted = wanted.trim_end_matches('s');
        Self::ALL
            .iter()
            .copied()
            .filter(|data_type| *data_type != DataType::TopLevel)
            .find(|data_type| data_type.name().trim_end_matches('s') == wanted)
    }
}

/// The wire value. [`DataType::TopLevel`] is written as `0`.
impl From<DataType> for u32 {
    fn from(data_type: DataType) -> Self {
        data_type.protocol_id().unwrap_or(0)
    }
}

impl TryFrom<u32> for DataType {
    type Error = CodecError;

    fn try_from(id: u32) -> Result<Self, Self::Error> {
        if id == 0 {
            return Ok(DataType::TopLevel);
        }
        DataType::from_protocol_id(id).ok_or(CodecError::UnknownDataType(id))
    }
}

/// Formats a set of types compactly for log output.
///
/// When the set holds almost every type, it is described by what it
/// leaves out instead.
pub fn summarize_types(types: impl IntoIterator<Item = DataType>) -> String {
    let included: BTreeSet<DataType> = types
        .into_iter()
        .filter(|t| *t != DataType::TopLevel)
        .collect();
    if included.is_empty() {
        return "nothing".to_string();
    }
    let excluded: BTreeSet<DataType> = DataType::ALL
        .iter()
        .copied()
        .filter(|t| *t != DataType::TopLevel && !included.contains(t))
        .collect();
    if excluded.is_empty() {
        return "everything".to_string();
    }

    let join = |set: &BTreeSet<DataType>| {
        let mut names: Vec<&str> = set.iter().map(|t| t.name()).collect();
        names.sort_unstable();
        names.join("+")
    };
    let simple = join(&included);
    let all_but = format!("all except {}", join(&excluded));
    if included.len() < excluded.len() || simple.len() <= all_but.len() {
        simple
    } else {
        all_but
    }
}

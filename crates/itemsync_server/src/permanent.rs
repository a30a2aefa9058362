//! Server-created permanent folders.
//!
//! Permanent items are created lazily the first time a client asks for
//! updates of their type. Items not created by default only appear on
//! explicit request.

use itemsync_protocol::{DataType, ROOT_ID, TOP_LEVEL_FOLDER_TAG};

/// Description of one permanent folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermanentItem {
    /// Server tag, unique across the catalog.
    pub tag: &'static str,
    /// Name and display name.
    pub name: &'static str,
    /// Server tag of the parent, or the root sentinel.
    pub parent_tag: &'static str,
    /// Type of the folder.
    pub data_type: DataType,
    /// Whether a first-time sync of the type creates the folder.
    pub create_by_default: bool,
}

const fn item(
    tag: &'static str,
    name: &'static str,
    parent_tag: &'static str,
    data_type: DataType,
) -> PermanentItem {
    PermanentItem {
        tag,
        name,
        parent_tag,
        data_type,
        create_by_default: true,
    }
}

/// Server tag of the optional mobile bookmarks folder.
pub const SYNCED_BOOKMARKS_TAG: &str = "synced_bookmarks";

/// The permanent folder catalog. Parents precede their children.
pub const PERMANENT_ITEMS: &[PermanentItem] = &[
    item(TOP_LEVEL_FOLDER_TAG, "Google Chrome", ROOT_ID, DataType::TopLevel),
    item(
        "google_chrome_bookmarks",
        "Bookmarks",
        TOP_LEVEL_FOLDER_TAG,
        DataType::Bookmark,
    ),
    item(
        "bookmark_bar",
        "Bookmark Bar",
        "google_chrome_bookmarks",
        DataType::Bookmark,
    ),
    item(
        "other_bookmarks",
        "Other Bookmarks",
        "google_chrome_bookmarks",
        DataType::Bookmark,
    ),
    PermanentItem {
        create_by_default: false,
        ..item(
            SYNCED_BOOKMARKS_TAG,
            "Synced Bookmarks",
            "google_chrome_bookmarks",
            DataType::Bookmark,
        )
    },
    item(
        "google_chrome_preferences",
        "Preferences",
        TOP_LEVEL_FOLDER_TAG,
        DataType::Preference,
    ),
    item(
        "google_chrome_autofill",
        "Autofill",
        TOP_LEVEL_FOLDER_TAG,
        DataType::Autofill,
    ),
    item(
        "google_chrome_autofill_profiles",
        "Autofill Profiles",
        TOP_LEVEL_FOLDER_TAG,
        DataType::AutofillProfile,
    ),
    item(
        "google_chrome_app_settings",
        "App Settings",
        TOP_LEVEL_FOLDER_TAG,
        DataType::AppSettings,
    ),
    item(
        "google_chrome_extension_settings",
        "Extension Settings",
        TOP_LEVEL_FOLDER_TAG,
        DataType::ExtensionSettings,
    ),
    item(
        "google_chrome_extensions",
        "Extensions",
        TOP_LEVEL_FOLDER_TAG,
        DataType::Extensions,
    ),
    item(
        "google_chrome_passwords",
        "Passwords",
        TOP_LEVEL_FOLDER_TAG,
        DataType::Password,
    ),
    item(
        "google_chrome_search_engines",
        "Search Engines",
        TOP_LEVEL_FOLDER_TAG,
        DataType::SearchEngine,
    ),
    item(
        "google_chrome_sessions",
        "Sessions",
        TOP_LEVEL_FOLDER_TAG,
        DataType::Session,
    ),
    item(
        "google_chrome_themes",
        "Themes",
        TOP_LEVEL_FOLDER_TAG,
        DataType::Theme,
    ),
    item(
        "google_chrome_typed_urls",
        "Typed URLs",
        TOP_LEVEL_FOLDER_TAG,
        DataType::TypedUrl,
    ),
    item(
        "google_chrome_nigori",
        "Nigori",
        TOP_LEVEL_FOLDER_TAG,
        DataType::Nigori,
    ),
    item(
        "google_chrome_apps",
        "Apps",
        TOP_LEVEL_FOLDER_TAG,
        DataType::Apps,
    ),
    item(
        "google_chrome_app_notifications",
        "App Notifications",
        TOP_LEVEL_FOLDER_TAG,
        DataType::AppNotification,
    ),
];

/// Looks up a permanent item by its server tag.
pub fn find(tag: &str) -> Option<&'static PermanentItem> {
    PERMANENT_ITEMS.iter().find(|item| item.tag == tag)
}

/// Returns the root folder of `data_type`, the first catalog entry of that
/// type.
pub fn type_root(data_type: DataType) -> Option<&'static PermanentItem> {
    PERMANENT_ITEMS
        .iter()
        .find(|item| item.data_type == data_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn tags_are_unique() {
        let tags: HashSet<&str> = PERMANENT_ITEMS.iter().map(|item| item.tag).collect();
        assert_eq!(tags.len(), PERMANENT_ITEMS.len());
    }

    #[test]
    fn parents_come_first() {
        for (index, item) in PERMANENT_ITEMS.iter().enumerate() {
            if item.parent_tag == ROOT_ID {
                continue;
            }
            let parent_index = PERMANENT_ITEMS
                .iter()
                .position(|p| p.tag == item.parent_tag)
                .unwrap();
            assert!(parent_index < index, "{} precedes its parent", item.tag);
        }
    }

    #[test]
    fn every_type_has_a_root_folder() {
        for data_type in DataType::ALL {
            assert!(
                PERMANENT_ITEMS.iter().any(|item| item.data_type == data_type),
                "{data_type:?} has no permanent folder"
            );
        }
    }

    #[test]
    fn lookup_by_tag() {
        assert_eq!(find("bookmark_bar").map(|i| i.name), Some("Bookmark Bar"));
        assert!(find("nope").is_none());
    }

    #[test]
    fn type_roots() {
        assert_eq!(
            type_root(DataType::Bookmark).map(|i| i.tag),
            Some("google_chrome_bookmarks")
        );
        assert_eq!(
            type_root(DataType::TopLevel).map(|i| i.tag),
            Some(TOP_LEVEL_FOLDER_TAG)
        );
        assert!(PERMANENT_ITEMS
            .iter()
            .filter(|item| !item.create_by_default)
            .all(|item| type_root(item.data_type) != Some(item)));
    }

    #[test]
    fn synced_bookmarks_are_opt_in() {
        let synced = find(SYNCED_BOOKMARKS_TAG).unwrap();
        assert!(!synced.create_by_default);
        assert_eq!(synced.name, "Synced Bookmarks");
        assert_eq!(synced.parent_tag, "google_chrome_bookmarks");
    }
}

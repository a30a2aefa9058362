//! Server configuration.

/// Default number of entries in one GetUpdates page.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Default preferred gap between sibling positions.
pub const DEFAULT_POSITION_GAP: i64 = 1 << 20;

/// Configuration for the sync server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Maximum number of entries in one GetUpdates page. Clients cannot
    /// change this.
    pub batch_size: usize,
    /// Preferred gap between sibling positions.
    pub position_gap: i64,
    /// Email reported by Authenticate.
    pub user_email: String,
    /// Display name reported by Authenticate.
    pub user_display_name: String,
}

impl ServerConfig {
    /// Creates a new server configuration with default values.
    pub fn new() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            position_gap: DEFAULT_POSITION_GAP,
            user_email: "syncjuser@chromium".to_string(),
            user_display_name: "Sync J User".to_string(),
        }
    }

    /// Sets the GetUpdates page size.
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Sets the preferred sibling position gap.
    pub fn with_position_gap(mut self, gap: i64) -> Self {
        self.position_gap = gap.max(1);
        self
    }

    /// Sets the account identity reported by Authenticate.
    pub fn with_user(mut self, email: impl Into<String>, display_name: impl Into<String>) -> Self {
        self.user_email = email.into();
        self.user_display_name = display_name.into();
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}

use std::time::Duration;

use crate::slots::SlotLayout;

pub const DEFAULT_BASE_URL: &str = "http://localhost:5001";

/// Matches the backend's upstream timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2000);

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub slots: SlotLayout,
}

impl ClientConfig {
    pub fn new<S: Into<String>>(base_url: S) -> Self {
        Self::default().with_base_url(base_url)
    }

    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_slots(mut self, slots: SlotLayout) -> Self {
        self.slots = slots;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            slots: SlotLayout::default(),
        }
    }
}

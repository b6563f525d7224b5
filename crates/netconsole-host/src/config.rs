use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::RwLock;
use tracing::info;

/// Settings the embedder exposes to the console host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ConsoleConfig {
    pub ignore_https_certificate_errors: bool,
    pub developer_mode: bool,
    pub open_frontend_in_multiple_tabs: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            ignore_https_certificate_errors: true,
            developer_mode: false,
            open_frontend_in_multiple_tabs: false,
        }
    }
}

/// Read-mostly configuration holder. The snapshot is cheap to clone; the
/// embedder pushes a rebuilt value through `apply` on change notifications.
pub struct ConfigurationManager {
    current: RwLock<ConsoleConfig>,
}

impl ConfigurationManager {
    pub fn new(initial: ConsoleConfig) -> Self {
        Self {
            current: RwLock::new(initial),
        }
    }

    /// Builds a manager from the embedder's settings JSON. Unknown fields are
    /// ignored; missing fields take their defaults.
    pub fn from_settings(settings: &Value) -> Self {
        let config = serde_json::from_value(settings.clone()).unwrap_or_default();
        Self::new(config)
    }

    pub fn snapshot(&self) -> ConsoleConfig {
        self.current.read().expect("config lock poisoned").clone()
    }

    pub fn apply(&self, next: ConsoleConfig) {
        let mut current = self.current.write().expect("config lock poisoned");
        if *current != next {
            info!(
                event = "config_changed",
                multi_tab = next.open_frontend_in_multiple_tabs,
                developer_mode = next.developer_mode
            );
            *current = next;
        }
    }
}

impl Default for ConfigurationManager {
    fn default() -> Self {
        Self::new(ConsoleConfig::default())
    }
}

use crate::Error;
use serde::{Deserialize, Serialize};

/// Runtime knobs of a client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Maximum number of rerender/process rounds run by the flush loop before giving up.
    pub max_flush_iterations: usize,
    /// Give locator comment nodes a descriptive label (development mode).
    pub debug_labels: bool,
    /// Destroy values synchronously even when a deferred destroy was requested (testing mode).
    pub force_sync_destroy: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            max_flush_iterations: 15,
            debug_labels: false,
            force_sync_destroy: false,
        }
    }
}

impl ClientConfig {
    /// Parses a configuration from JSON. Missing fields take their default value.
    pub fn from_json(json: &str) -> Result<ClientConfig, Error> {
        Ok(serde_json::from_str(json)?)
    }

    /// Configuration used in development: labelled locators, synchronous destroys.
    pub fn development() -> ClientConfig {
        ClientConfig {
            debug_labels: true,
            force_sync_destroy: true,
            ..ClientConfig::default()
        }
    }
}

use serde::{Deserialize, Serialize};

fn default_transaction_cache_capacity() -> usize {
    256
}

/// `plugins.iap` section of the Tauri configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IapConfig {
    /// Finish purchased and restored transactions right after relaying them.
    #[serde(default)]
    pub auto_finish_transactions: bool,
    /// Upper bound of unfinished transactions kept for `finish_transaction`.
    /// `0` keeps every transaction until it is finished.
    #[serde(default = "default_transaction_cache_capacity")]
    pub transaction_cache_capacity: usize,
}

impl Default for IapConfig {
    fn default() -> Self {
        Self {
            auto_finish_transactions: false,
            transaction_cache_capacity: default_transaction_cache_capacity(),
        }
    }
}

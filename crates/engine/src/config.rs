use serde::Deserialize;

const DEFAULT_RECORD_BATCH_SIZE: usize = 500;
const DEFAULT_ORDER_BATCH_SIZE: usize = 500;

/// Tunables of the engine.
///
/// Deserializable so embedders can read it from their own configuration
/// files; missing keys fall back to the defaults.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Records per batch handed to the record repository.
    pub record_batch_size: usize,
    /// Record order updates per batch.
    pub order_batch_size: usize,
}

impl EngineConfig {
    /// Clamps batch sizes to at least one.
    pub fn normalized(self) -> Self {
        EngineConfig {
            record_batch_size: self.record_batch_size.max(1),
            order_batch_size: self.order_batch_size.max(1),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            record_batch_size: DEFAULT_RECORD_BATCH_SIZE,
            order_batch_size: DEFAULT_ORDER_BATCH_SIZE,
        }
    }
}

//! Engine configuration

use serde::{Deserialize, Serialize};

/// Behavioral switches consulted by the inheritance engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Whether operations originate from declarative definitions. Explicit
    /// `inherited` declarations are enforced only in declarative mode;
    /// programmatic merges (derivation, cascades) run with this off.
    pub declarative: bool,

    /// Whether rebase cascades synthesize visible descendant sub-operations
    /// for the diffing/replay machinery
    pub record_descendant_ops: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            declarative: true,
            record_descendant_ops: true,
        }
    }
}

impl EngineConfig {
    /// Configuration for programmatic (non-declarative) schema manipulation
    #[must_use]
    pub fn programmatic() -> Self {
        Self {
            declarative: false,
            ..Self::default()
        }
    }
}

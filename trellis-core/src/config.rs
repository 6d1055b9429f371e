//! Runtime Configuration
//!
//! The reactive core has very few knobs. Both of them concern what happens
//! when a trigger cascade reaches an effect that is already running.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Default bound on the number of simultaneously running (nested) effects.
pub const DEFAULT_MAX_EFFECT_DEPTH: usize = 100;

/// Settings for a [`Runtime`](crate::reactive::Runtime).
///
/// Missing fields fall back to their defaults, so a partial JSON document
/// such as `{"max_effect_depth": 32}` is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Let a trigger re-run an effect that is already on the tracking stack.
    ///
    /// Off by default: an effect that writes to state it also reads does not
    /// re-enter itself, and two effects feeding each other settle after one
    /// round instead of recursing forever.
    pub allow_recursive_effects: bool,

    /// Maximum nesting of running effects before the runtime gives up.
    ///
    /// Reaching it is fatal: the offending run panics with
    /// [`Error::EffectDepthExceeded`](crate::Error::EffectDepthExceeded).
    pub max_effect_depth: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            allow_recursive_effects: false,
            max_effect_depth: DEFAULT_MAX_EFFECT_DEPTH,
        }
    }
}

impl RuntimeConfig {
    /// Parse a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_forbid_recursion() {
        let config = RuntimeConfig::default();
        assert!(!config.allow_recursive_effects);
        assert_eq!(config.max_effect_depth, DEFAULT_MAX_EFFECT_DEPTH);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = RuntimeConfig::from_json(r#"{"max_effect_depth": 8}"#).unwrap();
        assert_eq!(config.max_effect_depth, 8);
        assert!(!config.allow_recursive_effects);
    }

    #[test]
    fn malformed_json_is_an_error() {
        let err = RuntimeConfig::from_json("{not json").unwrap_err();
        assert!(matches!(err, crate::Error::Serialization(_)));
    }
}

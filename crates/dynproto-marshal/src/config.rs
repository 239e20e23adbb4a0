//! Marshaling options.

use serde::{Deserialize, Serialize};

/// Default nesting limit for decoding.
pub const DEFAULT_MAX_DEPTH: usize = 100;

/// Options shared by every marshaling call of a host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MarshalConfig {
    /// Deepest message nesting `decode` and `unpack` will follow.
    pub max_depth: usize,
    /// Decode enum fields to their value names instead of numbers. Numbers
    /// with no declared name stay integers.
    pub enums_as_names: bool,
}

impl Default for MarshalConfig {
    fn default() -> Self {
        Self { max_depth: DEFAULT_MAX_DEPTH, enums_as_names: false }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MarshalConfig::default();
        assert_eq!(config.max_depth, 100);
        assert!(!config.enums_as_names);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config: MarshalConfig = serde_yaml::from_str("enums_as_names: true\n").unwrap();
        assert_eq!(config, MarshalConfig { max_depth: DEFAULT_MAX_DEPTH, enums_as_names: true });
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(serde_json::from_str::<MarshalConfig>(r#"{"max_detph": 3}"#).is_err());
    }
}

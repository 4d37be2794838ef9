//! Review gate configuration

use serde::{Deserialize, Serialize};

/// Configuration for review rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    /// Trim and lowercase tags
    pub normalize_tags: bool,

    /// Longest accepted tag (characters)
    pub max_tag_len: usize,

    /// Most tags on one fragment
    pub max_tags: usize,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            normalize_tags: true,
            max_tag_len: 64,
            max_tags: 20,
        }
    }
}

impl ReviewConfig {
    /// Keep tags exactly as typed
    pub fn verbatim_tags() -> Self {
        Self {
            normalize_tags: false,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ReviewConfig::default();
        assert!(config.normalize_tags);
        assert_eq!(config.max_tags, 20);
    }

    #[test]
    fn test_verbatim_tags_config() {
        assert!(!ReviewConfig::verbatim_tags().normalize_tags);
    }
}

//! Search configuration parameters.
//!
//! A `SearchConfig` is fixed for the lifetime of a search engine. It can be
//! built in code or read from a TOML file; missing keys take the defaults.

use crate::{store::is_valid_run_id, Result, SearchError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which selection rule picks the node to expand from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// Upper-confidence-bound tree descent.
    #[default]
    Full,
    /// Always the best-reward expandable node.
    Greedy,
    /// A uniformly random expandable node.
    Random,
}

/// Search configuration parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Selection rule.
    pub mode: SearchMode,

    /// Depth at which nodes become terminal. The root is depth 0.
    pub max_depth: usize,

    /// Number of children a node may receive before it counts as fully expanded.
    pub max_children: usize,

    /// Weight of the exploration bonus in the UCB score.
    pub exploration_constant: f64,

    /// Reflection runs only when the parent's reward is strictly below this.
    pub success_threshold: f64,

    /// Reward recorded for candidates whose execution failed.
    pub failure_reward: f64,

    /// Extra generation attempts after the first failure, per parent.
    pub generation_retries: u32,

    /// Attach `fixed_insights` to every child instead of reflecting.
    pub use_fixed_insights: bool,

    /// Domain insights used when `use_fixed_insights` is set.
    pub fixed_insights: Vec<String>,

    /// Key under which the tree is persisted.
    pub run_id: String,

    /// Seed for the random selection rule.
    pub seed: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            mode: SearchMode::Full,
            max_depth: 5,
            max_children: 3,
            exploration_constant: 1.4,
            success_threshold: 1.0,
            failure_reward: 0.0,
            generation_retries: 2,
            use_fixed_insights: false,
            fixed_insights: Vec::new(),
            run_id: "default".to_string(),
            seed: 42,
        }
    }
}

impl SearchConfig {
    /// Create a config with the given selection rule.
    pub fn with_mode(mode: SearchMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    /// Parse a config from TOML text.
    ///
    /// # Errors
    /// Returns `SearchError::Config` on malformed TOML or invalid values.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| SearchError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read a config from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| SearchError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.max_depth == 0 {
            return Err(SearchError::Config("max_depth must be at least 1".into()));
        }
        if self.max_children == 0 {
            return Err(SearchError::Config("max_children must be at least 1".into()));
        }
        if !self.exploration_constant.is_finite() || self.exploration_constant < 0.0 {
            return Err(SearchError::Config(format!(
                "exploration_constant must be finite and non-negative, got {}",
                self.exploration_constant
            )));
        }
        if !self.failure_reward.is_finite() {
            return Err(SearchError::Config("failure_reward must be finite".into()));
        }
        if !is_valid_run_id(&self.run_id) {
            return Err(SearchError::Config(format!(
                "run_id {:?} must be non-empty, use only letters, digits, '-', '_' or '.', \
                 and not start with '.'",
                self.run_id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SearchConfig::default();
        assert_eq!(config.mode, SearchMode::Full);
        assert_eq!(config.max_depth, 5);
        assert_eq!(config.max_children, 3);
        assert!((config.exploration_constant - 1.4).abs() < 1e-9);
        assert_eq!(config.failure_reward, 0.0);
        assert_eq!(config.generation_retries, 2);
        assert!(!config.use_fixed_insights);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_with_mode() {
        let config = SearchConfig::with_mode(SearchMode::Greedy);
        assert_eq!(config.mode, SearchMode::Greedy);
        // Other values should be default
        assert_eq!(config.max_depth, 5);
    }

    #[test]
    fn test_from_toml_partial() {
        let config = SearchConfig::from_toml_str(
            r#"
            mode = "random"
            max_depth = 2
            use_fixed_insights = true
            fixed_insights = ["scale numeric features"]
            "#,
        )
        .unwrap();

        assert_eq!(config.mode, SearchMode::Random);
        assert_eq!(config.max_depth, 2);
        assert_eq!(config.fixed_insights.len(), 1);
        assert_eq!(config.max_children, 3);
    }

    #[test]
    fn test_from_toml_rejects_bad_values() {
        assert!(SearchConfig::from_toml_str("max_depth = 0").is_err());
        assert!(SearchConfig::from_toml_str("mode = \"beam\"").is_err());
        assert!(SearchConfig::from_toml_str("run_id = \"\"").is_err());
    }

    #[test]
    fn test_rejects_run_id_outside_store() {
        for run_id in ["../escape", "a/b", ".."] {
            let config = SearchConfig {
                run_id: run_id.to_string(),
                ..Default::default()
            };
            assert!(
                matches!(config.validate(), Err(SearchError::Config(_))),
                "{run_id} accepted"
            );
        }
        assert!(SearchConfig::from_toml_str("run_id = \"iris-2024\"").is_ok());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("search.toml");
        std::fs::write(&path, "max_children = 5\nseed = 7\n").unwrap();

        let config = SearchConfig::from_file(&path).unwrap();
        assert_eq!(config.max_children, 5);
        assert_eq!(config.seed, 7);

        assert!(SearchConfig::from_file(dir.path().join("missing.toml")).is_err());
    }
}

//! Engine configuration.
//!
//! Configuration is loaded from TOML. Every section is optional:
//!
//! ```toml
//! [workers]
//! threads = 4
//! thread_name = "trellis-worker"
//!
//! [strategies]
//! disabled = ["FilterFusionStrategy"]
//!
//! [traversers]
//! force_path = false
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{TraversalError, TraversalResult};

/// Default name prefix for worker threads.
pub const DEFAULT_THREAD_NAME: &str = "trellis-worker";

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Worker pool used by promises.
    pub workers: WorkerConfig,
    /// Strategy selection.
    pub strategies: StrategyConfig,
    /// Traverser shaping.
    pub traversers: TraverserConfig,
}

/// Worker pool settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Number of threads; 0 lets rayon decide.
    pub threads: usize,
    /// Prefix for worker thread names.
    pub thread_name: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self { threads: 0, thread_name: DEFAULT_THREAD_NAME.to_owned() }
    }
}

/// Strategy settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    /// Names of standard strategies to leave out.
    pub disabled: Vec<String>,
}

/// Traverser settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraverserConfig {
    /// Always track full paths, whatever the steps require.
    pub force_path: bool,
}

impl EngineConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of worker threads.
    #[must_use]
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.workers.threads = threads;
        self
    }

    /// Sets the worker thread name prefix.
    #[must_use]
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.workers.thread_name = name.into();
        self
    }

    /// Disables a standard strategy by name.
    #[must_use]
    pub fn with_disabled_strategy(mut self, name: impl Into<String>) -> Self {
        self.strategies.disabled.push(name.into());
        self
    }

    /// Forces full path tracking.
    #[must_use]
    pub const fn with_force_path(mut self, force_path: bool) -> Self {
        self.traversers.force_path = force_path;
        self
    }

    /// Parses a configuration from TOML.
    ///
    /// # Errors
    ///
    /// Returns [`TraversalError::Config`] if the TOML is malformed or the
    /// result fails validation.
    pub fn from_toml_str(source: &str) -> TraversalResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| TraversalError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`TraversalError::Config`] if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> TraversalResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| TraversalError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&source)
    }

    /// Serializes the configuration to TOML.
    ///
    /// # Errors
    ///
    /// Returns [`TraversalError::Config`] if serialization fails.
    pub fn to_toml_string(&self) -> TraversalResult<String> {
        toml::to_string(self).map_err(|e| TraversalError::Config(e.to_string()))
    }

    /// Checks the configuration for invalid values.
    ///
    /// # Errors
    ///
    /// Returns [`TraversalError::Config`] describing the first problem found.
    pub fn validate(&self) -> TraversalResult<()> {
        if self.workers.thread_name.trim().is_empty() {
            return Err(TraversalError::Config("workers.thread_name must not be empty".into()));
        }
        if let Some(name) = self.strategies.disabled.iter().find(|n| n.trim().is_empty()) {
            return Err(TraversalError::Config(format!(
                "strategies.disabled contains an empty name: {name:?}"
            )));
        }
        Ok(())
    }

    /// Builds a dedicated worker pool for promises.
    ///
    /// # Errors
    ///
    /// Returns [`TraversalError::Config`] if the pool cannot be created.
    pub fn build_worker_pool(&self) -> TraversalResult<rayon::ThreadPool> {
        self.validate()?;
        let prefix = self.workers.thread_name.clone();
        rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers.threads)
            .thread_name(move |index| format!("{prefix}-{index}"))
            .build()
            .map_err(|e| TraversalError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.workers.thread_name, DEFAULT_THREAD_NAME);
    }

    #[test]
    fn partial_sections() {
        let config = EngineConfig::from_toml_str(
            "[workers]\nthreads = 2\n\n[strategies]\ndisabled = [\"FilterFusionStrategy\"]\n",
        )
        .unwrap();
        assert_eq!(config.workers.threads, 2);
        assert_eq!(config.workers.thread_name, DEFAULT_THREAD_NAME);
        assert_eq!(config.strategies.disabled, vec!["FilterFusionStrategy".to_owned()]);
        assert!(!config.traversers.force_path);
    }

    #[test]
    fn toml_round_trip() {
        let config = EngineConfig::new()
            .with_threads(3)
            .with_thread_name("pool")
            .with_disabled_strategy("IdentityRemovalStrategy")
            .with_force_path(true);
        let text = config.to_toml_string().unwrap();
        assert_eq!(EngineConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(matches!(
            EngineConfig::from_toml_str("[workers]\nthread_name = \" \"\n"),
            Err(TraversalError::Config(_))
        ));
        assert!(EngineConfig::from_toml_str("[workers]\nthreads = \"many\"\n").is_err());
        assert!(EngineConfig::new().with_disabled_strategy("").validate().is_err());
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.toml");
        std::fs::write(&path, "[traversers]\nforce_path = true\n").unwrap();
        assert!(EngineConfig::load(&path).unwrap().traversers.force_path);
        assert!(EngineConfig::load(dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn builds_pool() {
        let pool = EngineConfig::new().with_threads(2).build_worker_pool().unwrap();
        assert_eq!(pool.current_num_threads(), 2);
    }
}

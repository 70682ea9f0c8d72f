//! Configuration management with layered hierarchy

use serde::Deserialize;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::core::builder::DEFAULT_ROW_BUDGET;
use crate::core::identity::{DEFAULT_MAX_DEPTH, MAX_DEPTH_CEILING, MAX_SEARCH_LIMIT};
use crate::core::view::ViewFilter;

/// Project-local config file, looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = ".olt.yaml";

/// Default page size for root searches
pub const DEFAULT_SEARCH_LIMIT: usize = 100;

/// olt configuration with layered hierarchy
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the SQLite snapshot
    pub database: Option<PathBuf>,

    /// Recursion limit for tree traversal
    pub max_depth: Option<u32>,

    /// Cap on nodes materialized by a full build
    pub row_budget: Option<usize>,

    /// Default number of search results
    pub search_limit: Option<usize>,

    /// Part id prefixes of plain requirements shown in the simplified
    /// work-order view
    pub view_part_prefixes: Option<Vec<String>>,
}

impl Config {
    /// Load configuration from all sources, merging in priority order
    pub fn load() -> Self {
        let global = Self::global_config_path();
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        Self::load_from(global.as_deref(), Some(&local))
    }

    /// Load from explicit file locations, then apply the environment
    pub fn load_from(global: Option<&Path>, local: Option<&Path>) -> Self {
        let mut config = Config::default();

        // 1. Built-in defaults (already in Default impl)

        // 2. Global user config (~/.config/olt/config.yaml)
        if let Some(global) = global.and_then(Self::read_file) {
            config.merge(global);
        }

        // 3. Working directory config (.olt.yaml)
        if let Some(local) = local.and_then(Self::read_file) {
            config.merge(local);
        }

        // 4. Environment variables
        if let Ok(database) = std::env::var("OLT_DATABASE") {
            if !database.trim().is_empty() {
                config.database = Some(PathBuf::from(database));
            }
        }
        if let Ok(depth) = std::env::var("OLT_MAX_DEPTH") {
            match depth.trim().parse::<u32>() {
                Ok(depth) => config.max_depth = Some(depth),
                Err(_) => warn!(value = %depth, "ignoring invalid OLT_MAX_DEPTH"),
            }
        }

        config
    }

    fn read_file(path: &Path) -> Option<Config> {
        if !path.exists() {
            return None;
        }
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read config file");
                return None;
            }
        };
        match serde_yml::from_str::<Config>(&contents) {
            Ok(config) => Some(config),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring malformed config file");
                None
            }
        }
    }

    /// Get the path to the global config file
    fn global_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "olt")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Merge another config into this one (other takes precedence)
    fn merge(&mut self, other: Config) {
        if other.database.is_some() {
            self.database = other.database;
        }
        if other.max_depth.is_some() {
            self.max_depth = other.max_depth;
        }
        if other.row_budget.is_some() {
            self.row_budget = other.row_budget;
        }
        if other.search_limit.is_some() {
            self.search_limit = other.search_limit;
        }
        if other.view_part_prefixes.is_some() {
            self.view_part_prefixes = other.view_part_prefixes;
        }
    }

    /// Recursion limit, clamped to the accepted range
    pub fn max_depth(&self) -> u32 {
        self.max_depth
            .unwrap_or(DEFAULT_MAX_DEPTH)
            .clamp(1, MAX_DEPTH_CEILING)
    }

    pub fn row_budget(&self) -> usize {
        self.row_budget.unwrap_or(DEFAULT_ROW_BUDGET).max(1)
    }

    /// Search page size, clamped to the accepted range
    pub fn search_limit(&self) -> usize {
        self.search_limit
            .unwrap_or(DEFAULT_SEARCH_LIMIT)
            .clamp(1, MAX_SEARCH_LIMIT)
    }

    pub fn view_filter(&self) -> ViewFilter {
        match &self.view_part_prefixes {
            Some(prefixes) => ViewFilter::with_prefixes(prefixes),
            None => ViewFilter::sub_work_orders_only(),
        }
    }
}

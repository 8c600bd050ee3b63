//! Runtime configuration for yums-core.
//!
//! Everything tunable is carried explicitly through constructors instead of
//! living in ambient globals, so two screens (or two tests) can run with
//! different settings side by side.

use crate::layout::GridConfig;

/// Top-level configuration handed to repositories and engines.
#[derive(Debug, Clone, PartialEq)]
pub struct CoreConfig {
    /// Page size for the order list "load more" pagination.
    pub page_size: usize,
    /// Menu grid layout settings.
    pub grid: GridConfig,
    /// Currency code assumed for bare numeric amounts in source data.
    pub currency: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            page_size: 20,
            grid: GridConfig::default(),
            currency: "GHC".to_string(),
        }
    }
}

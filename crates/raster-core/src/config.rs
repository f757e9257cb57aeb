//! Immutable core configuration.
//!
//! Mode switches are read once into a [`CoreConfig`] and threaded through
//! the worker; there are no runtime setters. The process-wide default is
//! loaded from the environment on first use and never changes afterwards.

use std::sync::OnceLock;

/// Pipeline-wide configuration, fixed at startup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoreConfig {
    /// Use the extended op descriptors that accept ROI and no-data.
    pub extended_ops: bool,
    /// Enable the warp-affine fold optimization.
    pub warp_reduction: bool,
    /// Default warp approximation tolerance when no hint is given.
    pub resample_tolerance: f64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            extended_ops: true,
            warp_reduction: true,
            resample_tolerance: 0.333,
        }
    }
}

impl CoreConfig {
    /// Reads the configuration from the environment.
    ///
    /// `RASTERKIT_EXTENDED_OPS` and `RASTERKIT_WARP_REDUCTION` accept
    /// `0`/`false` to disable the corresponding feature.
    pub fn from_env() -> Self {
        let flag = |name: &str, default: bool| -> bool {
            match std::env::var(name) {
                Ok(v) => !matches!(v.as_str(), "0" | "false" | "FALSE"),
                Err(_) => default,
            }
        };
        let defaults = Self::default();
        Self {
            extended_ops: flag("RASTERKIT_EXTENDED_OPS", defaults.extended_ops),
            warp_reduction: flag("RASTERKIT_WARP_REDUCTION", defaults.warp_reduction),
            resample_tolerance: defaults.resample_tolerance,
        }
    }

    /// The process-wide configuration, loaded once.
    pub fn global() -> &'static CoreConfig {
        static INSTANCE: OnceLock<CoreConfig> = OnceLock::new();
        INSTANCE.get_or_init(CoreConfig::from_env)
    }

    /// A copy with warp reduction toggled, for tests and embedders that
    /// construct their own workers.
    pub fn with_warp_reduction(mut self, enabled: bool) -> Self {
        self.warp_reduction = enabled;
        self
    }
}

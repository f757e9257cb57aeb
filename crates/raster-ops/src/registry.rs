//! Operation registry.
//!
//! Maps operation names to [`OperationDescriptor`] entries. Two descriptor
//! tables exist: the *extended* one (operations accept ROI and no-data
//! parameters) and the *stock* one (they do not); which is active is decided
//! once by [`CoreConfig::extended_ops`]. The pipeline behaves identically in
//! either mode: the flag only selects which descriptor set validates the
//! emitted graph.
//!
//! # Example
//!
//! ```rust
//! use raster_ops::registry::OperationRegistry;
//!
//! let registry = OperationRegistry::global();
//! assert!(registry.get("Mosaic").is_some());
//! assert!(registry.get("Sharpen3x3").is_none());
//! ```

use std::collections::HashMap;
use std::sync::OnceLock;

use raster_core::{CoreConfig, Error, Result};

/// Descriptor for a registered operation.
#[derive(Debug, Clone, Copy)]
pub struct OperationDescriptor {
    /// Registered name.
    pub name: &'static str,
    /// Minimum number of sources.
    pub min_sources: usize,
    /// Maximum number of sources (`usize::MAX` for unbounded).
    pub max_sources: usize,
    /// Whether the op accepts a ROI parameter.
    pub supports_roi: bool,
    /// Whether the op accepts no-data parameters.
    pub supports_nodata: bool,
}

const fn desc(name: &'static str, min: usize, max: usize, extended: bool) -> OperationDescriptor {
    OperationDescriptor {
        name,
        min_sources: min,
        max_sources: max,
        supports_roi: extended,
        supports_nodata: extended,
    }
}

/// The built-in operation names.
const OPERATIONS: &[(&str, usize, usize)] = &[
    ("Null", 1, 1),
    ("Stats", 1, 1),
    ("Format", 1, 1),
    ("Constant", 0, 0),
    ("Rescale", 1, 1),
    ("Binarize", 1, 1),
    ("Lookup", 1, 1),
    ("RangeLookup", 1, 1),
    ("Piecewise", 1, 1),
    ("Classify", 1, 1),
    ("Algebra", 1, 2),
    ("AlgebraConst", 1, 1),
    ("BandSelect", 1, 1),
    ("BandMerge", 1, usize::MAX),
    ("BandCombine", 1, 1),
    ("Scale", 1, 1),
    ("Affine", 1, 1),
    ("Translate", 1, 1),
    ("Crop", 1, 1),
    ("Border", 1, 1),
    ("Warp", 1, 1),
    ("Mosaic", 1, usize::MAX),
    ("ErrorDiffusion", 1, 1),
    ("OrderedDither", 1, 1),
    ("ColorConvert", 1, 1),
];

/// Registry of operation descriptors, keyed by name.
pub struct OperationRegistry {
    descriptors: HashMap<&'static str, OperationDescriptor>,
}

impl OperationRegistry {
    /// Builds a registry for the given configuration.
    pub fn with_config(config: &CoreConfig) -> Self {
        let mut descriptors = HashMap::with_capacity(OPERATIONS.len());
        for &(name, min, max) in OPERATIONS {
            descriptors.insert(name, desc(name, min, max, config.extended_ops));
        }
        Self { descriptors }
    }

    /// The process-wide registry, initialized once from the global
    /// configuration.
    pub fn global() -> &'static OperationRegistry {
        static INSTANCE: OnceLock<OperationRegistry> = OnceLock::new();
        INSTANCE.get_or_init(|| OperationRegistry::with_config(CoreConfig::global()))
    }

    /// Looks up a descriptor.
    pub fn get(&self, name: &str) -> Option<&OperationDescriptor> {
        self.descriptors.get(name)
    }

    /// Looks up a descriptor, failing with [`Error::NoSuchOperation`].
    pub fn descriptor(&self, name: &str) -> Result<&OperationDescriptor> {
        self.get(name)
            .ok_or_else(|| Error::NoSuchOperation(name.to_string()))
    }

    /// Iterates over the registered names.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.descriptors.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_lookup() {
        let registry = OperationRegistry::global();
        let mosaic = registry.descriptor("Mosaic").unwrap();
        assert_eq!(mosaic.min_sources, 1);
        assert_eq!(mosaic.max_sources, usize::MAX);
        assert!(registry.descriptor("NoSuchOp").is_err());
    }

    #[test]
    fn test_stock_mode_drops_roi_support() {
        let config = CoreConfig {
            extended_ops: false,
            ..CoreConfig::default()
        };
        let registry = OperationRegistry::with_config(&config);
        let affine = registry.get("Affine").unwrap();
        assert!(!affine.supports_roi);
        assert!(!affine.supports_nodata);
        // same operation set in either mode
        assert_eq!(
            registry.names().count(),
            OperationRegistry::with_config(&CoreConfig::default()).names().count()
        );
    }
}

//! Rendering hints: typed keys conveying layout, tiling and caching policy.
//!
//! Hints travel with the worker and are consulted when a new operation node
//! is emitted. The tile cache is an injected trait object; a hint that is
//! *present but `None`* means "no caching", which is different from an
//! absent hint ("use the default cache").

use std::collections::HashMap;
use std::sync::Arc;

use crate::buffer::PixelBuffer;
use crate::layout::ImageLayout;

/// Process-wide tile cache collaborator.
///
/// Implementations are free to evict at will; the pipeline treats the cache
/// as purely advisory.
pub trait TileCache: Send + Sync {
    /// Stores a rendered tile under an opaque key.
    fn put(&self, key: u64, tile: PixelBuffer);
    /// Retrieves a tile, if still cached.
    fn get(&self, key: u64) -> Option<PixelBuffer>;
    /// Drops all cached tiles.
    fn flush(&self);
}

/// Keys recognized by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HintKey {
    /// User-supplied [`ImageLayout`]; beats the computed one.
    ImageLayout,
    /// Tile cache override; present-but-none disables caching.
    TileCache,
    /// Whether produced nodes may be tiled (default true).
    TilingAllowed,
    /// When false, palette-rewriting ops operate on samples instead.
    TransformOnColormap,
    /// When false, ops preserve an existing indexed model.
    ReplaceIndexColorModel,
    /// Warp-affine fold tolerance.
    ResampleTolerance,
}

/// A hint value.
#[derive(Clone)]
pub enum HintValue {
    /// An image layout.
    Layout(ImageLayout),
    /// A tile cache handle, or `None` for "caching disabled".
    Cache(Option<Arc<dyn TileCache>>),
    /// A boolean flag.
    Bool(bool),
    /// A floating point value.
    Float(f64),
}

impl std::fmt::Debug for HintValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Layout(l) => f.debug_tuple("Layout").field(l).finish(),
            Self::Cache(Some(_)) => f.write_str("Cache(<handle>)"),
            Self::Cache(None) => f.write_str("Cache(None)"),
            Self::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Self::Float(v) => f.debug_tuple("Float").field(v).finish(),
        }
    }
}

/// A typed hint map.
#[derive(Debug, Clone, Default)]
pub struct RenderHints {
    map: HashMap<HintKey, HintValue>,
}

impl RenderHints {
    /// An empty hint map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a hint, replacing any previous value.
    pub fn set(&mut self, key: HintKey, value: HintValue) {
        self.map.insert(key, value);
    }

    /// Removes a hint; returns `true` if it was present.
    pub fn remove(&mut self, key: HintKey) -> bool {
        self.map.remove(&key).is_some()
    }

    /// Looks up a hint.
    pub fn get(&self, key: HintKey) -> Option<&HintValue> {
        self.map.get(&key)
    }

    /// Returns `true` when a hint is present (even with a `None` payload).
    pub fn contains(&self, key: HintKey) -> bool {
        self.map.contains_key(&key)
    }

    /// Returns `true` when the map holds no hints.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// The user layout, if set.
    pub fn layout(&self) -> Option<&ImageLayout> {
        match self.map.get(&HintKey::ImageLayout) {
            Some(HintValue::Layout(l)) => Some(l),
            _ => None,
        }
    }

    /// A boolean hint with a default for the absent case.
    pub fn bool_hint(&self, key: HintKey, default: bool) -> bool {
        match self.map.get(&key) {
            Some(HintValue::Bool(b)) => *b,
            _ => default,
        }
    }

    /// A float hint with a default for the absent case.
    pub fn float_hint(&self, key: HintKey, default: f64) -> f64 {
        match self.map.get(&key) {
            Some(HintValue::Float(v)) => *v,
            _ => default,
        }
    }

    /// Whether tile caching is enabled for emitted nodes.
    ///
    /// Absent hint means the default cache (enabled); a present hint with a
    /// `None` handle means disabled.
    pub fn tile_cache_enabled(&self) -> bool {
        match self.map.get(&HintKey::TileCache) {
            Some(HintValue::Cache(None)) => false,
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_cache_differs_from_unset() {
        let mut hints = RenderHints::new();
        assert!(hints.tile_cache_enabled());
        assert!(!hints.contains(HintKey::TileCache));

        hints.set(HintKey::TileCache, HintValue::Cache(None));
        assert!(!hints.tile_cache_enabled());
        assert!(hints.contains(HintKey::TileCache));

        hints.remove(HintKey::TileCache);
        assert!(hints.tile_cache_enabled());
    }

    #[test]
    fn test_bool_and_float_defaults() {
        let mut hints = RenderHints::new();
        assert!(hints.bool_hint(HintKey::TilingAllowed, true));
        assert_eq!(hints.float_hint(HintKey::ResampleTolerance, 0.333), 0.333);

        hints.set(HintKey::TilingAllowed, HintValue::Bool(false));
        hints.set(HintKey::ResampleTolerance, HintValue::Float(0.1));
        assert!(!hints.bool_hint(HintKey::TilingAllowed, true));
        assert_eq!(hints.float_hint(HintKey::ResampleTolerance, 0.333), 0.1);
    }
}

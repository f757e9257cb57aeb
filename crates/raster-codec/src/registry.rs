//! Codec registry.
//!
//! Maps format names and file suffixes to [`ImageCodec`] instances. The
//! global registry holds the feature-enabled built-in writers; embedders
//! can build their own registry and add codecs at startup.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use crate::ImageCodec;

/// Registry of encoder plugins.
#[derive(Default)]
pub struct CodecRegistry {
    by_name: HashMap<&'static str, Arc<dyn ImageCodec>>,
    by_suffix: HashMap<&'static str, &'static str>,
}

impl CodecRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The global registry with the built-in writers.
    pub fn global() -> &'static CodecRegistry {
        static INSTANCE: OnceLock<CodecRegistry> = OnceLock::new();
        INSTANCE.get_or_init(|| {
            let mut registry = CodecRegistry::new();
            registry.register_builtin_codecs();
            registry
        })
    }

    fn register_builtin_codecs(&mut self) {
        #[cfg(feature = "png")]
        self.register(Arc::new(crate::png::PngCodec));
        #[cfg(feature = "jpeg")]
        self.register(Arc::new(crate::jpeg::JpegCodec));
        #[cfg(feature = "gif")]
        self.register(Arc::new(crate::gif::GifCodec));
        #[cfg(feature = "tiff")]
        self.register(Arc::new(crate::tiff::TiffCodec));
    }

    /// Registers a codec.
    pub fn register(&mut self, codec: Arc<dyn ImageCodec>) {
        let name = codec.name();
        for suffix in codec.suffixes() {
            self.by_suffix.insert(suffix, name);
        }
        self.by_name.insert(name, codec);
    }

    /// Codec by format name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn ImageCodec>> {
        self.by_name.get(name)
    }

    /// Codec by file suffix (case-insensitive).
    pub fn for_suffix(&self, suffix: &str) -> Option<&Arc<dyn ImageCodec>> {
        let lower = suffix.to_lowercase();
        self.by_suffix
            .get(lower.as_str())
            .and_then(|name| self.by_name.get(name))
    }

    /// Registered format names.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.by_name.keys().copied()
    }
}

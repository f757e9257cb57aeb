//! Encoder write parameters.

/// Compression mode requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Codec defaults.
    #[default]
    Default,
    /// The explicit compression/quality settings apply.
    Explicit,
}

/// Parameters handed to [`crate::ImageCodec::write`].
#[derive(Debug, Clone, PartialEq)]
pub struct ImageWriteParam {
    /// Compression scheme name, codec-specific.
    pub compression: Option<String>,
    /// Quality in `[0, 1]`; lossy codecs map it to their native scale.
    pub quality: f32,
    /// Whether the explicit settings apply.
    pub mode: WriteMode,
    /// Requested tile size; honored when both dimensions are positive and
    /// the format supports tiling.
    pub tiling: Option<(u32, u32)>,
    /// Progressive / interlaced encoding.
    pub progressive: bool,
}

impl Default for ImageWriteParam {
    fn default() -> Self {
        Self {
            compression: None,
            quality: 0.75,
            mode: WriteMode::Default,
            tiling: None,
            progressive: false,
        }
    }
}

impl ImageWriteParam {
    /// Parameters with an explicit quality setting.
    pub fn with_quality(quality: f32) -> Self {
        Self {
            quality,
            mode: WriteMode::Explicit,
            ..Self::default()
        }
    }

    /// Requested tiling when both dimensions are positive.
    pub fn effective_tiling(&self) -> Option<(u32, u32)> {
        match self.tiling {
            Some((w, h)) if w > 0 && h > 0 => Some((w, h)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_tiling() {
        let mut params = ImageWriteParam::default();
        assert_eq!(params.effective_tiling(), None);
        params.tiling = Some((256, 0));
        assert_eq!(params.effective_tiling(), None);
        params.tiling = Some((256, 256));
        assert_eq!(params.effective_tiling(), Some((256, 256)));
    }
}

/// Character set used for rendering
///
/// `Low` maps each character cell to a flat background color; `High` runs
/// the sub-pixel glyph search over the Unicode block elements.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Charset {
    #[default]
    Low,
    High,
}

/// Configuration for an image to terminal-art conversion
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Output size in character cells
    pub out_w: usize,            // >= 1
    pub out_h: usize,            // >= 1

    /// Rendering mode
    pub charset: Charset,        // default Low

    /// Parallelism tuning
    pub tile_h: usize,           // resample tile height in rows, default 64

    /// Glyph search tuning
    pub prune_threshold: u32,    // sum of per-channel mean diffs, default 24
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            out_w: 80,
            out_h: 0,
            charset: Charset::Low,
            tile_h: 64,
            prune_threshold: 24,
        }
    }
}

impl RenderConfig {
    /// Validates the configuration parameters
    pub fn validate(&self) -> Result<(), String> {
        if self.out_w < 1 {
            return Err(format!("out_w must be at least 1, got {}", self.out_w));
        }
        if self.out_h < 1 {
            return Err(format!("out_h must be at least 1, got {}", self.out_h));
        }
        if self.tile_h < 1 {
            return Err(format!("tile_h must be at least 1, got {}", self.tile_h));
        }
        if self.prune_threshold > 3 * 255 {
            return Err(format!(
                "prune_threshold must be <= 765, got {}",
                self.prune_threshold
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_needs_height() {
        // The default height is 0 so callers derive it from the image aspect
        let config = RenderConfig::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_with_height_is_valid() {
        let config = RenderConfig { out_h: 24, ..Default::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_width() {
        let config = RenderConfig { out_w: 0, out_h: 24, ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_prune_threshold() {
        let mut config = RenderConfig { out_h: 24, ..Default::default() };
        config.prune_threshold = 766;
        assert!(config.validate().is_err());

        config.prune_threshold = 765;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_charset_default_is_low() {
        assert_eq!(Charset::default(), Charset::Low);
    }
}

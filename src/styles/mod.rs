//! Stylistic presets for image generation
//!
//! A preset is a short suffix appended to the user's prompt. The catalog
//! mirrors what the studio front end offers in its style picker.

use serde::Serialize;

/// A stylistic preset
#[derive(Debug, Clone, Serialize)]
pub struct StylePreset {
    /// Unique identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Text appended to the user's prompt
    pub prompt_suffix: String,
}

impl StylePreset {
    fn new(id: &str, name: &str, prompt_suffix: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            prompt_suffix: prompt_suffix.to_string(),
        }
    }
}

/// Catalog of available presets, in display order
pub struct StyleRegistry {
    styles: Vec<StylePreset>,
}

impl StyleRegistry {
    /// Create a new registry with built-in presets
    pub fn new() -> Self {
        let styles = vec![
            StylePreset::new(
                "photorealistic",
                "Photorealistic",
                "photorealistic, natural lighting, shallow depth of field, shot on a full-frame camera",
            ),
            StylePreset::new(
                "anime",
                "Anime",
                "anime illustration, cel shading, clean line art, vibrant colors",
            ),
            StylePreset::new(
                "oil-painting",
                "Oil Painting",
                "classical oil painting, visible brushwork, rich impasto texture, gallery lighting",
            ),
            StylePreset::new(
                "watercolor",
                "Watercolor",
                "soft watercolor painting, bleeding washes, paper grain, muted palette",
            ),
            StylePreset::new(
                "pixel-art",
                "Pixel Art",
                "16-bit pixel art, limited palette, crisp dithering, game sprite aesthetic",
            ),
            StylePreset::new(
                "render-3d",
                "3D Render",
                "polished 3D render, physically based materials, soft studio lighting, octane quality",
            ),
            StylePreset::new(
                "sketch",
                "Pencil Sketch",
                "graphite pencil sketch, loose hatching, rough paper texture, monochrome",
            ),
            StylePreset::new(
                "cyberpunk",
                "Cyberpunk",
                "cyberpunk scene, neon glow, rain-slick streets, high contrast night palette",
            ),
        ];

        Self { styles }
    }

    /// Get a preset by ID; unknown ids mean no styling
    pub fn get(&self, id: &str) -> Option<&StylePreset> {
        self.styles.iter().find(|style| style.id == id)
    }

    /// List all available presets
    pub fn list(&self) -> &[StylePreset] {
        &self.styles
    }
}

impl Default for StyleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

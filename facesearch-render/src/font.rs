use ab_glyph::{FontArc, FontVec};
use anyhow::{Context, Result, bail};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Places a sans-serif font is commonly installed.
const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu-sans-fonts/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation-sans/LiberationSans-Regular.ttf",
    "/usr/share/fonts/noto/NotoSans-Regular.ttf",
    "/usr/share/fonts/truetype/noto/NotoSans-Regular.ttf",
    "/Library/Fonts/Arial.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
    "C:\\Windows\\Fonts\\segoeui.ttf",
];

pub fn load_font_file(path: &Path) -> Result<FontArc> {
    let data = fs::read(path).with_context(|| format!("reading font {}", path.display()))?;
    let font = FontVec::try_from_vec(data)
        .with_context(|| format!("parsing font {}", path.display()))?;
    Ok(FontArc::new(font))
}

/// Loads the configured font, or the first system font that parses.
pub fn load_font(configured: Option<&Path>) -> Result<FontArc> {
    if let Some(path) = configured {
        let font = load_font_file(path)?;
        info!("Loaded font {}", path.display());
        return Ok(font);
    }
    for candidate in SYSTEM_FONTS.iter().map(PathBuf::from) {
        if !candidate.is_file() {
            continue;
        }
        if let Ok(font) = load_font_file(&candidate) {
            info!("Loaded font {}", candidate.display());
            return Ok(font);
        }
    }
    bail!(
        "no usable font found; set display.font_path in the config (searched {})",
        SYSTEM_FONTS.join(", ")
    )
}

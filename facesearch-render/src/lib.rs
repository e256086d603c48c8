pub mod font;
pub mod render;
pub mod text;

pub use ab_glyph::FontArc;
pub use font::{load_font, load_font_file};
pub use render::{FrameStats, SkiaRenderer};
pub use text::{TextCache, render_text_block, wrap_lines};

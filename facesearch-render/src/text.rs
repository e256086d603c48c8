//! Text rasterisation with a per-session cache.
//!
//! Every distinct (string, size, wrap width, colour) is rasterised once into
//! a premultiplied pixmap and reused on later frames.

use ab_glyph::{Font, FontArc, Glyph, PxScale, ScaleFont, point};
use anyhow::{Context, Result};
use facesearch_core::Rgba;
use std::collections::HashMap;
use std::sync::Arc;
use string_cache::DefaultAtom as Atom;
use tiny_skia::{Pixmap, PremultipliedColorU8};

/// Lines of `text` after wrapping at `wrap_px`. Explicit newlines always
/// break; empty lines are kept.
pub fn wrap_lines<F: Font>(font: &F, scale: PxScale, text: &str, wrap_px: f32) -> Vec<String> {
    let sf = font.as_scaled(scale);
    let width_of = |s: &str| -> f32 {
        let mut w = 0.0;
        let mut prev = None;
        for ch in s.chars() {
            let id = sf.glyph_id(ch);
            if let Some(p) = prev {
                w += sf.kern(p, id);
            }
            w += sf.h_advance(id);
            prev = Some(id);
        }
        w
    };

    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut line = String::new();
        for word in paragraph.split(' ') {
            if line.is_empty() {
                line.push_str(word);
                continue;
            }
            let candidate_width = width_of(&line) + width_of(" ") + width_of(word);
            if candidate_width > wrap_px {
                lines.push(std::mem::take(&mut line));
                line.push_str(word);
            } else {
                line.push(' ');
                line.push_str(word);
            }
        }
        lines.push(line);
    }
    lines
}

/// Rasterises a centred, wrapped text block.
pub fn render_text_block(
    font: &FontArc,
    text: &str,
    size_px: f32,
    wrap_px: f32,
    color: Rgba,
) -> Result<Pixmap> {
    let scale = PxScale::from(size_px.max(1.0));
    let sf = font.as_scaled(scale);
    let line_height = sf.height() + sf.line_gap();
    let lines = wrap_lines(font, scale, text, wrap_px);

    // Lay out every line with its baseline, then centre it horizontally.
    let mut glyphs: Vec<Glyph> = Vec::with_capacity(text.len());
    let mut line_spans = Vec::with_capacity(lines.len());
    let mut block_width = 0.0f32;
    for (i, line) in lines.iter().enumerate() {
        let baseline = sf.ascent() + i as f32 * line_height;
        let start = glyphs.len();
        let mut pen_x = 0.0f32;
        for ch in line.chars() {
            let id = sf.glyph_id(ch);
            if let Some(prev) = glyphs[start..].last() {
                pen_x += sf.kern(prev.id, id);
            }
            glyphs.push(Glyph {
                id,
                scale,
                position: point(pen_x, baseline),
            });
            pen_x += sf.h_advance(id);
        }
        block_width = block_width.max(pen_x);
        line_spans.push((start, glyphs.len(), pen_x));
    }
    for &(start, end, line_width) in &line_spans {
        let shift = (block_width - line_width) / 2.0;
        for g in &mut glyphs[start..end] {
            g.position.x += shift;
        }
    }

    let w = block_width.ceil().max(1.0) as u32;
    let h = (line_height * lines.len() as f32).ceil().max(1.0) as u32;
    let mut pm = Pixmap::new(w, h).context("allocating text pixmap")?;
    let stride = w as usize;
    let dst = pm.pixels_mut();

    for g in glyphs {
        let Some(outlined) = font.outline_glyph(g) else {
            continue;
        };
        let bounds = outlined.px_bounds();
        outlined.draw(|x, y, coverage| {
            if coverage <= f32::EPSILON {
                return;
            }
            let ix = x as i32 + bounds.min.x as i32;
            let iy = y as i32 + bounds.min.y as i32;
            if ix < 0 || iy < 0 || ix >= w as i32 || iy >= h as i32 {
                return;
            }
            let i = iy as usize * stride + ix as usize;

            // source over destination, premultiplied
            let a = (coverage * color[3] as f32 / 255.0).clamp(0.0, 1.0);
            let inv = 1.0 - a;
            let bg = dst[i];
            let blend = |src: u8, dst: u8| -> u8 {
                (src as f32 * a + dst as f32 * inv).round().min(255.0) as u8
            };
            let r = blend(color[0], bg.red());
            let gr = blend(color[1], bg.green());
            let b = blend(color[2], bg.blue());
            let alpha = (a * 255.0 + bg.alpha() as f32 * inv).round().min(255.0) as u8;
            if let Some(px) = PremultipliedColorU8::from_rgba(r.min(alpha), gr.min(alpha), b.min(alpha), alpha) {
                dst[i] = px;
            }
        });
    }
    Ok(pm)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TextKey {
    text: Atom,
    size_px: u32,
    wrap_px: u32,
    color: Rgba,
}

pub struct TextCache {
    font: FontArc,
    map: HashMap<TextKey, Arc<Pixmap>>,
}

impl TextCache {
    pub fn new(font: FontArc) -> Self {
        Self {
            font,
            map: HashMap::new(),
        }
    }

    pub fn get_or_render(
        &mut self,
        text: &str,
        size_px: f32,
        wrap_px: f32,
        color: Rgba,
    ) -> Result<Arc<Pixmap>> {
        let key = TextKey {
            text: Atom::from(text),
            size_px: size_px.round() as u32,
            wrap_px: wrap_px.round() as u32,
            color,
        };
        if let Some(pm) = self.map.get(&key) {
            return Ok(Arc::clone(pm));
        }
        let pm = Arc::new(render_text_block(
            &self.font,
            text,
            key.size_px as f32,
            key.wrap_px as f32,
            color,
        )?);
        self.map.insert(key, Arc::clone(&pm));
        Ok(pm)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Drops every cached pixmap, e.g. after the pixel density changed.
    pub fn clear(&mut self) {
        self.map.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::load_font;

    fn font() -> Option<FontArc> {
        match load_font(None) {
            Ok(font) => Some(font),
            Err(err) => {
                eprintln!("skipping text test: {err}");
                None
            }
        }
    }

    #[test]
    fn explicit_newlines_always_break() {
        let Some(font) = font() else { return };
        let lines = wrap_lines(&font, PxScale::from(20.0), "one\n\ntwo three", 10_000.0);
        assert_eq!(lines, vec!["one", "", "two three"]);
    }

    #[test]
    fn long_lines_wrap_between_words() {
        let Some(font) = font() else { return };
        let text = "find the different smiley as fast as possible";
        let lines = wrap_lines(&font, PxScale::from(20.0), text, 120.0);
        assert!(lines.len() > 1);
        assert_eq!(lines.join(" "), text);
    }

    #[test]
    fn cache_reuses_pixmaps() {
        let Some(font) = font() else { return };
        let mut cache = TextCache::new(font);
        let white = [255, 255, 255, 255];
        let a = cache.get_or_render("'B'", 24.0, 800.0, white).unwrap();
        let b = cache.get_or_render("'B'", 24.2, 800.0, white).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        cache.get_or_render("'B'", 24.0, 800.0, [229, 25, 25, 255]).unwrap();
        assert_eq!(cache.len(), 2);
        assert!(a.pixels().iter().any(|p| p.alpha() > 0));

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn multi_line_block_is_taller() {
        let Some(font) = font() else { return };
        let white = [255, 255, 255, 255];
        let one = render_text_block(&font, "Block: 1 of 8.", 20.0, 1000.0, white).unwrap();
        let three = render_text_block(&font, "Block: 1 of 8.\n\nPress", 20.0, 1000.0, white).unwrap();
        assert!(three.height() >= one.height() * 3 - 2);
    }
}

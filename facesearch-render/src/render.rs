use crate::text::TextCache;
use ab_glyph::FontArc;
use anyhow::{Result, bail};
use bytemuck::{cast_slice, cast_slice_mut};
use facesearch_core::{Brush, DrawCommand, Point, Rgba, Scene, SurfaceGeometry};
use facesearch_timing::Timer;
use std::time::Duration;
use tiny_skia::{
    Color, FillRule, LineCap, Paint, Path, PathBuilder, Pixmap, Rect, Stroke, Transform,
};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, Default)]
pub struct FrameStats {
    pub clear: Duration,
    pub draw: Duration,
    pub copy: Duration,
    pub total: Duration,
    pub commands: usize,
}

/// Rasterises scenes given in centimetres into an RGBA frame buffer.
pub struct SkiaRenderer {
    width: u32,
    height: u32,
    center: (f32, f32),
    pix_per_cm: f32,
    canvas: Pixmap,
    text: Option<TextCache>,
    missing_font_reported: bool,
}

fn color(c: Rgba) -> Color {
    Color::from_rgba8(c[0], c[1], c[2], c[3])
}

fn paint(c: Rgba) -> Paint<'static> {
    let mut p = Paint::default();
    p.set_color(color(c));
    p.anti_alias = true;
    p
}

impl SkiaRenderer {
    /// Without a font, text commands are skipped.
    pub fn new(width: u32, height: u32, pix_per_cm: f32, font: Option<FontArc>) -> Result<Self> {
        let Some(canvas) = Pixmap::new(width, height) else {
            bail!("cannot allocate a {width}x{height} canvas");
        };
        Ok(Self {
            width,
            height,
            center: (width as f32 / 2.0, height as f32 / 2.0),
            pix_per_cm,
            canvas,
            text: font.map(TextCache::new),
            missing_font_reported: false,
        })
    }

    pub fn for_surface(
        width: u32,
        height: u32,
        surface: SurfaceGeometry,
        font: Option<FontArc>,
    ) -> Result<Self> {
        Self::new(width, height, surface.pix_per_cm, font)
    }

    pub fn resize(&mut self, width: u32, height: u32, pix_per_cm: f32) -> Result<()> {
        let Some(canvas) = Pixmap::new(width, height) else {
            bail!("cannot allocate a {width}x{height} canvas");
        };
        self.canvas = canvas;
        self.width = width;
        self.height = height;
        self.center = (width as f32 / 2.0, height as f32 / 2.0);
        if (pix_per_cm - self.pix_per_cm).abs() > f32::EPSILON {
            self.pix_per_cm = pix_per_cm;
            if let Some(text) = &mut self.text {
                text.clear();
            }
        }
        Ok(())
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Centimetre coordinates (origin at the centre, y up) to canvas pixels.
    pub fn to_px(&self, p: Point) -> (f32, f32) {
        (
            self.center.0 + p.x * self.pix_per_cm,
            self.center.1 - p.y * self.pix_per_cm,
        )
    }

    fn cm(&self, len: f32) -> f32 {
        len * self.pix_per_cm
    }

    pub fn canvas(&self) -> &Pixmap {
        &self.canvas
    }

    /// Draws `scene` and copies the result into `frame`, which must be
    /// `width * height * 4` bytes of RGBA.
    pub fn render_scene<T: Timer<Timestamp = u64>>(
        &mut self,
        scene: &Scene,
        frame: &mut [u8],
        timer: &mut T,
    ) -> Result<FrameStats> {
        if frame.len() != self.canvas.data().len() {
            bail!(
                "frame buffer holds {} bytes, canvas needs {}",
                frame.len(),
                self.canvas.data().len()
            );
        }

        let t_clear = {
            let t = timer.now();
            self.canvas.fill(color(scene.background));
            timer.elapsed(t)
        };

        let t_draw = {
            let t = timer.now();
            for command in &scene.commands {
                self.draw(command)?;
            }
            timer.elapsed(t)
        };

        let t_copy = {
            let t = timer.now();
            frame.copy_from_slice(self.canvas.data());
            timer.elapsed(t)
        };

        let total = t_clear + t_draw + t_copy;
        Ok(FrameStats {
            clear: t_clear,
            draw: t_draw,
            copy: t_copy,
            total,
            commands: scene.len(),
        })
    }

    fn draw(&mut self, command: &DrawCommand) -> Result<()> {
        match command {
            DrawCommand::Circle {
                center,
                radius,
                brush,
            } => {
                let (cx, cy) = self.to_px(*center);
                if let Some(path) = PathBuilder::from_circle(cx, cy, self.cm(*radius)) {
                    match brush {
                        Brush::Fill(c) => self.fill(&path, *c),
                        Brush::Stroke { color, width } => self.stroke(&path, *color, *width),
                    }
                }
            }
            DrawCommand::Polyline {
                points,
                origin,
                color,
                width,
            } => {
                let mut pb = PathBuilder::new();
                for (i, p) in points.iter().enumerate() {
                    let (x, y) = self.to_px(origin.offset(p.x, p.y));
                    if i == 0 {
                        pb.move_to(x, y);
                    } else {
                        pb.line_to(x, y);
                    }
                }
                if let Some(path) = pb.finish() {
                    self.stroke(&path, *color, *width);
                }
            }
            DrawCommand::Line {
                from,
                to,
                color,
                width,
            } => {
                let (x0, y0) = self.to_px(*from);
                let (x1, y1) = self.to_px(*to);
                let mut pb = PathBuilder::new();
                pb.move_to(x0, y0);
                pb.line_to(x1, y1);
                if let Some(path) = pb.finish() {
                    self.stroke(&path, *color, *width);
                }
            }
            DrawCommand::Rect {
                center,
                width,
                height,
                color,
            } => {
                let (cx, cy) = self.to_px(*center);
                let (w, h) = (self.cm(*width), self.cm(*height));
                if let Some(rect) = Rect::from_xywh(cx - w / 2.0, cy - h / 2.0, w, h) {
                    self.canvas
                        .fill_rect(rect, &paint(*color), Transform::identity(), None);
                }
            }
            DrawCommand::Text {
                content,
                anchor,
                height,
                color,
                wrap_width,
            } => self.draw_text(content, *anchor, *height, *color, *wrap_width)?,
        }
        Ok(())
    }

    fn fill(&mut self, path: &Path, c: Rgba) {
        self.canvas.fill_path(
            path,
            &paint(c),
            FillRule::Winding,
            Transform::identity(),
            None,
        );
    }

    fn stroke(&mut self, path: &Path, c: Rgba, width_cm: f32) {
        let stroke = Stroke {
            width: self.cm(width_cm).max(1.0),
            line_cap: LineCap::Round,
            ..Stroke::default()
        };
        self.canvas
            .stroke_path(path, &paint(c), &stroke, Transform::identity(), None);
    }

    fn draw_text(
        &mut self,
        content: &str,
        anchor: Point,
        height_cm: f32,
        c: Rgba,
        wrap_cm: f32,
    ) -> Result<()> {
        let size_px = self.cm(height_cm);
        let wrap_px = self.cm(wrap_cm);
        let (ax, ay) = self.to_px(anchor);
        let Some(cache) = &mut self.text else {
            if !self.missing_font_reported {
                warn!("No font loaded; text is not drawn");
                self.missing_font_reported = true;
            }
            return Ok(());
        };
        let pm = cache.get_or_render(content, size_px, wrap_px, c)?;
        let x = (ax - pm.width() as f32 * 0.5).round() as i32;
        let y = (ay - pm.height() as f32 * 0.5).round() as i32;
        blit_premultiplied(&mut self.canvas, &pm, x, y);
        Ok(())
    }

    pub fn cached_texts(&self) -> usize {
        self.text.as_ref().map_or(0, TextCache::len)
    }
}

/// Source-over blit of a premultiplied pixmap with its top-left corner at
/// (`x`, `y`), clipped to the canvas.
fn blit_premultiplied(canvas: &mut Pixmap, src: &Pixmap, x: i32, y: i32) {
    let (cw, ch) = (canvas.width() as i32, canvas.height() as i32);
    let (w, h) = (src.width() as i32, src.height() as i32);
    if x + w <= 0 || y + h <= 0 || x >= cw || y >= ch {
        debug!("Text block at ({x}, {y}) is off screen");
        return;
    }

    let dst_x = x.max(0) as usize;
    let dst_y = y.max(0) as usize;
    let src_x = (-x).max(0) as usize;
    let src_y = (-y).max(0) as usize;
    let copy_w = (w as usize - src_x).min(cw as usize - dst_x);
    let copy_h = (h as usize - src_y).min(ch as usize - dst_y);
    let (src_stride, dst_stride) = (w as usize, cw as usize);

    let src_px: &[u32] = cast_slice(src.data());
    let dst_px: &mut [u32] = cast_slice_mut(canvas.data_mut());

    for row in 0..copy_h {
        let s0 = (src_y + row) * src_stride + src_x;
        let d0 = (dst_y + row) * dst_stride + dst_x;
        for i in 0..copy_w {
            let s = src_px[s0 + i];
            let sa = s >> 24;
            if sa == 0 {
                continue;
            }
            if sa == 255 {
                dst_px[d0 + i] = s;
                continue;
            }
            let d = dst_px[d0 + i];
            let inv = 255 - sa;
            let channel = |shift: u32| -> u32 {
                let sc = (s >> shift) & 0xFF;
                let dc = (d >> shift) & 0xFF;
                (sc + (dc * inv + 127) / 255).min(255)
            };
            dst_px[d0 + i] =
                (channel(24) << 24) | (channel(16) << 16) | (channel(8) << 8) | channel(0);
        }
    }
}

//! Display list shared by screen composition and the rasteriser.
//!
//! Coordinates and sizes are centimetres, origin at the display centre,
//! y up. Line widths are centimetres as well.

use crate::geometry::{ARC_SEGMENTS, Point};

pub type Rgba = [u8; 4];

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Brush {
    Fill(Rgba),
    Stroke { color: Rgba, width: f32 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Circle {
        center: Point,
        radius: f32,
        brush: Brush,
    },
    /// Open polyline; `points` are relative to `origin`.
    Polyline {
        points: [Point; ARC_SEGMENTS],
        origin: Point,
        color: Rgba,
        width: f32,
    },
    Line {
        from: Point,
        to: Point,
        color: Rgba,
        width: f32,
    },
    /// Filled axis-aligned rectangle.
    Rect {
        center: Point,
        width: f32,
        height: f32,
        color: Rgba,
    },
    /// Text block centred on `anchor`, wrapped at `wrap_width`.
    Text {
        content: String,
        anchor: Point,
        height: f32,
        color: Rgba,
        wrap_width: f32,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub background: Rgba,
    pub commands: Vec<DrawCommand>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new([0, 0, 0, 255])
    }
}

impl Scene {
    pub fn new(background: Rgba) -> Self {
        Self {
            background,
            commands: Vec::with_capacity(256),
        }
    }

    /// Empties the display list, keeping its allocation.
    pub fn clear(&mut self, background: Rgba) {
        self.background = background;
        self.commands.clear();
    }

    pub fn push(&mut self, command: DrawCommand) {
        self.commands.push(command);
    }

    pub fn text(
        &mut self,
        content: impl Into<String>,
        anchor: Point,
        height: f32,
        color: Rgba,
        wrap_width: f32,
    ) {
        self.commands.push(DrawCommand::Text {
            content: content.into(),
            anchor,
            height,
            color,
            wrap_width,
        });
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// All text contents in draw order.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().filter_map(|c| match c {
            DrawCommand::Text { content, .. } => Some(content.as_str()),
            _ => None,
        })
    }

    pub fn contains_text(&self, needle: &str) -> bool {
        self.texts().any(|t| t.contains(needle))
    }
}

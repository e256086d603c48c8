//! Reusable schematic faces.
//!
//! The pool is filled once per session with as many faces as the largest
//! set size. Trials only move faces and switch their mouths; nothing is
//! allocated while a display is being prepared or drawn.

use facesearch_core::{
    ARC_SEGMENTS, Brush, DrawCommand, Expression, Point, Rgba, Scene, arc_vertices,
};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StimulusError {
    #[error("stimulus pool must hold at least one face")]
    EmptyPool,
    #[error("display needs {requested} faces but the pool holds {capacity}")]
    PoolExhausted { requested: usize, capacity: usize },
}

/// Face proportions, all derived from the face diameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceStyle {
    pub size: f32,
    pub color: Rgba,
}

impl FaceStyle {
    pub fn new(size: f32, color: Rgba) -> Self {
        Self { size, color }
    }

    pub fn head_radius(&self) -> f32 {
        self.size / 2.0
    }
    pub fn eye_radius(&self) -> f32 {
        self.size * 0.0577
    }
    pub fn line_width(&self) -> f32 {
        self.size * 0.0577
    }
    pub fn mouth_radius(&self) -> f32 {
        self.size * 0.2885
    }
    pub fn eye_offset(&self) -> (f32, f32) {
        (self.size * 0.1538, self.size * 0.1923)
    }
    /// Half length of the neutral mouth segment.
    pub fn mouth_length(&self) -> f32 {
        self.size * 0.2885
    }
    pub fn neutral_mouth_offset(&self) -> f32 {
        self.size * 0.1154
    }
    pub fn negative_mouth_offset(&self) -> f32 {
        self.size * 0.3077
    }
    pub fn positive_mouth_offset(&self) -> f32 {
        self.size * 0.0192
    }
}

/// One face: head outline, two filled eyes and three interchangeable mouths.
#[derive(Debug, Clone)]
pub struct FaceAssembly {
    style: FaceStyle,
    position: Point,
    expression: Expression,
    smile: [Point; ARC_SEGMENTS],
    frown: [Point; ARC_SEGMENTS],
}

impl FaceAssembly {
    pub fn new(style: FaceStyle) -> Self {
        let mouth_radius = style.mouth_radius();
        Self {
            style,
            position: Point::ORIGIN,
            expression: Expression::Neutral,
            smile: arc_vertices(mouth_radius, 195.0, 345.0),
            frown: arc_vertices(mouth_radius, 15.0, 165.0),
        }
    }

    pub fn set_expression_and_position(&mut self, expression: Expression, position: Point) {
        self.expression = expression;
        self.position = position;
    }

    pub fn expression(&self) -> Expression {
        self.expression
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn draw(&self, scene: &mut Scene) {
        let style = &self.style;
        let pos = self.position;
        let color = style.color;
        let width = style.line_width();

        scene.push(DrawCommand::Circle {
            center: pos,
            radius: style.head_radius(),
            brush: Brush::Stroke { color, width },
        });

        let (eye_dx, eye_dy) = style.eye_offset();
        for dx in [-eye_dx, eye_dx] {
            scene.push(DrawCommand::Circle {
                center: pos.offset(dx, eye_dy),
                radius: style.eye_radius(),
                brush: Brush::Fill(color),
            });
        }

        let mouth = match self.expression {
            Expression::Positive => DrawCommand::Polyline {
                points: self.smile,
                origin: pos.offset(0.0, style.positive_mouth_offset()),
                color,
                width,
            },
            Expression::Negative => DrawCommand::Polyline {
                points: self.frown,
                origin: pos.offset(0.0, -style.negative_mouth_offset()),
                color,
                width,
            },
            Expression::Neutral => {
                let y = -style.neutral_mouth_offset();
                DrawCommand::Line {
                    from: pos.offset(-style.mouth_length(), y),
                    to: pos.offset(style.mouth_length(), y),
                    color,
                    width,
                }
            }
        };
        scene.push(mouth);
    }
}

/// Fixed arena of faces. Face 0 is always the target of the current display.
#[derive(Debug, Clone)]
pub struct StimulusPool {
    faces: Vec<FaceAssembly>,
    active: usize,
}

impl StimulusPool {
    pub fn preload(capacity: usize, style: FaceStyle) -> Result<Self, StimulusError> {
        if capacity == 0 {
            return Err(StimulusError::EmptyPool);
        }
        let faces = (0..capacity).map(|_| FaceAssembly::new(style)).collect();
        info!("Preloaded {} stimuli", capacity);
        Ok(Self { faces, active: 0 })
    }

    pub fn capacity(&self) -> usize {
        self.faces.len()
    }

    /// Faces that take part in the current display.
    pub fn active(&self) -> &[FaceAssembly] {
        &self.faces[..self.active]
    }

    /// Places the target and the neutral distractors for one display.
    pub fn arrange(
        &mut self,
        target: Expression,
        target_position: Point,
        distractors: impl ExactSizeIterator<Item = Point>,
    ) -> Result<(), StimulusError> {
        let requested = 1 + distractors.len();
        if requested > self.faces.len() {
            return Err(StimulusError::PoolExhausted {
                requested,
                capacity: self.faces.len(),
            });
        }
        self.faces[0].set_expression_and_position(target, target_position);
        for (face, position) in self.faces[1..].iter_mut().zip(distractors) {
            face.set_expression_and_position(Expression::Neutral, position);
        }
        self.active = requested;
        Ok(())
    }

    pub fn draw(&self, scene: &mut Scene) {
        for face in self.active() {
            face.draw(scene);
        }
    }
}

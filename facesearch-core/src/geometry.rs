//! Display geometry in physical units.
//!
//! Everything here works in centimetres with the origin at the centre of
//! the display and the y axis pointing up. The renderer converts to pixels
//! at the very end, so grid layout and face construction stay independent
//! of the monitor resolution.

use crate::trial::Cell;
use thiserror::Error;
use tracing::{info, warn};

/// Number of vertices sampled along every mouth arc.
pub const ARC_SEGMENTS: usize = 25;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: f32, dy: f32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    pub fn distance(self, other: Point) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum GeometryError {
    #[error("grid needs at least one row and one column (got {rows}x{cols})")]
    EmptyGrid { rows: usize, cols: usize },
    #[error("grid spacing must be positive (got {0})")]
    InvalidSpacing(f32),
    #[error("display size must be positive (got {width_px}x{height_px} px, {monitor_width_cm} cm)")]
    InvalidSurface {
        width_px: u32,
        height_px: u32,
        monitor_width_cm: f32,
    },
}

/// Physical extent of the render surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceGeometry {
    pub width_cm: f32,
    pub height_cm: f32,
    pub pix_per_cm: f32,
}

impl SurfaceGeometry {
    /// Derives the physical surface size from the pixel size of the window and
    /// the physical width of the monitor it covers.
    pub fn from_pixels(
        width_px: u32,
        height_px: u32,
        monitor_width_cm: f32,
    ) -> Result<Self, GeometryError> {
        if width_px == 0 || height_px == 0 || !(monitor_width_cm > 0.0) {
            return Err(GeometryError::InvalidSurface {
                width_px,
                height_px,
                monitor_width_cm,
            });
        }
        let pix_per_cm = width_px as f32 / monitor_width_cm;
        Ok(Self {
            width_cm: monitor_width_cm,
            height_cm: height_px as f32 / pix_per_cm,
            pix_per_cm,
        })
    }

    pub fn half_height(&self) -> f32 {
        self.height_cm / 2.0
    }
}

/// Samples `ARC_SEGMENTS` points on a circle of `radius` between two angles
/// given in degrees, both endpoints included.
pub fn arc_vertices(radius: f32, start_angle_deg: f32, end_angle_deg: f32) -> [Point; ARC_SEGMENTS] {
    let start = (start_angle_deg as f64).to_radians();
    let end = (end_angle_deg as f64).to_radians();
    let step = (end - start) / (ARC_SEGMENTS - 1) as f64;
    let radius = radius as f64;

    std::array::from_fn(|i| {
        // pin the last sample so it is exactly the end angle
        let angle = if i == ARC_SEGMENTS - 1 {
            end
        } else {
            start + step * i as f64
        };
        Point {
            x: (radius * angle.cos()) as f32,
            y: (radius * angle.sin()) as f32,
        }
    })
}

/// Lays out `rows * cols` positions on a lattice centred on the surface,
/// `spacing` apart on both axes, in row-major order. Row 0 is the lowest
/// row on screen.
pub fn calculate_positions(
    surface: SurfaceGeometry,
    rows: usize,
    cols: usize,
    spacing: f32,
) -> Result<Vec<Point>, GeometryError> {
    if rows == 0 || cols == 0 {
        return Err(GeometryError::EmptyGrid { rows, cols });
    }
    if !(spacing > 0.0) {
        return Err(GeometryError::InvalidSpacing(spacing));
    }

    let grid_width = (cols - 1) as f32 * spacing;
    let grid_height = (rows - 1) as f32 * spacing;

    if grid_width > surface.width_cm || grid_height > surface.height_cm {
        warn!(
            "Grid of {}x{} cm does not fit on a {:.1}x{:.1} cm display",
            grid_width, grid_height, surface.width_cm, surface.height_cm
        );
    }

    let offset_x = (surface.width_cm - grid_width) / 2.0;
    let offset_y = (surface.height_cm - grid_height) / 2.0;

    let mut positions = Vec::with_capacity(rows * cols);
    for row in 0..rows {
        for col in 0..cols {
            positions.push(Point {
                x: offset_x + col as f32 * spacing - surface.width_cm / 2.0,
                y: offset_y + row as f32 * spacing - surface.height_cm / 2.0,
            });
        }
    }

    info!("{} positions calculated", positions.len());
    Ok(positions)
}

/// The enumerated position grid of a session. Built once, never mutated.
#[derive(Debug, Clone)]
pub struct GridLayout {
    rows: usize,
    cols: usize,
    spacing: f32,
    positions: Vec<Point>,
}

impl GridLayout {
    pub fn new(
        surface: SurfaceGeometry,
        rows: usize,
        cols: usize,
        spacing: f32,
    ) -> Result<Self, GeometryError> {
        let positions = calculate_positions(surface, rows, cols, spacing)?;
        Ok(Self {
            rows,
            cols,
            spacing,
            positions,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn spacing(&self) -> f32 {
        self.spacing
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn positions(&self) -> &[Point] {
        &self.positions
    }

    pub fn position(&self, index: usize) -> Option<Point> {
        self.positions.get(index).copied()
    }

    /// 1-based (row, col) of a linear grid index.
    pub fn cell_of(&self, index: usize) -> Cell {
        Cell {
            row: 1 + index / self.cols,
            col: 1 + index % self.cols,
        }
    }

    pub fn index_of(&self, cell: Cell) -> Option<usize> {
        if (1..=self.rows).contains(&cell.row) && (1..=self.cols).contains(&cell.col) {
            Some((cell.row - 1) * self.cols + (cell.col - 1))
        } else {
            None
        }
    }

    /// Anchor points for the column numbers, one spacing below the first row.
    pub fn column_label_positions(&self) -> impl Iterator<Item = (usize, Point)> + '_ {
        let y = self.positions[0].y - self.spacing;
        self.positions[..self.cols]
            .iter()
            .enumerate()
            .map(move |(i, p)| (i + 1, Point::new(p.x, y)))
    }

    /// Anchor points for the row numbers, one spacing left of the first column.
    pub fn row_label_positions(&self) -> impl Iterator<Item = (usize, Point)> + '_ {
        let x = self.positions[0].x - self.spacing;
        self.positions
            .iter()
            .step_by(self.cols)
            .enumerate()
            .map(move |(i, p)| (i + 1, Point::new(x, p.y)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-4;

    fn surface() -> SurfaceGeometry {
        SurfaceGeometry::from_pixels(1920, 1080, 53.5).unwrap()
    }

    #[test]
    fn arc_has_fixed_length_and_exact_endpoints() {
        let cases: [(f32, f32, f32); 3] = [(0.375, 195.0, 345.0), (1.0, 15.0, 165.0), (2.5, -90.0, 270.0)];
        for (r, a, b) in cases {
            let arc = arc_vertices(r, a, b);
            assert_eq!(arc.len(), ARC_SEGMENTS);

            let (ar, br) = (a.to_radians(), b.to_radians());
            assert!((arc[0].x - r * ar.cos()).abs() < EPS);
            assert!((arc[0].y - r * ar.sin()).abs() < EPS);
            assert!((arc[24].x - r * br.cos()).abs() < EPS);
            assert!((arc[24].y - r * br.sin()).abs() < EPS);

            for p in &arc {
                assert!((p.distance(Point::ORIGIN) - r).abs() < EPS);
            }
        }
    }

    #[test]
    fn degenerate_arcs_are_not_special_cased() {
        let zero_radius = arc_vertices(0.0, 10.0, 80.0);
        assert!(zero_radius.iter().all(|p| *p == Point::ORIGIN));

        let zero_sweep = arc_vertices(1.0, 45.0, 45.0);
        assert!(zero_sweep.iter().all(|p| p.distance(zero_sweep[0]) < EPS));
    }

    #[test]
    fn positions_are_distinct_centered_and_evenly_spaced() {
        for rows in 1..=9 {
            for cols in 1..=9 {
                let spacing = 2.12;
                let pos = calculate_positions(surface(), rows, cols, spacing).unwrap();
                assert_eq!(pos.len(), rows * cols);

                for (i, a) in pos.iter().enumerate() {
                    for b in &pos[i + 1..] {
                        assert!(a.distance(*b) > spacing - EPS);
                    }
                }

                let (sx, sy) = pos
                    .iter()
                    .fold((0.0f32, 0.0f32), |(x, y), p| (x + p.x, y + p.y));
                assert!(sx.abs() < 1e-3 && sy.abs() < 1e-3, "not centred: {sx} {sy}");

                // point reflection through the origin maps the grid onto itself
                for p in &pos {
                    assert!(pos.iter().any(|q| q.distance(Point::new(-p.x, -p.y)) < EPS));
                }

                for row in 0..rows {
                    for col in 0..cols {
                        let here = pos[row * cols + col];
                        if col + 1 < cols {
                            let right = pos[row * cols + col + 1];
                            assert!((right.x - here.x - spacing).abs() < EPS);
                            assert!((right.y - here.y).abs() < EPS);
                        }
                        if row + 1 < rows {
                            let above = pos[(row + 1) * cols + col];
                            assert!((above.y - here.y - spacing).abs() < EPS);
                            assert!((above.x - here.x).abs() < EPS);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn empty_grid_is_an_error() {
        assert_eq!(
            calculate_positions(surface(), 0, 4, 2.0),
            Err(GeometryError::EmptyGrid { rows: 0, cols: 4 })
        );
        assert_eq!(
            calculate_positions(surface(), 3, 3, 0.0),
            Err(GeometryError::InvalidSpacing(0.0))
        );
    }

    #[test]
    fn linear_index_maps_to_one_based_cell() {
        let grid = GridLayout::new(surface(), 6, 6, 2.12).unwrap();
        assert_eq!(grid.cell_of(13), Cell { row: 3, col: 2 });
        assert_eq!(grid.cell_of(0), Cell { row: 1, col: 1 });
        assert_eq!(grid.cell_of(35), Cell { row: 6, col: 6 });

        for index in 0..grid.len() {
            assert_eq!(grid.index_of(grid.cell_of(index)), Some(index));
        }
        assert_eq!(grid.index_of(Cell { row: 7, col: 1 }), None);
        assert_eq!(grid.index_of(Cell { row: 0, col: 1 }), None);
    }

    #[test]
    fn labels_sit_one_spacing_outside_the_grid() {
        let grid = GridLayout::new(surface(), 3, 4, 2.0).unwrap();
        let first = grid.positions()[0];

        let cols: Vec<_> = grid.column_label_positions().collect();
        assert_eq!(cols.len(), 4);
        assert_eq!(cols[0].0, 1);
        assert!(cols.iter().all(|(_, p)| (p.y - (first.y - 2.0)).abs() < EPS));

        let rows: Vec<_> = grid.row_label_positions().collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2].0, 3);
        assert!(rows.iter().all(|(_, p)| (p.x - (first.x - 2.0)).abs() < EPS));
        assert!((rows[2].1.y - grid.positions()[8].y).abs() < EPS);
    }

    #[test]
    fn surface_is_derived_from_pixels() {
        let s = surface();
        assert!((s.pix_per_cm - 1920.0 / 53.5).abs() < EPS);
        assert!((s.height_cm - 1080.0 / s.pix_per_cm).abs() < EPS);
        assert!(SurfaceGeometry::from_pixels(0, 1080, 53.5).is_err());
        assert!(SurfaceGeometry::from_pixels(1920, 1080, 0.0).is_err());
    }
}

//! Highlight strokes drawn over a captured photo.
//!
//! Pointer drags arrive as samples; each drag becomes one stroke. Strokes are
//! rendered as vector paths and the same paths, plus their bounding box, tell
//! the definition service which word was marked.

use serde::{Deserialize, Serialize};

pub const DEFAULT_STROKE_WIDTH: f32 = 30.0;
pub const MIN_SAMPLE_DISTANCE: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    fn distance(&self, other: &Point) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Stroke {
    pub points: Vec<Point>,
}

impl Stroke {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// `M x y L x y ...`
    pub fn to_svg_path(&self) -> String {
        self.points
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let op = if i == 0 { 'M' } else { 'L' };
                format!("{op} {} {}", fmt_coord(p.x), fmt_coord(p.y))
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn fmt_coord(v: f32) -> String {
    let rounded = (v * 100.0).round() / 100.0;
    if rounded.fract() == 0.0 {
        format!("{}", rounded as i64)
    } else {
        format!("{rounded}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl BoundingBox {
    pub fn width(&self) -> f32 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f32 {
        self.max_y - self.min_y
    }
}

/// The marked area of one capture: every stroke plus the canvas it was
/// drawn on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightRegion {
    pub strokes: Vec<Stroke>,
    pub canvas_width: f32,
    pub canvas_height: f32,
    pub stroke_width: f32,
}

impl HighlightRegion {
    pub fn is_empty(&self) -> bool {
        self.strokes.iter().all(Stroke::is_empty)
    }

    pub fn svg_paths(&self) -> Vec<String> {
        self.strokes
            .iter()
            .filter(|s| !s.is_empty())
            .map(Stroke::to_svg_path)
            .collect()
    }

    /// Box around all strokes, widened by half the pen width and clamped to
    /// the canvas. `None` when nothing was drawn.
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        let mut points = self.strokes.iter().flat_map(|s| s.points.iter());
        let first = points.next()?;
        let mut bbox = BoundingBox {
            min_x: first.x,
            min_y: first.y,
            max_x: first.x,
            max_y: first.y,
        };
        for p in points {
            bbox.min_x = bbox.min_x.min(p.x);
            bbox.min_y = bbox.min_y.min(p.y);
            bbox.max_x = bbox.max_x.max(p.x);
            bbox.max_y = bbox.max_y.max(p.y);
        }

        let pad = self.stroke_width / 2.0;
        Some(BoundingBox {
            min_x: (bbox.min_x - pad).max(0.0),
            min_y: (bbox.min_y - pad).max(0.0),
            max_x: (bbox.max_x + pad).min(self.canvas_width),
            max_y: (bbox.max_y + pad).min(self.canvas_height),
        })
    }
}

/// Collects pointer-drag samples into strokes.
#[derive(Debug, Clone)]
pub struct HighlightCanvas {
    width: f32,
    height: f32,
    stroke_width: f32,
    min_distance: f32,
    strokes: Vec<Stroke>,
    drawing: bool,
}

impl HighlightCanvas {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            stroke_width: DEFAULT_STROKE_WIDTH,
            min_distance: MIN_SAMPLE_DISTANCE,
            strokes: Vec::new(),
            drawing: false,
        }
    }

    pub fn with_stroke_width(mut self, stroke_width: f32) -> Self {
        self.stroke_width = stroke_width.max(0.0);
        self
    }

    /// Drag start: opens a new stroke at `point`.
    pub fn begin(&mut self, point: Point) {
        self.strokes.push(Stroke {
            points: vec![self.clamp(point)],
        });
        self.drawing = true;
    }

    /// Drag update. Samples closer than the minimum distance to the last
    /// vertex are dropped; samples outside a drag are ignored.
    pub fn extend(&mut self, point: Point) -> bool {
        if !self.drawing {
            return false;
        }
        let point = self.clamp(point);
        let min_distance = self.min_distance;
        let Some(stroke) = self.strokes.last_mut() else {
            return false;
        };
        if let Some(last) = stroke.points.last() {
            if last.distance(&point) < min_distance {
                return false;
            }
        }
        stroke.points.push(point);
        true
    }

    /// Drag end.
    pub fn end(&mut self) {
        self.drawing = false;
    }

    pub fn clear(&mut self) {
        self.strokes.clear();
        self.drawing = false;
    }

    pub fn strokes(&self) -> &[Stroke] {
        &self.strokes
    }

    pub fn region(&self) -> HighlightRegion {
        HighlightRegion {
            strokes: self.strokes.clone(),
            canvas_width: self.width,
            canvas_height: self.height,
            stroke_width: self.stroke_width,
        }
    }

    fn clamp(&self, point: Point) -> Point {
        Point {
            x: point.x.clamp(0.0, self.width),
            y: point.y.clamp(0.0, self.height),
        }
    }
}

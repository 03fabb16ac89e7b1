//! Tracking regions and overlap computation

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Special region code: tracker output unknown (e.g. skipped frame).
pub const UNKNOWN: u32 = 0;
/// Special region code: tracker was (re)initialized on this frame.
pub const INITIALIZATION: u32 = 1;
/// Special region code: tracker failed on this frame.
pub const FAILURE: u32 = 2;

/// Axis-aligned rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rectangle {
    /// Left edge
    pub x: f32,
    /// Top edge
    pub y: f32,
    /// Width
    pub width: f32,
    /// Height
    pub height: f32,
}

impl Rectangle {
    /// Create a rectangle.
    #[must_use]
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Area, zero for degenerate rectangles.
    #[must_use]
    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Edges as `(left, top, right, bottom)` in f64.
    fn edges(&self) -> Edges {
        let (x, y) = (f64::from(self.x), f64::from(self.y));
        (
            x,
            y,
            x + f64::from(self.width.max(0.0)),
            y + f64::from(self.height.max(0.0)),
        )
    }
}

/// A region reported by a tracker or stored as groundtruth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Region {
    /// Special status code (see [`UNKNOWN`], [`INITIALIZATION`], [`FAILURE`])
    Special(u32),
    /// Axis-aligned bounding box
    Rectangle(Rectangle),
    /// Polygon given as a list of points
    Polygon(Vec<(f32, f32)>),
}

impl Region {
    /// Shorthand for a rectangle region.
    #[must_use]
    pub const fn rectangle(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self::Rectangle(Rectangle::new(x, y, width, height))
    }

    /// Whether this is a special code rather than a geometric region.
    #[must_use]
    pub const fn is_special(&self) -> bool {
        matches!(self, Self::Special(_))
    }

    /// Whether this is the given special code.
    #[must_use]
    pub const fn is_code(&self, code: u32) -> bool {
        matches!(self, Self::Special(c) if *c == code)
    }

    /// Bounding rectangle, `None` for special codes and empty polygons.
    #[must_use]
    pub fn bounds(&self) -> Option<Rectangle> {
        match self {
            Self::Special(_) => None,
            Self::Rectangle(rect) => Some(*rect),
            Self::Polygon(points) => {
                let (first, rest) = points.split_first()?;
                let (mut x0, mut y0, mut x1, mut y1) = (first.0, first.1, first.0, first.1);
                for &(x, y) in rest {
                    x0 = x0.min(x);
                    y0 = y0.min(y);
                    x1 = x1.max(x);
                    y1 = y1.max(y);
                }
                Some(Rectangle::new(x0, y0, x1 - x0, y1 - y0))
            }
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Special(code) => write!(f, "{code}"),
            Self::Rectangle(r) => write!(f, "{},{},{},{}", r.x, r.y, r.width, r.height),
            Self::Polygon(points) => {
                let coords: Vec<String> = points
                    .iter()
                    .flat_map(|(x, y)| [x.to_string(), y.to_string()])
                    .collect();
                f.write_str(&coords.join(","))
            }
        }
    }
}

impl FromStr for Region {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let values = s
            .split(',')
            .map(|v| {
                v.trim()
                    .parse::<f32>()
                    .map_err(|e| Error::ParseError(format!("invalid region '{s}': {e}")))
            })
            .collect::<Result<Vec<f32>>>()?;

        match values.as_slice() {
            [_] => s
                .parse::<u32>()
                .map(Self::Special)
                .map_err(|e| Error::ParseError(format!("invalid special region '{s}': {e}"))),
            [x, y, w, h] => Ok(Self::rectangle(*x, *y, *w, *h)),
            coords if coords.len() >= 6 && coords.len() % 2 == 0 => Ok(Self::Polygon(
                coords.chunks_exact(2).map(|c| (c[0], c[1])).collect(),
            )),
            _ => Err(Error::ParseError(format!(
                "region '{s}' has {} values",
                values.len()
            ))),
        }
    }
}

/// Rectangle edges `(left, top, right, bottom)`.
type Edges = (f64, f64, f64, f64);

fn intersect(a: Edges, b: Edges) -> Edges {
    let left = a.0.max(b.0);
    let top = a.1.max(b.1);
    (left, top, a.2.min(b.2).max(left), a.3.min(b.3).max(top))
}

fn area(edges: Edges) -> f64 {
    (edges.2 - edges.0) * (edges.3 - edges.1)
}

/// Intersection-over-union of the bounding rectangles of two regions.
///
/// Both regions are clipped to `bounds` (image width, height) when given.
/// Special codes and empty regions have zero overlap with anything.
/// Computed in f64 so that a region always has overlap 1 with itself.
#[must_use]
pub fn calculate_overlap(a: &Region, b: &Region, bounds: Option<(u32, u32)>) -> f32 {
    let (Some(ra), Some(rb)) = (a.bounds(), b.bounds()) else {
        return 0.0;
    };
    let (mut ea, mut eb) = (ra.edges(), rb.edges());

    if let Some((width, height)) = bounds {
        let image = (0.0, 0.0, f64::from(width), f64::from(height));
        ea = intersect(ea, image);
        eb = intersect(eb, image);
    }

    let intersection = area(intersect(ea, eb));
    let union = area(ea) + area(eb) - intersection;
    if union <= 0.0 {
        0.0
    } else {
        #[allow(clippy::cast_possible_truncation)]
        let overlap = (intersection / union) as f32;
        overlap
    }
}

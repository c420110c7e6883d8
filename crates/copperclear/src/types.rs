use geo::{BoundingRect, Coord, LineString, Polygon, Rect};
use serde::{Deserialize, Serialize};

/// What a tool is asked to do during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToolOperation {
    /// Remove all non-copper area reachable by the tool.
    Clear,
    /// Trace an offset ring around each feature boundary.
    Isolation,
}

/// Area-clearing strategy for one tool.
///
/// `Combo` is not a fourth primitive: it is a fixed fallback chain over the
/// other three (lines, then seed, then standard).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClearMethod {
    Standard,
    Seed,
    Lines,
    Combo,
}

/// Processing order for the selected tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToolOrder {
    /// Table order, as inserted.
    Default,
    /// Ascending diameter.
    Forward,
    /// Descending diameter. Rest machining forces this.
    Reverse,
}

/// Spindle approach relative to the feature boundary; flips the winding of
/// isolation rings so the tool stays on the correct side of the feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MillingDirection {
    Climb,
    Conventional,
}

/// A single round tool in the pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    /// Unique, stable identifier within one tool set.
    pub uid: u32,
    /// Cutting diameter in mm. Must be positive.
    pub diameter: f64,
    pub operation: ToolOperation,
    pub method: ClearMethod,
    /// Fraction of the diameter that successive passes overlap, in `[0, 1)`.
    pub overlap: f64,
    /// Join adjacent line passes where the junction stays inside the
    /// reachable interior.
    pub connect: bool,
    /// Add a perimeter pass along the reachable boundary.
    pub contour: bool,
    /// Apply an extra standoff buffer around features before clearing.
    pub offset_enabled: bool,
    /// Standoff distance in mm, used when `offset_enabled` is set.
    pub offset_value: f64,
}

impl Tool {
    pub fn radius(&self) -> f64 {
        self.diameter / 2.0
    }

    /// Distance between successive passes.
    pub fn stepover(&self) -> f64 {
        self.diameter * (1.0 - self.overlap)
    }
}

/// Whether a source object is a copper feature set (Gerber) or arbitrary
/// editor geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    Features,
    Geometry,
}

/// One primitive of a source object: a filled region or an open path.
#[derive(Debug, Clone)]
pub enum SourceShape {
    Solid(Polygon<f64>),
    Path(LineString<f64>),
}

/// Immutable view of the object being cleared.
#[derive(Debug, Clone)]
pub struct SourceGeometry {
    kind: SourceKind,
    shapes: Vec<SourceShape>,
}

impl SourceGeometry {
    pub fn new(kind: SourceKind, shapes: Vec<SourceShape>) -> Self {
        Self { kind, shapes }
    }

    /// Convenience constructor for a polygon-only source.
    pub fn from_polygons(kind: SourceKind, polygons: Vec<Polygon<f64>>) -> Self {
        Self {
            kind,
            shapes: polygons.into_iter().map(SourceShape::Solid).collect(),
        }
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn solid_geometry(&self) -> &[SourceShape] {
        &self.shapes
    }

    pub fn polygons(&self) -> impl Iterator<Item = &Polygon<f64>> {
        self.shapes.iter().filter_map(|shape| match shape {
            SourceShape::Solid(poly) => Some(poly),
            SourceShape::Path(_) => None,
        })
    }

    pub fn paths(&self) -> impl Iterator<Item = &LineString<f64>> {
        self.shapes.iter().filter_map(|shape| match shape {
            SourceShape::Path(line) => Some(line),
            SourceShape::Solid(_) => None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Axis-aligned bounds over every primitive, or `None` for an empty
    /// source.
    pub fn bounds(&self) -> Option<Rect<f64>> {
        let mut rect: Option<Rect<f64>> = None;
        for shape in &self.shapes {
            let next = match shape {
                SourceShape::Solid(poly) => poly.bounding_rect(),
                SourceShape::Path(line) => line.bounding_rect(),
            };
            let Some(next) = next else { continue };
            rect = Some(match rect {
                None => next,
                Some(acc) => Rect::new(
                    Coord {
                        x: acc.min().x.min(next.min().x),
                        y: acc.min().y.min(next.min().y),
                    },
                    Coord {
                        x: acc.max().x.max(next.max().x),
                        y: acc.max().y.max(next.max().y),
                    },
                ),
            });
        }
        rect
    }
}

/// A user-drawn selection shape for `ReferenceMode::Selection`.
#[derive(Debug, Clone)]
pub enum SelectionShape {
    /// A click-pair instantiated as an axis-aligned rectangle.
    Square {
        corner_a: (f64, f64),
        corner_b: (f64, f64),
    },
    /// A free-form click sequence, closed into a polygon.
    Freeform(Vec<(f64, f64)>),
}

/// How the area to be processed is derived.
#[derive(Debug, Clone)]
pub enum ReferenceMode {
    /// The source object's own footprint.
    Itself,
    /// The union of user-drawn selection shapes.
    Selection(Vec<SelectionShape>),
    /// Another object's footprint.
    Object(SourceGeometry),
}

/// Parameters of one clearing run. Per-tool settings (method, overlap,
/// connect, contour, offset) ride on each [`Tool`].
#[derive(Debug, Clone)]
pub struct ClearParams {
    pub reference: ReferenceMode,
    /// Signed margin around the reference area, in mm. Negative shrinks.
    pub margin: f64,
    pub order: ToolOrder,
    pub rest_machining: bool,
    pub milling_direction: MillingDirection,
}

impl ClearParams {
    pub fn new(reference: ReferenceMode, margin: f64) -> Self {
        Self {
            reference,
            margin,
            order: ToolOrder::Default,
            rest_machining: false,
            milling_direction: MillingDirection::Climb,
        }
    }
}

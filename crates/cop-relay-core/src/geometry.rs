//! GeoJSON geometry values.
//!
//! Objects carry an optional spatial geometry. The store emits it as a
//! GeoJSON document (sometimes with a legacy `crs` member, which is
//! ignored). Geometries are validated structurally on parse so a broken
//! document is rejected at the edge instead of surfacing later in a client.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A single coordinate tuple: `[x, y]` or `[x, y, z]`.
pub type Position = Vec<f64>;

/// A GeoJSON geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: Position },
    MultiPoint { coordinates: Vec<Position> },
    LineString { coordinates: Vec<Position> },
    MultiLineString { coordinates: Vec<Vec<Position>> },
    Polygon { coordinates: Vec<Vec<Position>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Position>>> },
    GeometryCollection { geometries: Vec<Geometry> },
}

/// Axis-aligned bounding box in the geometry's coordinate space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    fn from_position(p: &[f64]) -> Self {
        Self {
            min_x: p[0],
            min_y: p[1],
            max_x: p[0],
            max_y: p[1],
        }
    }

    fn extend(&mut self, other: &BoundingBox) {
        self.min_x = self.min_x.min(other.min_x);
        self.min_y = self.min_y.min(other.min_y);
        self.max_x = self.max_x.max(other.max_x);
        self.max_y = self.max_y.max(other.max_y);
    }

    /// Whether two boxes share at least one point (edges count).
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }
}

impl Geometry {
    /// Parse and validate a GeoJSON document.
    pub fn from_geojson(text: &str) -> Result<Self, CoreError> {
        let geometry: Geometry = serde_json::from_str(text)
            .map_err(|e| CoreError::InvalidGeometry(e.to_string()))?;
        geometry.validate()?;
        Ok(geometry)
    }

    /// Parse and validate an already-decoded JSON value.
    pub fn from_value(value: serde_json::Value) -> Result<Self, CoreError> {
        let geometry: Geometry = serde_json::from_value(value)
            .map_err(|e| CoreError::InvalidGeometry(e.to_string()))?;
        geometry.validate()?;
        Ok(geometry)
    }

    /// Render back to GeoJSON text.
    pub fn to_geojson(&self) -> Result<String, CoreError> {
        serde_json::to_string(self).map_err(|e| CoreError::EncodingError(e.to_string()))
    }

    /// The GeoJSON `type` member of this geometry.
    pub fn kind(&self) -> &'static str {
        match self {
            Geometry::Point { .. } => "Point",
            Geometry::MultiPoint { .. } => "MultiPoint",
            Geometry::LineString { .. } => "LineString",
            Geometry::MultiLineString { .. } => "MultiLineString",
            Geometry::Polygon { .. } => "Polygon",
            Geometry::MultiPolygon { .. } => "MultiPolygon",
            Geometry::GeometryCollection { .. } => "GeometryCollection",
        }
    }

    /// Check structural validity.
    ///
    /// - every position has at least two finite ordinates
    /// - a line string has at least two positions
    /// - a polygon ring is closed and has at least four positions
    pub fn validate(&self) -> Result<(), CoreError> {
        match self {
            Geometry::Point { coordinates } => check_position(coordinates),
            Geometry::MultiPoint { coordinates } => {
                coordinates.iter().try_for_each(|p| check_position(p))
            }
            Geometry::LineString { coordinates } => check_line(coordinates),
            Geometry::MultiLineString { coordinates } => {
                coordinates.iter().try_for_each(|l| check_line(l))
            }
            Geometry::Polygon { coordinates } => check_polygon(coordinates),
            Geometry::MultiPolygon { coordinates } => {
                coordinates.iter().try_for_each(|p| check_polygon(p))
            }
            Geometry::GeometryCollection { geometries } => {
                geometries.iter().try_for_each(Geometry::validate)
            }
        }
    }

    /// Bounding box over every position, or `None` for an empty geometry.
    pub fn bbox(&self) -> Option<BoundingBox> {
        let mut acc: Option<BoundingBox> = None;
        self.for_each_position(&mut |p: &[f64]| {
            if p.len() < 2 {
                return;
            }
            let b = BoundingBox::from_position(p);
            acc = Some(match acc {
                Some(mut existing) => {
                    existing.extend(&b);
                    existing
                }
                None => b,
            });
        });
        acc
    }

    fn for_each_position(&self, f: &mut dyn FnMut(&[f64])) {
        match self {
            Geometry::Point { coordinates } => f(coordinates.as_slice()),
            Geometry::MultiPoint { coordinates } | Geometry::LineString { coordinates } => {
                coordinates.iter().for_each(|p| f(p.as_slice()))
            }
            Geometry::MultiLineString { coordinates } | Geometry::Polygon { coordinates } => {
                coordinates.iter().flatten().for_each(|p| f(p.as_slice()))
            }
            Geometry::MultiPolygon { coordinates } => coordinates
                .iter()
                .flatten()
                .flatten()
                .for_each(|p| f(p.as_slice())),
            Geometry::GeometryCollection { geometries } => {
                for g in geometries {
                    g.for_each_position(&mut *f);
                }
            }
        }
    }
}

fn check_position(p: &[f64]) -> Result<(), CoreError> {
    if p.len() < 2 {
        return Err(CoreError::InvalidGeometry(format!(
            "position needs at least 2 ordinates, got {}",
            p.len()
        )));
    }
    if p.iter().any(|v| !v.is_finite()) {
        return Err(CoreError::InvalidGeometry("non-finite ordinate".into()));
    }
    Ok(())
}

fn check_line(line: &[Position]) -> Result<(), CoreError> {
    if line.len() < 2 {
        return Err(CoreError::InvalidGeometry(
            "line string needs at least 2 positions".into(),
        ));
    }
    line.iter().try_for_each(|p| check_position(p))
}

fn check_polygon(rings: &[Vec<Position>]) -> Result<(), CoreError> {
    for ring in rings {
        if ring.len() < 4 {
            return Err(CoreError::InvalidGeometry(
                "polygon ring needs at least 4 positions".into(),
            ));
        }
        ring.iter().try_for_each(|p| check_position(p))?;
        if ring.first() != ring.last() {
            return Err(CoreError::InvalidGeometry("polygon ring is not closed".into()));
        }
    }
    Ok(())
}

use georaster::{Crs, C};
use geo::geometry::Coord;
use serde::Serialize;
use std::fmt;

/// Stable identifier of a point within its [PointSet].
///
/// Ids are assigned in insertion order starting at 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PointId(pub u64);

impl fmt::Display for PointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "point #{}", self.0)
    }
}

/// A geographic location with caller-supplied attributes.
///
/// Attributes are opaque to the sampler and carried through
/// untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct Point<A> {
    id: PointId,
    geometry: geo::Point<C>,
    attributes: A,
}

impl<A> Point<A> {
    pub fn id(&self) -> PointId {
        self.id
    }

    pub fn geometry(&self) -> geo::Point<C> {
        self.geometry
    }

    pub fn coord(&self) -> Coord<C> {
        self.geometry.0
    }

    pub fn attributes(&self) -> &A {
        &self.attributes
    }
}

/// An ordered collection of points sharing one CRS.
#[derive(Debug, Clone, PartialEq)]
pub struct PointSet<A> {
    crs: Crs,
    points: Vec<Point<A>>,
}

impl<A> PointSet<A> {
    pub fn new(crs: Crs) -> Self {
        Self {
            crs,
            points: Vec::new(),
        }
    }

    pub fn with_capacity(crs: Crs, capacity: usize) -> Self {
        Self {
            crs,
            points: Vec::with_capacity(capacity),
        }
    }

    /// Appends a point and returns its id.
    pub fn push(&mut self, coord: Coord<C>, attributes: A) -> PointId {
        let id = PointId(self.points.len() as u64);
        self.points.push(Point {
            id,
            geometry: geo::Point(coord),
            attributes,
        });
        id
    }

    pub fn crs(&self) -> Crs {
        self.crs
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, id: PointId) -> Option<&Point<A>> {
        usize::try_from(id.0)
            .ok()
            .and_then(|idx| self.points.get(idx))
    }

    /// Returns an iterator over points in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, Point<A>> {
        self.points.iter()
    }
}

impl<'a, A> IntoIterator for &'a PointSet<A> {
    type Item = &'a Point<A>;
    type IntoIter = std::slice::Iter<'a, Point<A>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

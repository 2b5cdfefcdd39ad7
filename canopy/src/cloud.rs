use crate::CanopyError;
use geo::geometry::{Coord, Rect};
use georaster::C;
use serde::Deserialize;
use std::{fs::File, io::Read, path::Path};

/// A single photogrammetric or LiDAR return.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Point3 {
    pub x: C,
    pub y: C,
    pub z: C,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCloud {
    pub points: Vec<Point3>,
}

impl PointCloud {
    pub fn new(points: Vec<Point3>) -> Self {
        Self { points }
    }

    /// Reads a CSV with at least `x`, `y` and `z` columns.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self, CanopyError> {
        Self::from_reader(File::open(path)?)
    }

    pub fn from_reader<R: Read>(rdr: R) -> Result<Self, CanopyError> {
        let points = csv::Reader::from_reader(rdr)
            .deserialize()
            .collect::<Result<Vec<Point3>, _>>()?;
        Ok(Self { points })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Returns the 2D bounding box of all points.
    pub fn bounds(&self) -> Option<Rect<C>> {
        let first = self.points.first()?;
        let init = (first.x, first.y, first.x, first.y);
        let (min_x, min_y, max_x, max_y) =
            self.points.iter().fold(init, |(x0, y0, x1, y1), p| {
                (x0.min(p.x), y0.min(p.y), x1.max(p.x), y1.max(p.y))
            });
        Some(Rect::new(
            Coord { x: min_x, y: min_y },
            Coord { x: max_x, y: max_y },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::{Point3, PointCloud};
    use crate::CanopyError;
    use geo::geometry::Coord;

    #[test]
    fn test_from_reader() {
        let data = "x,y,z,red\n1.0,2.0,3.0,255\n-1.5,4.0,0.5,0\n";
        let cloud = PointCloud::from_reader(data.as_bytes()).unwrap();
        assert_eq!(cloud.len(), 2);
        assert_eq!(
            cloud.points[1],
            Point3 {
                x: -1.5,
                y: 4.0,
                z: 0.5
            }
        );
        let bounds = cloud.bounds().unwrap();
        assert_eq!(bounds.min(), Coord { x: -1.5, y: 2.0 });
        assert_eq!(bounds.max(), Coord { x: 1.0, y: 4.0 });
    }

    #[test]
    fn test_bad_rows() {
        let data = "x,y,z\n1.0,2.0,high\n";
        assert!(matches!(
            PointCloud::from_reader(data.as_bytes()),
            Err(CanopyError::Csv(_))
        ));
    }

    #[test]
    fn test_empty() {
        let cloud = PointCloud::from_reader("x,y,z\n".as_bytes()).unwrap();
        assert!(cloud.is_empty());
        assert_eq!(cloud.bounds(), None);
    }
}

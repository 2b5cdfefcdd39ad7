//! Affine mapping between pixel space and geographic space.

use crate::{RasterError, C};
use geo::geometry::Coord;

/// Six-coefficient affine transform in GDAL order.
///
/// ```text
/// x = c[0] + col * c[1] + row * c[2]
/// y = c[3] + col * c[4] + row * c[5]
/// ```
///
/// `(col, row) = (0, 0)` is the outer corner of the first pixel, not
/// its center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform([C; 6]);

impl GeoTransform {
    pub const fn new(coefficients: [C; 6]) -> Self {
        Self(coefficients)
    }

    /// North-up transform with the upper left corner at `(x0, y0)`.
    ///
    /// `dy` is normally negative.
    pub const fn from_origin(x0: C, y0: C, dx: C, dy: C) -> Self {
        Self([x0, dx, 0.0, y0, 0.0, dy])
    }

    pub fn coefficients(&self) -> [C; 6] {
        self.0
    }

    pub fn origin(&self) -> Coord<C> {
        Coord {
            x: self.0[0],
            y: self.0[3],
        }
    }

    /// Pixel size as `(dx, dy)`, ignoring rotation terms.
    pub fn pixel_size(&self) -> (C, C) {
        (self.0[1], self.0[5])
    }

    pub fn is_north_up(&self) -> bool {
        self.0[2] == 0.0 && self.0[4] == 0.0
    }

    /// Geographic coordinate of fractional pixel position `(col, row)`.
    pub fn apply(&self, col: C, row: C) -> Coord<C> {
        let [x0, a, b, y0, d, e] = self.0;
        Coord {
            x: x0 + col * a + row * b,
            y: y0 + col * d + row * e,
        }
    }

    /// Geographic coordinate of the center of pixel `(row, col)`.
    #[allow(clippy::cast_precision_loss)]
    pub fn pixel_center(&self, row: usize, col: usize) -> Coord<C> {
        self.apply(col as C + 0.5, row as C + 0.5)
    }

    pub fn invert(&self) -> Result<Self, RasterError> {
        let [x0, a, b, y0, d, e] = self.0;
        let det = a * e - b * d;
        if det == 0.0 || !det.is_finite() {
            return Err(RasterError::Singular);
        }
        let ia = e / det;
        let ib = -b / det;
        let id = -d / det;
        let ie = a / det;
        Ok(Self([
            -ia * x0 - ib * y0,
            ia,
            ib,
            -id * x0 - ie * y0,
            id,
            ie,
        ]))
    }
}

/// Precomputed inverse of a [GeoTransform].
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PixelLocator(GeoTransform);

impl PixelLocator {
    pub(crate) fn new(transform: &GeoTransform) -> Result<Self, RasterError> {
        transform.invert().map(Self)
    }

    /// Returns `(row, col)` of the pixel containing `coord`.
    ///
    /// Indices are floored, so they may be negative or past the
    /// raster's edge. Callers range check. Returns `None` for
    /// non-finite coordinates or indices beyond `isize`.
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub(crate) fn locate(&self, coord: Coord<C>) -> Option<(isize, isize)> {
        let Coord { x: col, y: row } = self.0.apply(coord.x, coord.y);
        let index = |v: C| {
            let v = v.floor();
            (v.is_finite() && v >= isize::MIN as C && v < isize::MAX as C).then(|| v as isize)
        };
        Some((index(row)?, index(col)?))
    }
}

#[cfg(test)]
mod tests {
    use super::{Coord, GeoTransform, PixelLocator};
    use crate::RasterError;
    use approx::assert_relative_eq;

    #[test]
    fn test_north_up_roundtrip() {
        let gt = GeoTransform::from_origin(500_000.0, 4_200_000.0, 70.0, -70.0);
        let inv = gt.invert().unwrap();
        let Coord { x, y } = gt.apply(12.25, 7.75);
        let back = inv.apply(x, y);
        assert_relative_eq!(back.x, 12.25, epsilon = 1e-9);
        assert_relative_eq!(back.y, 7.75, epsilon = 1e-9);
    }

    #[test]
    fn test_rotated_roundtrip() {
        let gt = GeoTransform::new([10.0, 2.0, 0.5, 20.0, 0.25, -2.0]);
        let inv = gt.invert().unwrap();
        let c = gt.apply(3.0, 4.0);
        let back = inv.apply(c.x, c.y);
        assert_relative_eq!(back.x, 3.0, epsilon = 1e-9);
        assert_relative_eq!(back.y, 4.0, epsilon = 1e-9);
    }

    #[test]
    fn test_singular() {
        let gt = GeoTransform::new([0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert!(matches!(gt.invert(), Err(RasterError::Singular)));
    }

    #[test]
    fn test_locate_floors() {
        let gt = GeoTransform::from_origin(0.0, 4.0, 1.0, -1.0);
        let locator = PixelLocator::new(&gt).unwrap();
        assert_eq!(locator.locate(Coord { x: 0.5, y: 3.5 }), Some((0, 0)));
        assert_eq!(locator.locate(Coord { x: 3.99, y: 0.01 }), Some((3, 3)));
        assert_eq!(locator.locate(Coord { x: -0.01, y: 4.01 }), Some((-1, -1)));
        assert_eq!(locator.locate(Coord { x: 4.0, y: 0.0 }), Some((4, 4)));
        assert_eq!(locator.locate(Coord { x: f64::NAN, y: 3.5 }), None);
        assert_eq!(locator.locate(Coord { x: 0.5, y: f64::NEG_INFINITY }), None);
        assert_eq!(locator.locate(Coord { x: 1e300, y: 3.5 }), None);
    }

    #[test]
    fn test_pixel_center() {
        let gt = GeoTransform::from_origin(0.0, 4.0, 1.0, -1.0);
        assert_eq!(gt.pixel_center(0, 0), Coord { x: 0.5, y: 3.5 });
        assert_eq!(gt.pixel_center(3, 1), Coord { x: 1.5, y: 0.5 });
    }
}

use crate::CanopyError;
use geo::geometry::{Coord, Rect};
use georaster::{Crs, GeoTransform, Raster, RasterError, C};
use std::ops::{Index, IndexMut};

/// Sentinel written in place of `NaN` when a grid leaves memory.
pub const NODATA: C = -9999.0;

/// Largest grid [Grid::covering] will allocate.
pub const MAX_CELLS: usize = 1 << 30;

/// A north-up, single-band, row-major grid with square cells.
///
/// Missing cells hold `NaN`.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    rows: usize,
    cols: usize,
    /// Upper left corner of cell (0, 0).
    origin: Coord<C>,
    /// Cell edge length in map units.
    res: C,
    data: Vec<C>,
}

impl Grid {
    pub fn new(rows: usize, cols: usize, origin: Coord<C>, res: C, fill: C) -> Self {
        Self {
            rows,
            cols,
            origin,
            res,
            data: vec![fill; rows * cols],
        }
    }

    /// Returns an all-`NaN` grid whose cells cover `bounds`.
    ///
    /// A point on the east or south edge of `bounds` still lands in
    /// the last column or row.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn covering(bounds: Rect<C>, res: C) -> Result<Self, CanopyError> {
        if !(res > 0.0 && res.is_finite()) {
            return Err(CanopyError::Parameter(format!("resolution {res}")));
        }
        let (min, max) = (bounds.min(), bounds.max());
        if ![min.x, min.y, max.x, max.y].iter().all(|v| v.is_finite()) {
            return Err(CanopyError::Parameter(format!(
                "bounds ({}, {}) - ({}, {})",
                min.x, min.y, max.x, max.y
            )));
        }
        let too_big = || {
            CanopyError::Parameter(format!(
                "{} x {} at resolution {res} exceeds {MAX_CELLS} cells",
                bounds.width(),
                bounds.height()
            ))
        };
        let count = |extent: C| {
            let n = (extent / res).floor();
            (n.is_finite() && n < MAX_CELLS as C).then(|| n as usize + 1)
        };
        let cols = count(bounds.width()).ok_or_else(too_big)?;
        let rows = count(bounds.height()).ok_or_else(too_big)?;
        if rows.checked_mul(cols).map_or(true, |n| n > MAX_CELLS) {
            return Err(too_big());
        }
        let origin = Coord {
            x: min.x,
            y: max.y,
        };
        Ok(Self::new(rows, cols, origin, res, C::NAN))
    }

    /// Returns an all-`NaN` grid with the same shape and
    /// georeferencing as `self`.
    pub fn blank(&self) -> Self {
        self.filled(C::NAN)
    }

    /// Like [Grid::blank], but every cell holds `fill`.
    pub fn filled(&self, fill: C) -> Self {
        Self::new(self.rows, self.cols, self.origin, self.res, fill)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn res(&self) -> C {
        self.res
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[C] {
        &self.data
    }

    /// Returns `true` if `other` has the same shape and
    /// georeferencing.
    pub fn aligned(&self, other: &Grid) -> bool {
        self.rows == other.rows
            && self.cols == other.cols
            && self.origin == other.origin
            && self.res == other.res
    }

    pub fn transform(&self) -> GeoTransform {
        GeoTransform::from_origin(self.origin.x, self.origin.y, self.res, -self.res)
    }

    /// Returns the value at `(row, col)` if in range and not `NaN`.
    pub fn get(&self, row: isize, col: isize) -> Option<C> {
        let row = usize::try_from(row).ok().filter(|r| *r < self.rows)?;
        let col = usize::try_from(col).ok().filter(|c| *c < self.cols)?;
        Some(self[(row, col)]).filter(|v| !v.is_nan())
    }

    /// Returns `(row, col)` of the cell containing `coord`.
    #[allow(clippy::cast_possible_truncation)]
    pub fn cell_of(&self, coord: Coord<C>) -> Option<(usize, usize)> {
        if !(coord.x.is_finite() && coord.y.is_finite()) {
            return None;
        }
        let col = ((coord.x - self.origin.x) / self.res).floor() as isize;
        let row = ((self.origin.y - coord.y) / self.res).floor() as isize;
        let row = usize::try_from(row).ok().filter(|r| *r < self.rows)?;
        let col = usize::try_from(col).ok().filter(|c| *c < self.cols)?;
        Some((row, col))
    }

    /// Returns the map coordinate of the center of `(row, col)`.
    #[allow(clippy::cast_precision_loss)]
    pub fn center(&self, row: usize, col: usize) -> Coord<C> {
        Coord {
            x: self.origin.x + (col as C + 0.5) * self.res,
            y: self.origin.y - (row as C + 0.5) * self.res,
        }
    }

    /// Converts to a single-band raster, replacing `NaN` with
    /// [NODATA].
    pub fn to_raster(&self, crs: Crs) -> Result<Raster, RasterError> {
        let band = self
            .data
            .iter()
            .map(|v| if v.is_nan() { NODATA } else { *v })
            .collect();
        Raster::from_bands(
            (self.rows, self.cols),
            self.transform(),
            crs,
            Some(NODATA),
            vec![band],
        )
    }
}

impl Index<(usize, usize)> for Grid {
    type Output = C;

    fn index(&self, (row, col): (usize, usize)) -> &C {
        &self.data[row * self.cols + col]
    }
}

impl IndexMut<(usize, usize)> for Grid {
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut C {
        &mut self.data[row * self.cols + col]
    }
}

use crate::{
    transform::{GeoTransform, PixelLocator},
    Crs, RasterError, C,
};
use byteorder::{BigEndian as BE, ReadBytesExt};
use geo::geometry::{Coord, Rect};
use memmap2::Mmap;
use std::mem::size_of;

/// Storage for one band's samples, row-major with row 0 at the
/// transform's origin.
pub(crate) enum SampleStore {
    InMem(Box<[C]>),
    /// Big-endian `i16` samples, as found in HGT tiles.
    MemMapI16(Mmap),
}

impl SampleStore {
    fn len(&self) -> usize {
        match self {
            Self::InMem(samples) => samples.len(),
            Self::MemMapI16(raw) => raw.len() / size_of::<i16>(),
        }
    }

    fn get_unchecked(&self, index: usize) -> C {
        match self {
            Self::InMem(samples) => samples[index],
            Self::MemMapI16(raw) => {
                let start = index * size_of::<i16>();
                let mut bytes = &raw[start..start + size_of::<i16>()];
                // The slice is exactly two bytes long, so this read can't
                // hit EOF.
                bytes.read_i16::<BE>().map_or(C::NAN, C::from)
            }
        }
    }
}

/// A georeferenced grid of one or more bands.
///
/// All bands share the same dimensions, transform, CRS, and no-data
/// value.
pub struct Raster {
    /// Number of (rows, columns).
    dimensions: (usize, usize),

    /// Pixel space to geographic space.
    transform: GeoTransform,

    /// Geographic space to pixel space.
    locator: PixelLocator,

    crs: Crs,

    /// Sentinel marking missing samples. Passed through, never
    /// interpreted, by lookups.
    nodata: Option<C>,

    bands: Vec<SampleStore>,
}

impl Raster {
    /// Returns a raster holding `bands` in memory.
    ///
    /// Each band must contain exactly `rows * cols` row-major samples.
    pub fn from_bands(
        (rows, cols): (usize, usize),
        transform: GeoTransform,
        crs: Crs,
        nodata: Option<C>,
        bands: Vec<Vec<C>>,
    ) -> Result<Self, RasterError> {
        let stores = bands
            .into_iter()
            .map(|band| SampleStore::InMem(band.into_boxed_slice()))
            .collect();
        Self::from_stores((rows, cols), transform, crs, nodata, stores)
    }

    pub(crate) fn from_stores(
        dimensions @ (rows, cols): (usize, usize),
        transform: GeoTransform,
        crs: Crs,
        nodata: Option<C>,
        bands: Vec<SampleStore>,
    ) -> Result<Self, RasterError> {
        if rows == 0 || cols == 0 || bands.is_empty() {
            return Err(RasterError::Dimensions { rows, cols });
        }
        if bands.iter().any(|band| band.len() != rows * cols) {
            return Err(RasterError::Dimensions { rows, cols });
        }
        let locator = PixelLocator::new(&transform)?;
        Ok(Self {
            dimensions,
            transform,
            locator,
            crs,
            nodata,
            bands,
        })
    }

    pub fn rows(&self) -> usize {
        self.dimensions.0
    }

    pub fn cols(&self) -> usize {
        self.dimensions.1
    }

    /// Returns `(rows, cols)`.
    pub fn dimensions(&self) -> (usize, usize) {
        self.dimensions
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn crs(&self) -> Crs {
        self.crs
    }

    pub fn nodata(&self) -> Option<C> {
        self.nodata
    }

    /// Returns `true` if `value` is this raster's no-data sentinel.
    pub fn is_nodata(&self, value: C) -> bool {
        match self.nodata {
            Some(nodata) if nodata.is_nan() => value.is_nan(),
            Some(nodata) => value == nodata,
            None => false,
        }
    }

    /// Returns the bounding box of all four raster corners.
    #[allow(clippy::cast_precision_loss)]
    pub fn extent(&self) -> Rect<C> {
        let (rows, cols) = (self.rows() as C, self.cols() as C);
        let corners = [
            self.transform.apply(0.0, 0.0),
            self.transform.apply(cols, 0.0),
            self.transform.apply(0.0, rows),
            self.transform.apply(cols, rows),
        ];
        let (mut min, mut max) = (corners[0], corners[0]);
        for c in &corners[1..] {
            min.x = min.x.min(c.x);
            min.y = min.y.min(c.y);
            max.x = max.x.max(c.x);
            max.y = max.y.max(c.y);
        }
        Rect::new(min, max)
    }

    /// Returns `(row, col)` of the pixel containing `coord`, or `None`
    /// if `coord` falls outside the raster.
    ///
    /// Each pixel owns its top/left edges, so a point on the far
    /// (right or bottom, for a north-up raster) edge of the extent is
    /// outside.
    pub fn pixel_of(&self, coord: Coord<C>) -> Option<(usize, usize)> {
        let (row, col) = self.locator.locate(coord)?;
        let in_range = |idx: isize, len: usize| usize::try_from(idx).ok().filter(|i| *i < len);
        Some((in_range(row, self.rows())?, in_range(col, self.cols())?))
    }

    pub fn contains(&self, coord: Coord<C>) -> bool {
        self.pixel_of(coord).is_some()
    }

    /// Returns band `band`'s sample at `(row, col)`.
    pub fn get(&self, band: usize, row: usize, col: usize) -> Option<C> {
        let (rows, cols) = self.dimensions;
        if row < rows && col < cols {
            self.bands
                .get(band)
                .map(|store| store.get_unchecked(self.linear_index(row, col)))
        } else {
            None
        }
    }

    /// Returns every band's sample at `(row, col)`, in band order.
    ///
    /// # Panics
    ///
    /// Panics if `(row, col)` is out of range.
    pub fn values_at(&self, row: usize, col: usize) -> Vec<C> {
        assert!(row < self.rows() && col < self.cols());
        let idx = self.linear_index(row, col);
        self.bands
            .iter()
            .map(|store| store.get_unchecked(idx))
            .collect()
    }

    /// Returns every band's sample at the pixel containing `coord`.
    pub fn sample(&self, coord: Coord<C>) -> Option<Vec<C>> {
        self.pixel_of(coord)
            .map(|(row, col)| self.values_at(row, col))
    }

    /// Returns a view of band `band`.
    pub fn band(&self, band: usize) -> Option<Band<'_>> {
        self.bands.get(band).map(|store| Band {
            raster: self,
            store,
        })
    }
}

/// Private API
impl Raster {
    fn linear_index(&self, row: usize, col: usize) -> usize {
        row * self.dimensions.1 + col
    }
}

/// A single band of a [Raster].
pub struct Band<'a> {
    raster: &'a Raster,
    store: &'a SampleStore,
}

impl<'a> Band<'a> {
    pub fn get(&self, row: usize, col: usize) -> Option<C> {
        let (rows, cols) = self.raster.dimensions;
        (row < rows && col < cols)
            .then(|| self.store.get_unchecked(self.raster.linear_index(row, col)))
    }

    /// Returns an iterator over samples in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = C> + '_ {
        (0..self.store.len()).map(|idx| self.store.get_unchecked(idx))
    }

    /// Returns the lowest and highest valid sample, skipping no-data
    /// and NaN.
    pub fn min_max(&self) -> Option<(C, C)> {
        self.iter()
            .filter(|v| !v.is_nan() && !self.raster.is_nodata(*v))
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}

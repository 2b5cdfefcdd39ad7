//! Georeferenced rasters.
//!
//! A [Raster] is a stack of same-sized bands plus the affine
//! [GeoTransform] that places them on the ground. Rasters are loaded
//! from NASADEM/SRTM `.hgt` tiles ([hgt]) or GeoTIFFs ([geotiff]), or
//! built in memory with [Raster::from_bands].

mod crs;
mod error;
pub mod geotiff;
pub mod hgt;
mod raster;
mod transform;

pub use crate::{
    crs::{Crs, ParseCrsError},
    error::RasterError,
    raster::{Band, Raster},
    transform::GeoTransform,
};
pub use geo;
use std::path::Path;

/// Base floating point type used for all coordinates and samples.
pub type C = f64;

/// How to load raster samples.
///
/// The trade off between loading tile data into memory versus memory
/// mapping is not obvious, and you should measure both before
/// deciding. Only HGT tiles can be memory mapped; GeoTIFFs are always
/// decoded into memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TileMode {
    /// Parse samples and load into memory.
    #[default]
    InMem,

    /// Memory map file contents.
    MemMap,
}

/// Opens the raster at `path`, choosing a reader by file extension.
pub fn open<P: AsRef<Path>>(path: P, mode: TileMode) -> Result<Raster, RasterError> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(std::ffi::OsStr::to_str)
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("hgt") => hgt::load(path, mode),
        Some("tif" | "tiff") => geotiff::load(path),
        _ => Err(RasterError::Format(path.to_owned())),
    }
}

#[cfg(test)]
mod tests {
    use super::{open, RasterError, TileMode};

    #[test]
    fn test_open_unknown_extension() {
        assert!(matches!(
            open("ecostress.h5", TileMode::InMem),
            Err(RasterError::Format(_))
        ));
        assert!(matches!(
            open("no_extension", TileMode::InMem),
            Err(RasterError::Format(_))
        ));
    }

    #[test]
    fn test_open_dispatches_on_extension() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            open(dir.path().join("N44W072.HGT"), TileMode::MemMap),
            Err(RasterError::Io(_))
        ));
        assert!(matches!(
            open(dir.path().join("wue.TIF"), TileMode::InMem),
            Err(RasterError::Io(_))
        ));
    }
}

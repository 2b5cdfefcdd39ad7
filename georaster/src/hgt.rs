//! NASADEM/SRTM elevation (`.hgt`) file format.
//!
//! # References
//!
//! 1. [30-Meter SRTM Tile Downloader](https://dwtkns.com/srtm30m)
//! 1. [Archive Team](http://fileformats.archiveteam.org/index.php?title=HGT&oldid=17250)
//! 1. [SRTM Collection User Guide](https://lpdaac.usgs.gov/documents/179/SRTM_User_Guide_V3.pdf)

use crate::{raster::SampleStore, Crs, GeoTransform, Raster, RasterError, TileMode, C};
use byteorder::{BigEndian as BE, ReadBytesExt};
use geo::geometry::Coord;
use log::debug;
use memmap2::Mmap;
use std::{fs::File, io::BufReader, mem::size_of, path::Path};

const ARCSEC_PER_DEG: C = 3600.0;

/// Voids in SRTM data.
pub const HGT_NODATA: C = -32768.0;

/// Returns the single-band raster stored in the HGT tile at `path`.
///
/// Tiles are always WGS84. Sample centers sit on whole arcseconds, so
/// the raster extent overhangs the tile's nominal degree square by
/// half a sample on every side.
pub fn load<P: AsRef<Path>>(path: P, mode: TileMode) -> Result<Raster, RasterError> {
    let path = path.as_ref();
    let (resolution, dimensions @ (rows, cols)) = extract_resolution(path)?;
    let sw_corner = parse_sw_corner(path)?;
    let transform = transform(sw_corner, resolution, rows);
    debug!("loading {path:?} ({resolution}\", {mode:?})");

    let samples = match mode {
        TileMode::InMem => {
            let mut file = BufReader::new(File::open(path)?);
            let mut samples = Vec::with_capacity(rows * cols);
            for _ in 0..(rows * cols) {
                samples.push(C::from(file.read_i16::<BE>()?));
            }
            SampleStore::InMem(samples.into_boxed_slice())
        }
        TileMode::MemMap => {
            let file = File::open(path)?;
            // Safety: tiles are treated as immutable for the lifetime of
            // the raster.
            let mmap = unsafe { Mmap::map(&file)? };
            SampleStore::MemMapI16(mmap)
        }
    };

    Raster::from_stores(
        dimensions,
        transform,
        Crs::WGS84,
        Some(HGT_NODATA),
        vec![samples],
    )
}

#[allow(clippy::cast_precision_loss)]
fn transform(sw_corner: Coord<i16>, resolution: u8, rows: usize) -> GeoTransform {
    let step = C::from(resolution) / ARCSEC_PER_DEG;
    let west = C::from(sw_corner.x) - step / 2.0;
    let north = C::from(sw_corner.y) + (rows - 1) as C * step + step / 2.0;
    GeoTransform::from_origin(west, north, step, -step)
}

fn extract_resolution(path: &Path) -> Result<(u8, (usize, usize)), RasterError> {
    const RES_1_ARCSECONDS_FILE_LEN: u64 = 3601 * 3601 * size_of::<u16>() as u64;
    const RES_3_ARCSECONDS_FILE_LEN: u64 = 1201 * 1201 * size_of::<u16>() as u64;
    match path.metadata().map(|m| m.len())? {
        RES_1_ARCSECONDS_FILE_LEN => Ok((1, (3601, 3601))),
        RES_3_ARCSECONDS_FILE_LEN => Ok((3, (1201, 1201))),
        invalid_len => Err(RasterError::HgtLen(invalid_len, path.to_owned())),
    }
}

fn parse_sw_corner(path: &Path) -> Result<Coord<i16>, RasterError> {
    let mk_err = || RasterError::HgtName(path.to_owned());
    let name = path
        .file_stem()
        .and_then(std::ffi::OsStr::to_str)
        .ok_or_else(mk_err)?
        .to_ascii_uppercase();
    if name.len() != 7 {
        return Err(mk_err());
    }
    let lat_sign = match &name[0..1] {
        "N" => 1,
        "S" => -1,
        _ => return Err(mk_err()),
    };
    let lat = lat_sign * name[1..3].parse::<i16>().map_err(|_| mk_err())?;
    let lon_sign = match &name[3..4] {
        "E" => 1,
        "W" => -1,
        _ => return Err(mk_err()),
    };
    let lon = lon_sign * name[4..7].parse::<i16>().map_err(|_| mk_err())?;
    Ok(Coord { x: lon, y: lat })
}

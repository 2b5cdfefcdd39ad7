use crate::PointId;
use georaster::{Crs, RasterError};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SamplerError {
    #[error("unreadable raster {}: {source}", path.display())]
    RasterUnreadable {
        path: PathBuf,
        #[source]
        source: RasterError,
    },

    #[error("raster CRS {raster} does not match point CRS {points}")]
    CrsMismatch { raster: Crs, points: Crs },

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Csv(#[from] csv::Error),

    #[error("{0}")]
    GeoJson(#[from] geojson::Error),

    #[error("{0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid points: {0}")]
    Points(String),

    #[error("no column named '{0}'")]
    Column(String),

    #[error("duplicate column '{0}'")]
    DuplicateColumn(String),

    #[error("{0} is not part of the joined point set")]
    UnknownPoint(PointId),

    #[error("{raster} has {bands} band(s) but {names} band name(s) were given")]
    BandNames {
        raster: String,
        bands: usize,
        names: usize,
    },
}

use georaster::RasterError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CanopyError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Csv(#[from] csv::Error),

    #[error("{0}")]
    Raster(#[from] RasterError),

    #[error("point cloud is empty")]
    EmptyCloud,

    #[error("no ground points classified")]
    NoGround,

    #[error("grids differ in shape or georeferencing")]
    GridMismatch,

    #[error("invalid parameter: {0}")]
    Parameter(String),
}

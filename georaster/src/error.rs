use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RasterError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("invalid HGT name {0}")]
    HgtName(PathBuf),

    #[error("invalid HGT file len {0} for {1}")]
    HgtLen(u64, PathBuf),

    #[error("invalid raster header: {0}")]
    Header(String),

    #[error("band data does not match {rows}x{cols} raster")]
    Dimensions { rows: usize, cols: usize },

    #[error("geo transform is not invertible")]
    Singular,

    #[error("unsupported raster format {0}")]
    Format(PathBuf),
}

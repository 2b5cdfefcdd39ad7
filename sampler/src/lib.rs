//! Nearest-pixel sampling of raster bands at point locations.
//!
//! [sample] reads, for every point inside a raster, the value of each
//! band at the pixel containing that point. [Join] then lines up the
//! samples from several rasters against the original point set, and
//! [Trim] drops outliers from the joined table.

mod error;
pub mod input;
mod join;
pub mod output;
mod point;
mod sample;
mod trim;

pub use crate::{
    error::SamplerError,
    input::Attributes,
    join::{Column, Join, JoinedRow, Table},
    point::{Point, PointId, PointSet},
    sample::{sample, RasterPointSampler, SampleResult, Samples},
    trim::{Bound, NumericAttributes, ParseTrimError, Trim},
};
pub use georaster;

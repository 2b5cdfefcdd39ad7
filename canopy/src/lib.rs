//! Tree crown delineation from drone point clouds.
//!
//! A [PointCloud] is split into ground and non-ground returns by a
//! [GroundClassifier], rasterized into terrain, surface and canopy
//! height models ([rasterize]), searched for tree tops with a
//! variable window filter ([vwf]), and finally segmented into crowns
//! by a [WatershedSegmenter]. [Pipeline] runs all of it.

mod cloud;
mod error;
mod grid;
mod ground;
mod pipeline;
pub mod rasterize;
pub mod vwf;
mod watershed;

pub use crate::{
    cloud::{Point3, PointCloud},
    error::CanopyError,
    grid::{Grid, MAX_CELLS, NODATA},
    ground::{GridMinimum, GroundClassifier},
    pipeline::{CanopyModel, CrownConfig, Pipeline},
    vwf::{TreeTop, WindowFunction},
    watershed::{CrownMetrics, Crowns, MarkerWatershed, WatershedSegmenter},
};

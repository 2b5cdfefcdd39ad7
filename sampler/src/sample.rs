use crate::{Point, PointSet, SamplerError};
use georaster::{Crs, Raster, TileMode, C};
use log::{debug, warn};
use std::path::{Path, PathBuf};

/// Band values read at one point.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleResult<'a, A> {
    /// One value per raster band, in band order. No-data samples are
    /// passed through as the raster's sentinel.
    pub values: Vec<C>,

    /// The point these values were read at.
    pub point: &'a Point<A>,
}

/// Returns the band values of the pixel containing each point in
/// `points`.
///
/// Points outside `raster` are silently dropped, so the output may be
/// shorter than the input. Surviving points keep their input order.
/// Values come from the single containing pixel; nothing is
/// interpolated.
pub fn sample<'a, A>(
    raster: &Raster,
    points: &'a PointSet<A>,
) -> Result<Vec<SampleResult<'a, A>>, SamplerError> {
    check_crs(raster.crs(), points.crs())?;

    let results: Vec<_> = points
        .iter()
        .filter_map(|point| {
            let (row, col) = raster.pixel_of(point.coord())?;
            Some(SampleResult {
                values: raster.values_at(row, col),
                point,
            })
        })
        .collect();

    debug!(
        "sampled {} of {} points, {} outside raster extent",
        results.len(),
        points.len(),
        points.len() - results.len()
    );
    Ok(results)
}

fn check_crs(raster: Crs, points: Crs) -> Result<(), SamplerError> {
    if !raster.is_compatible(&points) {
        return Err(SamplerError::CrsMismatch { raster, points });
    }
    if raster == Crs::Unknown || points == Crs::Unknown {
        warn!("can't verify CRS agreement, raster: {raster}, points: {points}");
    }
    Ok(())
}

/// Samples from a raster file, opening it afresh for every call.
///
/// The raster handle lives only for the duration of
/// [`sample`](RasterPointSampler::sample) and is released on every
/// exit path, so separate samplers may run concurrently on separate
/// threads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterPointSampler {
    path: PathBuf,
    mode: TileMode,
}

/// The output of [RasterPointSampler::sample] plus the raster
/// properties needed to interpret it once the raster is closed.
#[derive(Debug, Clone, PartialEq)]
pub struct Samples<'a, A> {
    pub band_count: usize,
    pub nodata: Option<C>,
    pub results: Vec<SampleResult<'a, A>>,
}

impl RasterPointSampler {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            mode: TileMode::default(),
        }
    }

    #[must_use]
    pub fn mode(mut self, mode: TileMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opens the raster, samples `points`, and closes the raster.
    pub fn sample<'a, A>(&self, points: &'a PointSet<A>) -> Result<Samples<'a, A>, SamplerError> {
        let raster = georaster::open(&self.path, self.mode).map_err(|source| {
            SamplerError::RasterUnreadable {
                path: self.path.clone(),
                source,
            }
        })?;
        let results = sample(&raster, points)?;
        Ok(Samples {
            band_count: raster.band_count(),
            nodata: raster.nodata(),
            results,
        })
    }
}

use crate::{
    rasterize,
    vwf::{self, TreeTop, WindowFunction},
    CanopyError, Crowns, Grid, GridMinimum, GroundClassifier, MarkerWatershed, PointCloud,
    WatershedSegmenter,
};
use georaster::{Crs, C};
use log::info;

/// Everything needed to turn a point cloud into crowns.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrownConfig {
    /// Output cell size in map units.
    pub resolution: C,
    /// CRS of the point cloud coordinates.
    pub crs: Crs,
    pub ground: GridMinimum,
    pub window: WindowFunction,
    /// Shortest canopy height considered a tree top.
    pub min_height: C,
    /// Shortest canopy height included in a crown.
    pub crown_min_height: C,
}

impl Default for CrownConfig {
    fn default() -> Self {
        Self {
            resolution: 0.5,
            crs: Crs::Unknown,
            ground: GridMinimum::default(),
            window: WindowFunction::default(),
            min_height: 2.0,
            crown_min_height: 1.0,
        }
    }
}

/// Elevation models, tree tops and crowns derived from one cloud.
#[derive(Debug, Clone)]
pub struct CanopyModel {
    pub crs: Crs,
    pub dtm: Grid,
    pub dsm: Grid,
    pub chm: Grid,
    pub tops: Vec<TreeTop>,
    pub crowns: Crowns,
}

pub struct Pipeline<G, W> {
    config: CrownConfig,
    ground: G,
    segmenter: W,
}

impl Pipeline<GridMinimum, MarkerWatershed> {
    /// Returns a pipeline using the stock classifier and segmenter.
    pub fn new(config: CrownConfig) -> Self {
        let segmenter = MarkerWatershed {
            min_height: config.crown_min_height,
        };
        Self {
            ground: config.ground,
            config,
            segmenter,
        }
    }
}

impl<G, W> Pipeline<G, W>
where
    G: GroundClassifier,
    W: WatershedSegmenter,
{
    pub fn with_components(config: CrownConfig, ground: G, segmenter: W) -> Self {
        Self {
            config,
            ground,
            segmenter,
        }
    }

    pub fn config(&self) -> &CrownConfig {
        &self.config
    }

    pub fn run(&self, cloud: &PointCloud) -> Result<CanopyModel, CanopyError> {
        let bounds = cloud.bounds().ok_or(CanopyError::EmptyCloud)?;
        let template = Grid::covering(bounds, self.config.resolution)?;
        info!(
            "rasterizing {} points onto {}x{} cells",
            cloud.len(),
            template.rows(),
            template.cols()
        );

        let flags = self.ground.classify(cloud)?;
        let ground = cloud
            .points
            .iter()
            .zip(&flags)
            .filter_map(|(p, is_ground)| is_ground.then_some(p));
        info!(
            "classified {} ground points",
            flags.iter().filter(|f| **f).count()
        );

        let dtm = rasterize::dtm(&template, ground)?;
        let dsm = rasterize::dsm(&template, &cloud.points);
        let chm = rasterize::chm(&dsm, &dtm)?;

        let tops = vwf::detect(&chm, &self.config.window, self.config.min_height)?;
        info!("detected {} tree tops", tops.len());

        let crowns = self.segmenter.segment(&chm, &tops);
        info!("delineated {} crowns", crowns.metrics.len());

        Ok(CanopyModel {
            crs: self.config.crs,
            dtm,
            dsm,
            chm,
            tops,
            crowns,
        })
    }
}

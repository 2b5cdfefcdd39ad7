use crate::options::Crowns;
use anyhow::Result;
use canopy::{CanopyModel, CrownConfig, Grid, GridMinimum, Pipeline, PointCloud, WindowFunction};
use georaster::{geotiff, Crs};
use log::info;
use serde::Serialize;
use std::{fs, path::Path};

impl From<&Crowns> for CrownConfig {
    fn from(args: &Crowns) -> Self {
        Self {
            resolution: args.resolution,
            crs: args.crs,
            ground: GridMinimum {
                cell_size: args.ground_cell,
                tolerance: args.ground_tolerance,
            },
            window: WindowFunction {
                slope: args.ws_slope,
                intercept: args.ws_intercept,
            },
            min_height: args.min_height,
            crown_min_height: args.crown_min_height,
        }
    }
}

pub fn run(cloud: &Path, out_dir: &Path, config: CrownConfig) -> Result<()> {
    let cloud = PointCloud::from_csv(cloud)?;
    info!("read {} points", cloud.len());
    let model = Pipeline::new(config).run(&cloud)?;
    fs::create_dir_all(out_dir)?;
    write_model(&model, out_dir)
}

fn write_model(model: &CanopyModel, out_dir: &Path) -> Result<()> {
    for (name, grid) in [
        ("dtm.tif", &model.dtm),
        ("dsm.tif", &model.dsm),
        ("chm.tif", &model.chm),
        ("crowns.tif", &model.crowns.labels),
    ] {
        write_grid(&out_dir.join(name), grid, model.crs)?;
    }
    write_rows(&out_dir.join("treetops.csv"), &model.tops)?;
    write_rows(&out_dir.join("crowns.csv"), &model.crowns.metrics)?;
    info!("wrote outputs to {out_dir:?}");
    Ok(())
}

fn write_grid(path: &Path, grid: &Grid, crs: Crs) -> Result<()> {
    let raster = grid.to_raster(crs)?;
    geotiff::write(path, &raster, 0)?;
    Ok(())
}

fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

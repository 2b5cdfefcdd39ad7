use crate::{
    options::{Format, JoinKind, RasterArg, Sample},
    progress,
};
use anyhow::Result;
use georaster::{Crs, TileMode};
use indicatif::ProgressBar;
use log::{debug, info};
use rayon::prelude::*;
use sampler::{
    input::{self, CsvColumns},
    output, Join, RasterPointSampler, Samples, Trim,
};
use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::PathBuf,
};

/// Everything `geosample sample` needs, detached from the command
/// line.
#[derive(Debug, Clone)]
pub struct SampleConfig {
    pub points: PathBuf,
    pub columns: CsvColumns,
    pub points_crs: Option<Crs>,
    pub rasters: Vec<RasterArg>,
    pub mode: TileMode,
    pub join: JoinKind,
    pub trims: Vec<Trim>,
    pub format: Format,
    pub out: Option<PathBuf>,
}

impl From<Sample> for SampleConfig {
    fn from(args: Sample) -> Self {
        Self {
            points: args.points,
            columns: CsvColumns {
                x: args.x_col,
                y: args.y_col,
            },
            points_crs: args.points_crs,
            rasters: args.rasters,
            mode: args.mode.into(),
            join: args.join,
            trims: args.trims,
            format: args.format,
            out: args.out,
        }
    }
}

pub fn run(config: &SampleConfig) -> Result<()> {
    let points = input::read_points(&config.points, &config.columns, config.points_crs)?;
    info!("read {} points from {:?}", points.len(), config.points);

    let pb = progress::bar("Sample".to_owned(), config.rasters.len() as u64)?;
    let samples = config
        .rasters
        .par_iter()
        .map(|raster| sample_one(raster, config.mode, &points, &pb))
        .collect::<Result<Vec<Samples<'_, _>>>>()?;
    pb.finish_and_clear();

    let mut join = Join::new(&points);
    for (raster, samples) in config.rasters.iter().zip(&samples) {
        join.add(&raster.name, samples)?;
    }
    let mut table = match config.join {
        JoinKind::Inner => join.inner(),
        JoinKind::Left => join.left(),
    };
    for trim in &config.trims {
        let before = table.len();
        table = trim.apply(table)?;
        info!("{trim}: kept {} of {before} rows", table.len());
    }

    let wtr: Box<dyn Write> = match &config.out {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };
    match config.format {
        Format::Csv => output::write_csv(&table, wtr)?,
        Format::Json => output::write_json(&table, wtr)?,
    }
    Ok(())
}

fn sample_one<'a, A: Sync>(
    raster: &RasterArg,
    mode: TileMode,
    points: &'a sampler::PointSet<A>,
    pb: &ProgressBar,
) -> Result<Samples<'a, A>> {
    let samples = RasterPointSampler::new(&raster.path)
        .mode(mode)
        .sample(points)?;
    debug!(
        "{}: {} of {} points inside",
        raster.name,
        samples.results.len(),
        points.len()
    );
    pb.inc(1);
    Ok(samples)
}

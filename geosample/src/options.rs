use anyhow::{anyhow, Error as AnyError};
use clap::{Args, Parser, Subcommand, ValueEnum};
use georaster::{Crs, TileMode};
use sampler::Trim;
use std::{path::PathBuf, str::FromStr};

/// Sample rasters at point locations, or delineate tree crowns from
/// drone point clouds.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Sample one or more rasters at every point and write the joined
    /// table.
    Sample(Sample),

    /// Build elevation models from a point cloud and segment tree
    /// crowns.
    Crowns(Crowns),
}

#[derive(Debug, Clone, Args)]
pub struct Sample {
    /// Points to sample, as GeoJSON or CSV.
    #[arg(short, long)]
    pub points: PathBuf,

    /// CSV column holding x (longitude or easting).
    #[arg(long, default_value = "lon")]
    pub x_col: String,

    /// CSV column holding y (latitude or northing).
    #[arg(long, default_value = "lat")]
    pub y_col: String,

    /// CRS of the points, e.g. "EPSG:32611". Overrides the file.
    #[arg(long)]
    pub points_crs: Option<Crs>,

    /// Raster to sample, as "path" or "name=path". Repeatable.
    #[arg(short, long = "raster", required = true)]
    pub rasters: Vec<RasterArg>,

    #[arg(short, long, value_enum, default_value_t = Mode::InMem)]
    pub mode: Mode,

    #[arg(short, long, value_enum, default_value_t = JoinKind::Inner)]
    pub join: JoinKind,

    /// Drop rows outside "column:lower:upper" quantiles or
    /// "column:iqr:k". The column is a sampled band or a numeric point
    /// attribute. Repeatable; applied in order.
    #[arg(short, long = "trim")]
    pub trims: Vec<Trim>,

    #[arg(short, long, value_enum, default_value_t = Format::Csv)]
    pub format: Format,

    /// Output file. Defaults to stdout.
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
pub struct Crowns {
    /// Point cloud CSV with x, y and z columns.
    #[arg(short, long)]
    pub cloud: PathBuf,

    /// Output directory.
    #[arg(short, long)]
    pub out_dir: PathBuf,

    /// Raster cell size, in map units.
    #[arg(short, long, default_value_t = 0.5)]
    pub resolution: f64,

    /// CRS of the point cloud, written to output rasters.
    #[arg(long, default_value = "unknown")]
    pub crs: Crs,

    /// Ground classifier cell size, in map units.
    #[arg(long, default_value_t = 10.0)]
    pub ground_cell: f64,

    /// Height above the cell minimum still counted as ground.
    #[arg(long, default_value_t = 0.5)]
    pub ground_tolerance: f64,

    /// Search window radius per unit of canopy height.
    #[arg(long, default_value_t = 0.06)]
    pub ws_slope: f64,

    /// Search window radius at zero height.
    #[arg(long, default_value_t = 0.5)]
    pub ws_intercept: f64,

    /// Minimum canopy height of a tree top.
    #[arg(long, default_value_t = 2.0)]
    pub min_height: f64,

    /// Minimum canopy height included in a crown.
    #[arg(long, default_value_t = 1.0)]
    pub crown_min_height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Load raster samples into memory.
    #[value(name = "inmem")]
    InMem,
    /// Memory map HGT tiles.
    #[value(name = "memmap")]
    MemMap,
}

impl From<Mode> for TileMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::InMem => TileMode::InMem,
            Mode::MemMap => TileMode::MemMap,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum JoinKind {
    /// Keep only points covered by every raster.
    Inner,
    /// Keep every point.
    Left,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Csv,
    Json,
}

/// A raster path with the name used to prefix its columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterArg {
    pub name: String,
    pub path: PathBuf,
}

impl FromStr for RasterArg {
    type Err = AnyError;

    fn from_str(s: &str) -> Result<Self, AnyError> {
        let (name, path) = match s.split_once('=') {
            Some((name, path)) => (name.to_owned(), PathBuf::from(path)),
            None => {
                let path = PathBuf::from(s);
                let name = path
                    .file_stem()
                    .and_then(std::ffi::OsStr::to_str)
                    .ok_or_else(|| anyhow!("can't name raster {s:?}"))?
                    .to_owned();
                (name, path)
            }
        };
        if name.is_empty() || path.as_os_str().is_empty() {
            return Err(anyhow!("not a valid name=path: {s:?}"));
        }
        Ok(Self { name, path })
    }
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command, Format, JoinKind, Mode, RasterArg};
    use clap::Parser;
    use georaster::Crs;
    use std::path::PathBuf;

    #[test]
    fn test_raster_arg() {
        let arg: RasterArg = "lst=/data/ECO2LSTE.tif".parse().unwrap();
        assert_eq!(arg.name, "lst");
        assert_eq!(arg.path, PathBuf::from("/data/ECO2LSTE.tif"));

        let arg: RasterArg = "/data/N44W072.hgt".parse().unwrap();
        assert_eq!(arg.name, "N44W072");

        assert!("=foo.tif".parse::<RasterArg>().is_err());
        assert!("lst=".parse::<RasterArg>().is_err());
    }

    #[test]
    fn test_parse_sample() {
        let cli = Cli::try_parse_from([
            "geosample",
            "sample",
            "--points",
            "shots.csv",
            "--points-crs",
            "EPSG:4326",
            "-r",
            "a.tif",
            "-r",
            "esi=b.tif",
            "--mode",
            "memmap",
            "--join",
            "left",
            "--trim",
            "a_b1:0.05:0.95",
            "--format",
            "json",
        ])
        .unwrap();
        let Command::Sample(sample) = cli.cmd else {
            panic!("expected sample");
        };
        assert_eq!(sample.points_crs, Some(Crs::WGS84));
        assert_eq!(sample.rasters.len(), 2);
        assert_eq!(sample.rasters[1].name, "esi");
        assert_eq!(sample.mode, Mode::MemMap);
        assert_eq!(sample.join, JoinKind::Left);
        assert_eq!(sample.trims.len(), 1);
        assert_eq!(sample.format, Format::Json);
        assert_eq!(sample.out, None);
        assert_eq!(sample.x_col, "lon");
    }

    #[test]
    fn test_parse_crowns() {
        let cli = Cli::try_parse_from([
            "geosample",
            "crowns",
            "--cloud",
            "plot.csv",
            "--out-dir",
            "out",
            "--crs",
            "32610",
        ])
        .unwrap();
        let Command::Crowns(crowns) = cli.cmd else {
            panic!("expected crowns");
        };
        assert_eq!(crowns.crs, Crs::Epsg(32610));
        assert_eq!(crowns.resolution, 0.5);
        assert_eq!(crowns.ws_slope, 0.06);
    }

    #[test]
    fn test_sample_requires_raster() {
        assert!(Cli::try_parse_from(["geosample", "sample", "--points", "p.csv"]).is_err());
    }
}

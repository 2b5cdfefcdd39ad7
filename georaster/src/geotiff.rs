//! GeoTIFF reading and writing.
//!
//! Georeferencing comes from the `ModelTransformation` tag when
//! present, otherwise from `ModelTiepoint` + `ModelPixelScale`. The CRS
//! comes from the GeoKey directory and the no-data value from GDAL's
//! private `GDAL_NODATA` tag.
//!
//! # References
//!
//! 1. [OGC GeoTIFF 1.1](https://docs.ogc.org/is/19-008r4/19-008r4.html)

use crate::{Crs, GeoTransform, Raster, RasterError, C};
use geo::geometry::Coord;
use log::debug;
use num_traits::AsPrimitive;
use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Seek},
    path::Path,
};
use tiff::{
    decoder::{ifd::Value, Decoder, DecodingResult, Limits},
    encoder::{colortype, TiffEncoder},
    tags::Tag,
};

const KEY_MODEL_TYPE: u16 = 1024;
const KEY_RASTER_TYPE: u16 = 1025;
const KEY_GEOGRAPHIC_TYPE: u16 = 2048;
const KEY_PROJECTED_CS_TYPE: u16 = 3072;

const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;
const RASTER_PIXEL_IS_POINT: u16 = 2;
const USER_DEFINED: u16 = 32767;
const PLANAR_CHUNKY: u16 = 1;

/// Returns the raster stored in the GeoTIFF at `path`.
///
/// Chunky (pixel interleaved) multi-sample images are split into one
/// band per sample. Planar multi-sample images are rejected.
pub fn load<P: AsRef<Path>>(path: P) -> Result<Raster, RasterError> {
    let path = path.as_ref();
    debug!("loading {path:?}");
    let file = BufReader::new(File::open(path)?);
    let mut decoder = Decoder::new(file)?.with_limits(Limits::unlimited());

    let (width, height) = decoder.dimensions()?;
    let (rows, cols) = (height as usize, width as usize);
    check_interleaved(&mut decoder)?;
    let keys = GeoKeys::read(&mut decoder)?;
    let transform = read_transform(&mut decoder, keys.raster_type)?;
    let nodata = read_nodata(&mut decoder)?;
    let samples = widen(decoder.read_image()?)?;

    let pixels = rows * cols;
    if pixels == 0 || samples.len() % pixels != 0 {
        return Err(RasterError::Dimensions { rows, cols });
    }
    let band_count = samples.len() / pixels;
    let bands = if band_count == 1 {
        vec![samples]
    } else {
        (0..band_count)
            .map(|band| {
                samples
                    .iter()
                    .skip(band)
                    .step_by(band_count)
                    .copied()
                    .collect()
            })
            .collect()
    };
    debug!(
        "{path:?}: {rows}x{cols}, {band_count} band(s), {}, nodata {nodata:?}",
        keys.crs()
    );

    Raster::from_bands((rows, cols), transform, keys.crs(), nodata, bands)
}

/// Writes band `band` of `raster` as a single-band 32-bit float
/// GeoTIFF.
pub fn write<P: AsRef<Path>>(path: P, raster: &Raster, band: usize) -> Result<(), RasterError> {
    let path = path.as_ref();
    let band_view = raster
        .band(band)
        .ok_or_else(|| RasterError::Header(format!("no band {band}")))?;
    #[allow(clippy::cast_possible_truncation)]
    let data: Vec<f32> = band_view.iter().map(|v| v as f32).collect();
    let (rows, cols) = raster.dimensions();
    let (width, height) = (
        u32::try_from(cols).map_err(|_| RasterError::Dimensions { rows, cols })?,
        u32::try_from(rows).map_err(|_| RasterError::Dimensions { rows, cols })?,
    );

    let mut tiff = TiffEncoder::new(BufWriter::new(File::create(path)?))?;
    let mut image = tiff.new_image::<colortype::Gray32Float>(width, height)?;
    let transform = raster.transform();
    if transform.is_north_up() {
        let Coord { x, y } = transform.origin();
        let (dx, dy) = transform.pixel_size();
        image
            .encoder()
            .write_tag(Tag::ModelPixelScaleTag, &[dx, -dy, 0.0][..])?;
        image
            .encoder()
            .write_tag(Tag::ModelTiepointTag, &[0.0, 0.0, 0.0, x, y, 0.0][..])?;
    } else {
        let [x0, a, b, y0, d, e] = transform.coefficients();
        let matrix = [
            a, b, 0.0, x0, d, e, 0.0, y0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0,
        ];
        image
            .encoder()
            .write_tag(Tag::ModelTransformationTag, &matrix[..])?;
    }
    image
        .encoder()
        .write_tag(Tag::GeoKeyDirectoryTag, &GeoKeys::directory(raster.crs())[..])?;
    if let Some(nodata) = raster.nodata() {
        image
            .encoder()
            .write_tag(Tag::GdalNodata, nodata.to_string().as_str())?;
    }
    image.write_data(&data)?;
    debug!("wrote {path:?}");
    Ok(())
}

/// The subset of GeoKeys needed to identify a CRS and pixel
/// registration.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct GeoKeys {
    model_type: Option<u16>,
    raster_type: Option<u16>,
    geographic_type: Option<u16>,
    projected_cs_type: Option<u16>,
}

impl GeoKeys {
    fn read<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<Self, RasterError> {
        match decoder.find_tag(Tag::GeoKeyDirectoryTag)? {
            None => Ok(Self::default()),
            Some(value) => Self::parse(&value.into_u16_vec()?),
        }
    }

    /// Parses a raw `GeoKeyDirectoryTag`.
    ///
    /// Only keys stored inline (TIFFTagLocation 0) are read; the ones
    /// we care about are all SHORT.
    fn parse(directory: &[u16]) -> Result<Self, RasterError> {
        if directory.len() < 4 {
            return Err(RasterError::Header("truncated GeoKey directory".into()));
        }
        let (header, entries) = directory.split_at(4);
        let n_keys = usize::from(header[3]);
        if entries.len() < n_keys * 4 {
            return Err(RasterError::Header("truncated GeoKey directory".into()));
        }
        let mut keys = Self::default();
        for entry in entries.chunks_exact(4).take(n_keys) {
            let (key_id, location, value) = (entry[0], entry[1], entry[3]);
            if location != 0 {
                continue;
            }
            match key_id {
                KEY_MODEL_TYPE => keys.model_type = Some(value),
                KEY_RASTER_TYPE => keys.raster_type = Some(value),
                KEY_GEOGRAPHIC_TYPE => keys.geographic_type = Some(value),
                KEY_PROJECTED_CS_TYPE => keys.projected_cs_type = Some(value),
                _ => (),
            }
        }
        Ok(keys)
    }

    fn crs(&self) -> Crs {
        let known = |code: &u16| *code != 0 && *code != USER_DEFINED;
        let projected = self.projected_cs_type.filter(known);
        let geographic = self.geographic_type.filter(known);
        let code = match self.model_type {
            Some(MODEL_TYPE_GEOGRAPHIC) => geographic.or(projected),
            _ => projected.or(geographic),
        };
        code.map_or(Crs::Unknown, Crs::Epsg)
    }

    /// Returns a GeoKey directory declaring `crs`.
    fn directory(crs: Crs) -> Vec<u16> {
        let mut entries = vec![[KEY_RASTER_TYPE, 0, 1, RASTER_PIXEL_IS_AREA]];
        match crs.epsg() {
            // Geographic EPSG codes live in 4000..5000.
            Some(code) if (4000..5000).contains(&code) => {
                entries.insert(0, [KEY_MODEL_TYPE, 0, 1, MODEL_TYPE_GEOGRAPHIC]);
                entries.push([KEY_GEOGRAPHIC_TYPE, 0, 1, code]);
            }
            Some(code) => {
                entries.insert(0, [KEY_MODEL_TYPE, 0, 1, MODEL_TYPE_PROJECTED]);
                entries.push([KEY_PROJECTED_CS_TYPE, 0, 1, code]);
            }
            None => (),
        }
        #[allow(clippy::cast_possible_truncation)]
        let mut directory = vec![1, 1, 0, entries.len() as u16];
        directory.extend(entries.into_iter().flatten());
        directory
    }
}

fn read_transform<R: Read + Seek>(
    decoder: &mut Decoder<R>,
    raster_type: Option<u16>,
) -> Result<GeoTransform, RasterError> {
    let transform = if let Some(matrix) = decoder.find_tag(Tag::ModelTransformationTag)? {
        let m = matrix.into_f64_vec()?;
        if m.len() < 16 {
            return Err(RasterError::Header("short ModelTransformation".into()));
        }
        GeoTransform::new([m[3], m[0], m[1], m[7], m[4], m[5]])
    } else {
        let scale = decoder
            .find_tag(Tag::ModelPixelScaleTag)?
            .ok_or_else(|| RasterError::Header("missing ModelPixelScale".into()))?
            .into_f64_vec()?;
        let tie = decoder
            .find_tag(Tag::ModelTiepointTag)?
            .ok_or_else(|| RasterError::Header("missing ModelTiepoint".into()))?
            .into_f64_vec()?;
        if scale.len() < 2 || tie.len() < 6 {
            return Err(RasterError::Header("short tiepoint or pixel scale".into()));
        }
        let (sx, sy) = (scale[0], scale[1]);
        let (i, j, x, y) = (tie[0], tie[1], tie[3], tie[4]);
        GeoTransform::from_origin(x - i * sx, y + j * sy, sx, -sy)
    };

    // GDAL convention: a PixelIsPoint tiepoint names the pixel
    // center, so move the origin out to the corner.
    if raster_type == Some(RASTER_PIXEL_IS_POINT) {
        let c = transform.apply(-0.5, -0.5);
        let [_, a, b, _, d, e] = transform.coefficients();
        return Ok(GeoTransform::new([c.x, a, b, c.y, d, e]));
    }
    Ok(transform)
}

/// The decoder only returns the first plane of a planar image.
fn check_interleaved<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<(), RasterError> {
    let mut read = |tag: Tag| -> Result<Option<u16>, RasterError> {
        Ok(decoder.find_tag(tag)?.map(Value::into_u16).transpose()?)
    };
    let samples = read(Tag::SamplesPerPixel)?.unwrap_or(1);
    let planar = read(Tag::PlanarConfiguration)?.unwrap_or(PLANAR_CHUNKY);
    if samples > 1 && planar != PLANAR_CHUNKY {
        return Err(RasterError::Header(format!(
            "planar configuration {planar} with {samples} samples per pixel is not supported"
        )));
    }
    Ok(())
}

fn read_nodata<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<Option<C>, RasterError> {
    let Some(value) = decoder.find_tag(Tag::GdalNodata)? else {
        return Ok(None);
    };
    let text = value.into_string()?;
    let text = text.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    text.parse::<C>()
        .map(Some)
        .map_err(|_| RasterError::Header(format!("invalid GDAL_NODATA '{text}'")))
}

fn widen(decoded: DecodingResult) -> Result<Vec<C>, RasterError> {
    fn cast<T: AsPrimitive<C>>(samples: Vec<T>) -> Vec<C> {
        samples.into_iter().map(AsPrimitive::as_).collect()
    }
    #[allow(unreachable_patterns)]
    match decoded {
        DecodingResult::U8(v) => Ok(cast(v)),
        DecodingResult::U16(v) => Ok(cast(v)),
        DecodingResult::U32(v) => Ok(cast(v)),
        DecodingResult::U64(v) => Ok(cast(v)),
        DecodingResult::I8(v) => Ok(cast(v)),
        DecodingResult::I16(v) => Ok(cast(v)),
        DecodingResult::I32(v) => Ok(cast(v)),
        DecodingResult::I64(v) => Ok(cast(v)),
        DecodingResult::F32(v) => Ok(cast(v)),
        DecodingResult::F64(v) => Ok(v),
        _ => Err(RasterError::Header("unsupported sample format".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::{load, write, GeoKeys, RASTER_PIXEL_IS_POINT};
    use crate::{Crs, GeoTransform, Raster, RasterError};
    use geo::geometry::Coord;
    use std::{fs::File, io::BufWriter};
    use tiff::{
        encoder::{colortype, TiffEncoder},
        tags::Tag,
    };

    #[test]
    fn test_geokey_directory_roundtrip() {
        let utm = GeoKeys::parse(&GeoKeys::directory(Crs::Epsg(32611))).unwrap();
        assert_eq!(utm.crs(), Crs::Epsg(32611));
        let wgs84 = GeoKeys::parse(&GeoKeys::directory(Crs::WGS84)).unwrap();
        assert_eq!(wgs84.crs(), Crs::WGS84);
        let unknown = GeoKeys::parse(&GeoKeys::directory(Crs::Unknown)).unwrap();
        assert_eq!(unknown.crs(), Crs::Unknown);
    }

    #[test]
    fn test_geokey_prefers_projected() {
        let directory = [
            1, 1, 0, 3, //
            1024, 0, 1, 1, //
            2048, 0, 1, 4269, //
            3072, 0, 1, 26911,
        ];
        assert_eq!(GeoKeys::parse(&directory).unwrap().crs(), Crs::Epsg(26911));
        let user_defined = [1, 1, 0, 1, 3072, 0, 1, 32767];
        assert_eq!(GeoKeys::parse(&user_defined).unwrap().crs(), Crs::Unknown);
        assert!(matches!(
            GeoKeys::parse(&[1, 1, 0, 2, 1024, 0, 1, 1]),
            Err(RasterError::Header(_))
        ));
    }

    #[test]
    fn test_write_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chm.tif");
        let raster = Raster::from_bands(
            (3, 2),
            GeoTransform::from_origin(500_000.0, 4_100_000.0, 0.5, -0.5),
            Crs::Epsg(32611),
            Some(-9999.0),
            vec![vec![1.5, 2.5, -9999.0, 4.0, 5.0, 6.25]],
        )
        .unwrap();
        write(&path, &raster, 0).unwrap();

        let loaded = load(&path).unwrap();
        assert_eq!(loaded.dimensions(), (3, 2));
        assert_eq!(loaded.band_count(), 1);
        assert_eq!(loaded.crs(), Crs::Epsg(32611));
        assert_eq!(loaded.nodata(), Some(-9999.0));
        assert_eq!(loaded.transform(), raster.transform());
        assert_eq!(loaded.values_at(1, 0), vec![-9999.0]);
        assert_eq!(
            loaded.sample(Coord {
                x: 500_000.75,
                y: 4_099_998.75
            }),
            Some(vec![6.25])
        );
    }

    #[test]
    fn test_load_planar_multiband() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("planar.tif");
        {
            let mut tiff = TiffEncoder::new(BufWriter::new(File::create(&path).unwrap())).unwrap();
            let mut ifd = tiff.new_directory().unwrap();
            // Two 2x2 bands, one strip each.
            let first = ifd.write_data(&[1_u8, 2, 3, 4][..]).unwrap();
            let second = ifd.write_data(&[5_u8, 6, 7, 8][..]).unwrap();
            let offsets = [first, second].map(|o| u32::try_from(o).unwrap());
            ifd.write_tag(Tag::ImageWidth, 2_u32).unwrap();
            ifd.write_tag(Tag::ImageLength, 2_u32).unwrap();
            ifd.write_tag(Tag::BitsPerSample, &[8_u16, 8][..]).unwrap();
            ifd.write_tag(Tag::Compression, 1_u16).unwrap();
            ifd.write_tag(Tag::PhotometricInterpretation, 1_u16).unwrap();
            ifd.write_tag(Tag::SamplesPerPixel, 2_u16).unwrap();
            ifd.write_tag(Tag::PlanarConfiguration, 2_u16).unwrap();
            ifd.write_tag(Tag::RowsPerStrip, 2_u32).unwrap();
            ifd.write_tag(Tag::StripOffsets, &offsets[..]).unwrap();
            ifd.write_tag(Tag::StripByteCounts, &[4_u32, 4][..]).unwrap();
            ifd.write_tag(Tag::ModelPixelScaleTag, &[1.0, 1.0, 0.0][..])
                .unwrap();
            ifd.write_tag(Tag::ModelTiepointTag, &[0.0, 0.0, 0.0, 0.0, 2.0, 0.0][..])
                .unwrap();
            ifd.finish().unwrap();
        }

        assert!(matches!(
            load(&path),
            Err(RasterError::Header(msg)) if msg.contains("planar")
        ));
    }

    #[test]
    fn test_load_multiband_pixel_is_point() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rgb.tif");
        {
            let mut tiff = TiffEncoder::new(BufWriter::new(File::create(&path).unwrap())).unwrap();
            let mut image = tiff.new_image::<colortype::RGB8>(2, 2).unwrap();
            image
                .encoder()
                .write_tag(Tag::ModelPixelScaleTag, &[10.0, 10.0, 0.0][..])
                .unwrap();
            image
                .encoder()
                .write_tag(Tag::ModelTiepointTag, &[0.0, 0.0, 0.0, 105.0, 195.0, 0.0][..])
                .unwrap();
            let directory: Vec<u16> =
                vec![1, 1, 0, 2, 1025, 0, 1, RASTER_PIXEL_IS_POINT, 2048, 0, 1, 4326];
            image
                .encoder()
                .write_tag(Tag::GeoKeyDirectoryTag, &directory[..])
                .unwrap();
            image
                .write_data(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12])
                .unwrap();
        }

        let raster = load(&path).unwrap();
        assert_eq!(raster.band_count(), 3);
        assert_eq!(raster.crs(), Crs::WGS84);
        assert_eq!(raster.nodata(), None);
        assert_eq!(
            raster.transform(),
            &GeoTransform::from_origin(100.0, 200.0, 10.0, -10.0)
        );
        assert_eq!(raster.values_at(0, 0), vec![1.0, 2.0, 3.0]);
        assert_eq!(raster.values_at(1, 1), vec![10.0, 11.0, 12.0]);
        assert_eq!(
            raster.sample(Coord { x: 115.0, y: 185.0 }),
            Some(vec![10.0, 11.0, 12.0])
        );
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load(dir.path().join("nope.tif")),
            Err(RasterError::Io(_))
        ));
    }

    #[test]
    fn test_not_a_tiff() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.tif");
        std::fs::write(&path, b"definitely not a tiff").unwrap();
        assert!(load(&path).is_err());
    }
}

//! Point readers.
//!
//! Both readers produce a [PointSet] whose attributes are a JSON
//! object, so GeoJSON properties and CSV columns end up in the same
//! shape.

use crate::{PointSet, SamplerError};
use geo::geometry::Coord;
use geojson::{Feature, GeoJson, JsonObject, JsonValue};
use georaster::Crs;
use log::debug;
use std::{fs::File, io::Read, path::Path};

/// Attributes carried by points read from files.
pub type Attributes = JsonObject;

/// Names of the coordinate columns in a CSV point file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvColumns {
    pub x: String,
    pub y: String,
}

impl Default for CsvColumns {
    fn default() -> Self {
        Self {
            x: "lon".into(),
            y: "lat".into(),
        }
    }
}

/// Reads points from `path`, choosing a reader by extension.
///
/// `crs` overrides any CRS declared in the file, and is the only
/// source of CRS for CSV files.
pub fn read_points<P: AsRef<Path>>(
    path: P,
    columns: &CsvColumns,
    crs: Option<Crs>,
) -> Result<PointSet<Attributes>, SamplerError> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(std::ffi::OsStr::to_str)
        .map(str::to_ascii_lowercase);
    let file = File::open(path)?;
    let points = match ext.as_deref() {
        Some("geojson" | "json") => read_geojson(file, crs)?,
        Some("csv") => read_csv(file, columns, crs.unwrap_or_default())?,
        _ => {
            return Err(SamplerError::Points(format!(
                "unsupported point file {}",
                path.display()
            )))
        }
    };
    debug!("read {} points ({}) from {path:?}", points.len(), points.crs());
    Ok(points)
}

/// Reads `Point` features from a GeoJSON `FeatureCollection` or
/// single `Feature`.
///
/// Feature properties become point attributes. The CRS is taken from
/// `crs` if given, else from a legacy (2008 spec) `crs` member, else
/// WGS84 per RFC 7946.
pub fn read_geojson<R: Read>(rdr: R, crs: Option<Crs>) -> Result<PointSet<Attributes>, SamplerError> {
    let (features, declared) = match GeoJson::from_reader(rdr)? {
        GeoJson::FeatureCollection(fc) => {
            let declared = fc.foreign_members.as_ref().and_then(legacy_crs).transpose()?;
            (fc.features, declared)
        }
        GeoJson::Feature(feature) => (vec![feature], None),
        GeoJson::Geometry(_) => {
            return Err(SamplerError::Points(
                "expected a Feature or FeatureCollection".into(),
            ))
        }
    };

    let crs = crs.or(declared).unwrap_or(Crs::WGS84);
    let mut points = PointSet::with_capacity(crs, features.len());
    for (idx, feature) in features.into_iter().enumerate() {
        let (coord, attributes) = point_feature(idx, feature)?;
        points.push(coord, attributes);
    }
    Ok(points)
}

fn point_feature(idx: usize, feature: Feature) -> Result<(Coord<f64>, Attributes), SamplerError> {
    let mk_err = |what: &str| SamplerError::Points(format!("feature {idx}: {what}"));
    let geometry = feature.geometry.ok_or_else(|| mk_err("no geometry"))?;
    let coord = match geometry.value {
        geojson::Value::Point(position) if position.len() >= 2 => Coord {
            x: position[0],
            y: position[1],
        },
        geojson::Value::Point(_) => return Err(mk_err("short position")),
        _ => return Err(mk_err("not a Point")),
    };
    Ok((coord, feature.properties.unwrap_or_default()))
}

/// Parses `{"crs": {"type": "name", "properties": {"name": ...}}}`.
fn legacy_crs(members: &JsonObject) -> Option<Result<Crs, SamplerError>> {
    let name = members
        .get("crs")?
        .get("properties")?
        .get("name")?
        .as_str()?;
    if name.ends_with("CRS84") {
        return Some(Ok(Crs::WGS84));
    }
    Some(
        name.parse()
            .map_err(|e| SamplerError::Points(format!("{e}"))),
    )
}

/// Reads points from CSV with a header row.
///
/// Columns other than `columns.x` and `columns.y` become attributes;
/// numeric cells are stored as JSON numbers and everything else as
/// strings.
pub fn read_csv<R: Read>(
    rdr: R,
    columns: &CsvColumns,
    crs: Crs,
) -> Result<PointSet<Attributes>, SamplerError> {
    let mut rdr = csv::Reader::from_reader(rdr);
    let headers = rdr.headers()?.clone();
    let position = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| SamplerError::Column(name.to_owned()))
    };
    let (x_idx, y_idx) = (position(&columns.x)?, position(&columns.y)?);

    let mut points = PointSet::new(crs);
    for (line, record) in rdr.records().enumerate() {
        let record = record?;
        let parse = |idx: usize| {
            record
                .get(idx)
                .and_then(|cell| cell.trim().parse::<f64>().ok())
                .filter(|v| v.is_finite())
                .ok_or_else(|| SamplerError::Points(format!("record {line}: bad coordinate")))
        };
        let coord = Coord {
            x: parse(x_idx)?,
            y: parse(y_idx)?,
        };
        let attributes = headers
            .iter()
            .zip(record.iter())
            .enumerate()
            .filter(|(idx, _)| *idx != x_idx && *idx != y_idx)
            .map(|(_, (name, cell))| (name.to_owned(), csv_value(cell)))
            .collect();
        points.push(coord, attributes);
    }
    Ok(points)
}

fn csv_value(cell: &str) -> JsonValue {
    cell.trim()
        .parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map_or_else(|| JsonValue::String(cell.to_owned()), JsonValue::Number)
}

#[cfg(test)]
mod tests {
    use super::{read_csv, read_geojson, read_points, CsvColumns};
    use crate::SamplerError;
    use geo::geometry::Coord;
    use georaster::Crs;
    use serde_json::json;

    const GEDI: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "geometry": {"type": "Point", "coordinates": [-119.5, 37.25]},
                "properties": {"agbd": 143.2, "shot_number": "1"}
            },
            {
                "type": "Feature",
                "geometry": {"type": "Point", "coordinates": [-119.25, 37.5]},
                "properties": null
            }
        ]
    }"#;

    #[test]
    fn test_geojson() {
        let points = read_geojson(GEDI.as_bytes(), None).unwrap();
        assert_eq!(points.crs(), Crs::WGS84);
        assert_eq!(points.len(), 2);
        let first = points.iter().next().unwrap();
        assert_eq!(first.coord(), Coord { x: -119.5, y: 37.25 });
        assert_eq!(first.attributes().get("agbd"), Some(&json!(143.2)));
        assert!(points.iter().nth(1).unwrap().attributes().is_empty());
    }

    #[test]
    fn test_geojson_legacy_crs() {
        let doc = r#"{
            "type": "FeatureCollection",
            "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::32611"}},
            "features": []
        }"#;
        assert_eq!(
            read_geojson(doc.as_bytes(), None).unwrap().crs(),
            Crs::Epsg(32611)
        );
        assert_eq!(
            read_geojson(doc.as_bytes(), Some(Crs::Epsg(3310)))
                .unwrap()
                .crs(),
            Crs::Epsg(3310)
        );
    }

    #[test]
    fn test_geojson_rejects_non_points() {
        let doc = r#"{
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "geometry": {"type": "LineString", "coordinates": [[0, 0], [1, 1]]},
                "properties": {}
            }]
        }"#;
        assert!(matches!(
            read_geojson(doc.as_bytes(), None),
            Err(SamplerError::Points(msg)) if msg.contains("not a Point")
        ));
    }

    #[test]
    fn test_csv() {
        let data = "shot,lon,lat,agbd\nA,-119.5,37.25,143.2\nB,-119.25,37.5,\n";
        let points = read_csv(data.as_bytes(), &CsvColumns::default(), Crs::WGS84).unwrap();
        assert_eq!(points.len(), 2);
        let first = points.iter().next().unwrap();
        assert_eq!(first.coord(), Coord { x: -119.5, y: 37.25 });
        assert_eq!(first.attributes().get("shot"), Some(&json!("A")));
        assert_eq!(first.attributes().get("agbd"), Some(&json!(143.2)));
        assert!(first.attributes().get("lon").is_none());
        let second = points.iter().nth(1).unwrap();
        assert_eq!(second.attributes().get("agbd"), Some(&json!("")));
    }

    #[test]
    fn test_csv_missing_column() {
        let data = "x,y\n1,2\n";
        assert!(matches!(
            read_csv(data.as_bytes(), &CsvColumns::default(), Crs::Unknown),
            Err(SamplerError::Column(name)) if name == "lon"
        ));
        let columns = CsvColumns {
            x: "x".into(),
            y: "y".into(),
        };
        let points = read_csv(data.as_bytes(), &columns, Crs::Unknown).unwrap();
        assert_eq!(points.iter().next().unwrap().coord(), Coord { x: 1.0, y: 2.0 });
    }

    #[test]
    fn test_csv_bad_coordinate() {
        let data = "lon,lat\nabc,2\n";
        assert!(matches!(
            read_csv(data.as_bytes(), &CsvColumns::default(), Crs::Unknown),
            Err(SamplerError::Points(_))
        ));
        for data in ["lon,lat\nNaN,NaN\n", "lon,lat\n1,inf\n", "lon,lat\n-inf,2\n"] {
            assert!(matches!(
                read_csv(data.as_bytes(), &CsvColumns::default(), Crs::Unknown),
                Err(SamplerError::Points(_))
            ));
        }
    }

    #[test]
    fn test_read_points_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let geojson = dir.path().join("gedi.geojson");
        std::fs::write(&geojson, GEDI).unwrap();
        assert_eq!(
            read_points(&geojson, &CsvColumns::default(), None)
                .unwrap()
                .len(),
            2
        );
        let shp = dir.path().join("gedi.shp");
        std::fs::write(&shp, b"").unwrap();
        assert!(matches!(
            read_points(&shp, &CsvColumns::default(), None),
            Err(SamplerError::Points(_))
        ));
    }
}

//! Outlier trimming on a joined column or point attribute.

use crate::{Attributes, Column, JoinedRow, SamplerError, Table};
use georaster::C;
use std::{fmt, str::FromStr};

/// Point attributes that can be read as numbers by name.
pub trait NumericAttributes {
    fn numeric(&self, name: &str) -> Option<C>;
}

impl NumericAttributes for Attributes {
    fn numeric(&self, name: &str) -> Option<C> {
        self.get(name).and_then(serde_json::Value::as_f64)
    }
}

impl NumericAttributes for () {
    fn numeric(&self, _name: &str) -> Option<C> {
        None
    }
}

/// Which values of a column to keep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bound {
    /// Keep values between the `lower` and `upper` quantiles
    /// (inclusive), each in `[0, 1]`.
    Quantile { lower: C, upper: C },

    /// Keep values within `k` interquartile ranges of the quartiles.
    Iqr(C),
}

/// Drops rows whose value in `column` is an outlier.
///
/// `column` names a sampled column or, failing that, a numeric point
/// attribute. Rows with no value, a NaN, or the column's no-data
/// sentinel are always dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct Trim {
    pub column: String,
    pub bound: Bound,
}

impl Trim {
    pub fn quantile(column: impl Into<String>, lower: C, upper: C) -> Self {
        Self {
            column: column.into(),
            bound: Bound::Quantile { lower, upper },
        }
    }

    pub fn iqr(column: impl Into<String>, k: C) -> Self {
        Self {
            column: column.into(),
            bound: Bound::Iqr(k),
        }
    }

    pub fn apply<'a, A>(&self, mut table: Table<'a, A>) -> Result<Table<'a, A>, SamplerError>
    where
        A: NumericAttributes,
    {
        if table.is_empty() {
            return Ok(table);
        }
        let source = self.source(&table)?;
        let value_of = |row: &JoinedRow<'a, A>| match &source {
            Source::Column(idx, column) => row.values[*idx].filter(|v| column.is_valid(*v)),
            Source::Attribute => row
                .point
                .attributes()
                .numeric(&self.column)
                .filter(|v| v.is_finite()),
        };

        let mut sorted: Vec<C> = table.rows.iter().filter_map(value_of).collect();
        sorted.sort_by(C::total_cmp);

        let Some((lo, hi)) = self.limits(&sorted) else {
            table.rows.clear();
            return Ok(table);
        };
        table
            .rows
            .retain(|row| value_of(row).map_or(false, |v| lo <= v && v <= hi));
        Ok(table)
    }

    /// Sampled columns shadow attributes of the same name.
    fn source<A: NumericAttributes>(&self, table: &Table<'_, A>) -> Result<Source, SamplerError> {
        match table.column_index(&self.column) {
            Ok(idx) => Ok(Source::Column(idx, table.columns[idx].clone())),
            Err(err) => table
                .rows
                .iter()
                .any(|row| row.point.attributes().numeric(&self.column).is_some())
                .then_some(Source::Attribute)
                .ok_or(err),
        }
    }

    fn limits(&self, sorted: &[C]) -> Option<(C, C)> {
        match self.bound {
            Bound::Quantile { lower, upper } => {
                Some((quantile(sorted, lower)?, quantile(sorted, upper)?))
            }
            Bound::Iqr(k) => {
                let q1 = quantile(sorted, 0.25)?;
                let q3 = quantile(sorted, 0.75)?;
                let iqr = q3 - q1;
                Some((q1 - k * iqr, q3 + k * iqr))
            }
        }
    }
}

enum Source {
    Column(usize, Column),
    Attribute,
}

/// Returns quantile `p` of `sorted`, interpolating linearly between
/// the closest ranks.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn quantile(sorted: &[C], p: C) -> Option<C> {
    if sorted.is_empty() {
        return None;
    }
    let pos = p.clamp(0.0, 1.0) * (sorted.len() - 1) as C;
    let below = pos.floor() as usize;
    let above = pos.ceil() as usize;
    let frac = pos - below as C;
    Some(sorted[below] + (sorted[above] - sorted[below]) * frac)
}

impl fmt::Display for Trim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bound {
            Bound::Quantile { lower, upper } => write!(f, "{}:{lower}:{upper}", self.column),
            Bound::Iqr(k) => write!(f, "{}:iqr:{k}", self.column),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("expected COLUMN:LOWER:UPPER or COLUMN:iqr:K, got '{0}'")]
pub struct ParseTrimError(String);

impl FromStr for Trim {
    type Err = ParseTrimError;

    /// Parses `agbd:0.05:0.95` (quantiles) or `agbd:iqr:1.5`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mk_err = || ParseTrimError(s.to_owned());
        let mut parts = s.rsplitn(3, ':');
        let (Some(last), Some(middle), Some(column)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(mk_err());
        };
        if column.is_empty() {
            return Err(mk_err());
        }
        let last = last.parse::<C>().map_err(|_| mk_err())?;
        if middle.eq_ignore_ascii_case("iqr") {
            return (last >= 0.0)
                .then(|| Trim::iqr(column, last))
                .ok_or_else(mk_err);
        }
        let lower = middle.parse::<C>().map_err(|_| mk_err())?;
        let valid = (0.0..=1.0).contains(&lower) && (0.0..=1.0).contains(&last) && lower <= last;
        valid
            .then(|| Trim::quantile(column, lower, last))
            .ok_or_else(mk_err)
    }
}

#[cfg(test)]
mod tests {
    use super::{quantile, Bound, NumericAttributes, Trim};
    use crate::{Attributes, Column, JoinedRow, PointSet, SamplerError, Table};
    use approx::assert_relative_eq;
    use georaster::{geo::geometry::Coord, Crs};
    use serde_json::json;

    /// Test points expose their index as attribute `rank`.
    impl NumericAttributes for usize {
        #[allow(clippy::cast_precision_loss)]
        fn numeric(&self, name: &str) -> Option<f64> {
            (name == "rank").then_some(*self as f64)
        }
    }

    fn table<'a>(points: &'a PointSet<usize>, agbd: &[Option<f64>]) -> Table<'a, usize> {
        Table {
            columns: vec![Column {
                name: "agbd".into(),
                nodata: Some(-9999.0),
            }],
            rows: points
                .iter()
                .zip(agbd)
                .map(|(point, v)| JoinedRow {
                    point,
                    values: vec![*v],
                })
                .collect(),
        }
    }

    fn points(n: usize) -> PointSet<usize> {
        let mut points = PointSet::new(Crs::Unknown);
        for i in 0..n {
            points.push(Coord { x: 0.0, y: 0.0 }, i);
        }
        points
    }

    #[test]
    fn test_quantile() {
        let sorted = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_relative_eq!(quantile(&sorted, 0.0).unwrap(), 1.0);
        assert_relative_eq!(quantile(&sorted, 0.5).unwrap(), 3.0);
        assert_relative_eq!(quantile(&sorted, 0.1).unwrap(), 1.4);
        assert_relative_eq!(quantile(&sorted, 1.0).unwrap(), 5.0);
        assert_eq!(quantile(&[], 0.5), None);
    }

    #[test]
    fn test_quantile_trim() {
        let points = points(6);
        let values = [
            Some(10.0),
            Some(-9999.0),
            Some(20.0),
            None,
            Some(30.0),
            Some(1000.0),
        ];
        let trimmed = Trim::quantile("agbd", 0.0, 0.5)
            .apply(table(&points, &values))
            .unwrap();
        let kept: Vec<usize> = trimmed.rows.iter().map(|r| *r.point.attributes()).collect();
        // Valid values are 10, 20, 30, 1000; the median is 25.
        assert_eq!(kept, [0, 2]);
    }

    #[test]
    fn test_iqr_trim() {
        let points = points(6);
        let values = [
            Some(10.0),
            Some(11.0),
            Some(12.0),
            Some(13.0),
            Some(14.0),
            Some(500.0),
        ];
        let trimmed = Trim::iqr("agbd", 1.5)
            .apply(table(&points, &values))
            .unwrap();
        assert_eq!(trimmed.len(), 5);
        assert!(trimmed.rows.iter().all(|r| r.values[0] != Some(500.0)));
    }

    #[test]
    fn test_no_valid_values() {
        let points = points(2);
        let trimmed = Trim::iqr("agbd", 1.5)
            .apply(table(&points, &[None, Some(-9999.0)]))
            .unwrap();
        assert!(trimmed.is_empty());
    }

    #[test]
    fn test_attribute_trim() {
        let points = points(5);
        let values = [Some(1.0); 5];
        let trimmed = Trim::quantile("rank", 0.25, 0.75)
            .apply(table(&points, &values))
            .unwrap();
        let kept: Vec<usize> = trimmed.rows.iter().map(|r| *r.point.attributes()).collect();
        assert_eq!(kept, [1, 2, 3]);
    }

    #[test]
    fn test_json_attribute_trim() {
        let mut points: PointSet<Attributes> = PointSet::new(Crs::WGS84);
        for agbd in [json!(80.0), json!("n/a"), json!(120.5), json!(4000.0)] {
            let mut attributes = Attributes::new();
            attributes.insert("agbd".into(), agbd);
            points.push(Coord { x: 0.0, y: 0.0 }, attributes);
        }
        let table = Table {
            columns: Vec::new(),
            rows: points
                .iter()
                .map(|point| JoinedRow {
                    point,
                    values: Vec::new(),
                })
                .collect(),
        };
        let trimmed = Trim::quantile("agbd", 0.0, 0.5).apply(table).unwrap();
        let kept: Vec<f64> = trimmed
            .rows
            .iter()
            .filter_map(|r| r.point.attributes().numeric("agbd"))
            .collect();
        // Numeric values are 80, 120.5, 4000; the median is 120.5.
        assert_eq!(kept, [80.0, 120.5]);
    }

    #[test]
    fn test_empty_table() {
        let points = points(0);
        let trimmed = Trim::iqr("wue", 1.5).apply(table(&points, &[])).unwrap();
        assert!(trimmed.is_empty());
    }

    #[test]
    fn test_missing_column() {
        let points = points(1);
        assert!(matches!(
            Trim::iqr("wue", 1.5).apply(table(&points, &[Some(1.0)])),
            Err(SamplerError::Column(name)) if name == "wue"
        ));
    }

    #[test]
    fn test_parse() {
        let trim: Trim = "agbd:0.05:0.95".parse().unwrap();
        assert_eq!(trim.column, "agbd");
        assert_eq!(
            trim.bound,
            Bound::Quantile {
                lower: 0.05,
                upper: 0.95
            }
        );
        let trim: Trim = "et_b1:IQR:3".parse().unwrap();
        assert_eq!(trim, Trim::iqr("et_b1", 3.0));
        // Column names may themselves contain colons.
        let trim: Trim = "a:b:0:1".parse().unwrap();
        assert_eq!(trim.column, "a:b");
        assert_eq!(trim.to_string(), "a:b:0:1");

        assert!("agbd".parse::<Trim>().is_err());
        assert!("agbd:0.9:0.1".parse::<Trim>().is_err());
        assert!("agbd:0:2".parse::<Trim>().is_err());
        assert!("agbd:iqr:-1".parse::<Trim>().is_err());
        assert!(":0:1".parse::<Trim>().is_err());
    }
}

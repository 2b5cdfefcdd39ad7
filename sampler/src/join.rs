//! Typed join of per-raster samples onto their point set.
//!
//! Samples are matched to points by [PointId], never by coordinate
//! equality, so two points at the same location stay distinct.

use crate::{Point, PointId, PointSet, Samples, SamplerError};
use georaster::C;
use std::collections::HashMap;

/// A named value column and the no-data sentinel of the raster it
/// came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub nodata: Option<C>,
}

impl Column {
    /// Returns `true` if `value` is a real measurement.
    pub fn is_valid(&self, value: C) -> bool {
        if value.is_nan() {
            return false;
        }
        match self.nodata {
            Some(nodata) => value != nodata,
            None => true,
        }
    }
}

/// One output row: a point and one cell per column.
///
/// A cell is `None` when the source raster didn't cover the point.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedRow<'a, A> {
    pub point: &'a Point<A>,
    pub values: Vec<Option<C>>,
}

/// The result of a [Join].
#[derive(Debug, Clone, PartialEq)]
pub struct Table<'a, A> {
    pub columns: Vec<Column>,
    pub rows: Vec<JoinedRow<'a, A>>,
}

impl<'a, A> Table<'a, A> {
    pub fn column_index(&self, name: &str) -> Result<usize, SamplerError> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| SamplerError::Column(name.to_owned()))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Accumulates samples from one or more rasters keyed by point id.
pub struct Join<'a, A> {
    points: &'a PointSet<A>,
    index: HashMap<PointId, usize>,
    columns: Vec<Column>,
    /// `cells[point][column]`
    cells: Vec<Vec<Option<C>>>,
    /// Number of sources covering each point.
    hits: Vec<usize>,
    sources: usize,
}

impl<'a, A> Join<'a, A> {
    pub fn new(points: &'a PointSet<A>) -> Self {
        let index = points
            .iter()
            .enumerate()
            .map(|(idx, point)| (point.id(), idx))
            .collect();
        Self {
            points,
            index,
            columns: Vec::new(),
            cells: vec![Vec::new(); points.len()],
            hits: vec![0; points.len()],
            sources: 0,
        }
    }

    /// Adds one column per band of `samples`, named `{source}_b{n}`
    /// with `n` counting from 1.
    pub fn add(&mut self, source: &str, samples: &Samples<'_, A>) -> Result<(), SamplerError> {
        let names = (1..=samples.band_count)
            .map(|n| format!("{source}_b{n}"))
            .collect();
        self.add_named(source, names, samples)
    }

    /// Adds one column per band of `samples`, using `names` for the
    /// column names.
    pub fn add_named(
        &mut self,
        source: &str,
        names: Vec<String>,
        samples: &Samples<'_, A>,
    ) -> Result<(), SamplerError> {
        if names.len() != samples.band_count {
            return Err(SamplerError::BandNames {
                raster: source.to_owned(),
                bands: samples.band_count,
                names: names.len(),
            });
        }
        if let Some(dup) = names
            .iter()
            .find(|name| self.columns.iter().any(|c| &c.name == *name))
        {
            return Err(SamplerError::DuplicateColumn(dup.clone()));
        }

        let width = names.len();
        let mut rows: Vec<Option<&[C]>> = vec![None; self.points.len()];
        for result in &samples.results {
            let id = result.point.id();
            // Ids are only unique within a set, so the point itself must
            // be ours too.
            let idx = self
                .index
                .get(&id)
                .copied()
                .filter(|_| {
                    self.points
                        .get(id)
                        .map_or(false, |point| std::ptr::eq(point, result.point))
                })
                .ok_or(SamplerError::UnknownPoint(id))?;
            rows[idx] = Some(result.values.as_slice());
        }

        for ((cells, hits), row) in self.cells.iter_mut().zip(&mut self.hits).zip(rows) {
            match row {
                Some(values) => {
                    cells.extend(values.iter().copied().map(Some));
                    *hits += 1;
                }
                None => cells.extend(std::iter::repeat(None).take(width)),
            }
        }
        self.columns.extend(names.into_iter().map(|name| Column {
            name,
            nodata: samples.nodata,
        }));
        self.sources += 1;
        Ok(())
    }

    /// Returns rows only for points covered by every source.
    pub fn inner(self) -> Table<'a, A> {
        let sources = self.sources;
        self.table(|hits| hits == sources)
    }

    /// Returns a row for every point.
    pub fn left(self) -> Table<'a, A> {
        self.table(|_| true)
    }

    fn table(self, keep: impl Fn(usize) -> bool) -> Table<'a, A> {
        let rows = self
            .points
            .iter()
            .zip(self.cells)
            .zip(self.hits)
            .filter(|(_, hits)| keep(*hits))
            .map(|((point, values), _)| JoinedRow { point, values })
            .collect();
        Table {
            columns: self.columns,
            rows,
        }
    }
}

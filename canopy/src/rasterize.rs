//! Point cloud to elevation model rasterization.

use crate::{CanopyError, Grid, Point3};
use geo::geometry::Coord;
use georaster::C;
use log::debug;

/// Builds a digital terrain model from ground returns.
///
/// Each cell takes the lowest ground return inside it. Cells without
/// ground returns are then filled with the mean of their valid
/// 8-neighbours, one ring at a time, until nothing changes.
pub fn dtm<'a, I>(template: &Grid, ground: I) -> Result<Grid, CanopyError>
where
    I: IntoIterator<Item = &'a Point3>,
{
    let mut grid = template.blank();
    let mut hits = 0_usize;
    for p in ground {
        if let Some(cell) = grid.cell_of(Coord { x: p.x, y: p.y }) {
            let v = &mut grid[cell];
            *v = if v.is_nan() { p.z } else { v.min(p.z) };
            hits += 1;
        }
    }
    if hits == 0 {
        return Err(CanopyError::NoGround);
    }
    let passes = fill_gaps(&mut grid);
    debug!("dtm: {hits} ground returns, {passes} fill passes");
    Ok(grid)
}

/// Builds a digital surface model: the highest return per cell.
pub fn dsm<'a, I>(template: &Grid, points: I) -> Grid
where
    I: IntoIterator<Item = &'a Point3>,
{
    let mut grid = template.blank();
    for p in points {
        if let Some(cell) = grid.cell_of(Coord { x: p.x, y: p.y }) {
            let v = &mut grid[cell];
            *v = if v.is_nan() { p.z } else { v.max(p.z) };
        }
    }
    grid
}

/// Canopy height model: `dsm - dtm`, clamped at zero.
///
/// Cells missing in either input are missing in the output.
pub fn chm(dsm: &Grid, dtm: &Grid) -> Result<Grid, CanopyError> {
    if !dsm.aligned(dtm) {
        return Err(CanopyError::GridMismatch);
    }
    let mut grid = dsm.blank();
    for row in 0..grid.rows() {
        for col in 0..grid.cols() {
            // NaN propagates through the subtraction; max would eat it.
            let h = dsm[(row, col)] - dtm[(row, col)];
            grid[(row, col)] = if h.is_nan() { h } else { h.max(0.0) };
        }
    }
    Ok(grid)
}

/// Returns the number of passes taken.
#[allow(clippy::cast_possible_wrap)]
fn fill_gaps(grid: &mut Grid) -> usize {
    let mut passes = 0;
    loop {
        let mut updates: Vec<((usize, usize), C)> = Vec::new();
        for row in 0..grid.rows() {
            for col in 0..grid.cols() {
                if !grid[(row, col)].is_nan() {
                    continue;
                }
                let (r, c) = (row as isize, col as isize);
                let (sum, n) = NEIGHBOURS
                    .iter()
                    .filter_map(|(dr, dc)| grid.get(r + dr, c + dc))
                    .fold((0.0, 0_u32), |(sum, n), v| (sum + v, n + 1));
                if n > 0 {
                    updates.push(((row, col), sum / C::from(n)));
                }
            }
        }
        if updates.is_empty() {
            return passes;
        }
        for (cell, v) in updates {
            grid[cell] = v;
        }
        passes += 1;
    }
}

const NEIGHBOURS: [(isize, isize); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

//! Variable window filter tree top detection.

use crate::{CanopyError, Grid};
use georaster::C;
use log::debug;
use serde::Serialize;

/// Search radius as a linear function of canopy height.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowFunction {
    pub slope: C,
    pub intercept: C,
}

impl Default for WindowFunction {
    fn default() -> Self {
        Self {
            slope: 0.06,
            intercept: 0.5,
        }
    }
}

impl WindowFunction {
    /// Returns the search radius, in map units, for a cell of
    /// `height`.
    pub fn radius(&self, height: C) -> C {
        self.slope * height + self.intercept
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TreeTop {
    /// 1-based, in row-major detection order.
    pub id: u32,
    pub x: C,
    pub y: C,
    pub height: C,
    #[serde(skip)]
    pub row: usize,
    #[serde(skip)]
    pub col: usize,
}

/// Finds tree tops in a canopy height model.
///
/// A cell is a tree top when it is at least `min_height` tall and no
/// cell whose center lies within the window radius is taller. Among
/// equally tall cells the first in row-major order wins.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss
)]
pub fn detect(
    chm: &Grid,
    window: &WindowFunction,
    min_height: C,
) -> Result<Vec<TreeTop>, CanopyError> {
    if !(window.slope >= 0.0 && window.intercept >= 0.0) {
        return Err(CanopyError::Parameter(format!("{window:?}")));
    }
    let res = chm.res();
    let mut tops = Vec::new();
    let mut id = 0;

    for row in 0..chm.rows() {
        for col in 0..chm.cols() {
            let (r, c) = (row as isize, col as isize);
            let Some(height) = chm.get(r, c) else {
                continue;
            };
            if height < min_height {
                continue;
            }
            let radius = window.radius(height) / res;
            let reach = radius.floor() as isize;
            let dominated = (-reach..=reach)
                .flat_map(|dr| (-reach..=reach).map(move |dc| (dr, dc)))
                .filter(|&(dr, dc)| (dr, dc) != (0, 0))
                .filter(|&(dr, dc)| ((dr * dr + dc * dc) as C).sqrt() <= radius)
                .any(|(dr, dc)| match chm.get(r + dr, c + dc) {
                    Some(other) if other > height => true,
                    // Equal and earlier in row-major order.
                    Some(other) if other == height => (dr, dc) < (0, 0),
                    _ => false,
                });
            if dominated {
                continue;
            }
            id += 1;
            let center = chm.center(row, col);
            tops.push(TreeTop {
                id,
                x: center.x,
                y: center.y,
                height,
                row,
                col,
            });
        }
    }
    debug!("vwf: {} tree tops above {min_height}", tops.len());
    Ok(tops)
}

//! Crown delineation.

use crate::{vwf::TreeTop, Grid};
use georaster::C;
use serde::Serialize;
use std::{cmp::Ordering, collections::BinaryHeap};

/// Grows tree crowns outward from detected tops.
pub trait WatershedSegmenter {
    fn segment(&self, chm: &Grid, tops: &[TreeTop]) -> Crowns;
}

/// Marker-controlled watershed over the inverted canopy surface.
///
/// Cells are flooded from the tree tops highest first, 4-connected.
/// A cell joins the crown that reaches it first, so crowns meet
/// along the valleys between them. Cells under `min_height` stay
/// unlabelled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerWatershed {
    pub min_height: C,
}

impl Default for MarkerWatershed {
    fn default() -> Self {
        Self { min_height: 2.0 }
    }
}

/// Segmented crowns.
#[derive(Debug, Clone)]
pub struct Crowns {
    /// Crown id per cell, 0 where no crown.
    pub labels: Grid,
    /// Sorted by id.
    pub metrics: Vec<CrownMetrics>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CrownMetrics {
    /// Matches [TreeTop::id].
    pub id: u32,
    /// Tree top location.
    pub x: C,
    pub y: C,
    pub cells: usize,
    /// Crown area in map units squared.
    pub area: C,
    pub max_height: C,
    pub mean_height: C,
}

struct Flood {
    height: C,
    // Insertion order, so equal heights pop first in first out.
    seq: usize,
    row: usize,
    col: usize,
    label: u32,
}

impl PartialEq for Flood {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Flood {}

impl PartialOrd for Flood {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Flood {
    fn cmp(&self, other: &Self) -> Ordering {
        self.height
            .total_cmp(&other.height)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl WatershedSegmenter for MarkerWatershed {
    #[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
    fn segment(&self, chm: &Grid, tops: &[TreeTop]) -> Crowns {
        let mut labels = chm.filled(0.0);
        let mut labelled = vec![false; chm.len()];
        let mut heap = BinaryHeap::new();
        let mut seq = 0;
        let index = |row: usize, col: usize| row * chm.cols() + col;

        for top in tops {
            let Some(height) = chm.get(top.row as isize, top.col as isize) else {
                continue;
            };
            if height < self.min_height || labelled[index(top.row, top.col)] {
                continue;
            }
            labelled[index(top.row, top.col)] = true;
            heap.push(Flood {
                height,
                seq,
                row: top.row,
                col: top.col,
                label: top.id,
            });
            seq += 1;
        }

        while let Some(cell) = heap.pop() {
            labels[(cell.row, cell.col)] = C::from(cell.label);
            for (dr, dc) in [(-1, 0), (1, 0), (0, -1), (0, 1)] {
                let (r, c) = (cell.row as isize + dr, cell.col as isize + dc);
                let Some(height) = chm.get(r, c) else {
                    continue;
                };
                // In range, since get succeeded.
                let (row, col) = (r as usize, c as usize);
                if height < self.min_height || labelled[index(row, col)] {
                    continue;
                }
                labelled[index(row, col)] = true;
                heap.push(Flood {
                    height,
                    seq,
                    row,
                    col,
                    label: cell.label,
                });
                seq += 1;
            }
        }

        let metrics = metrics(chm, &labels, tops);
        Crowns { labels, metrics }
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn metrics(chm: &Grid, labels: &Grid, tops: &[TreeTop]) -> Vec<CrownMetrics> {
    let mut metrics: Vec<CrownMetrics> = tops
        .iter()
        .map(|top| CrownMetrics {
            id: top.id,
            x: top.x,
            y: top.y,
            cells: 0,
            area: 0.0,
            max_height: C::NAN,
            mean_height: 0.0,
        })
        .collect();
    metrics.sort_by_key(|m| m.id);

    let cell_area = chm.res() * chm.res();
    for row in 0..labels.rows() {
        for col in 0..labels.cols() {
            let label = labels[(row, col)] as u32;
            if label == 0 {
                continue;
            }
            let Ok(i) = metrics.binary_search_by_key(&label, |m| m.id) else {
                continue;
            };
            let height = chm[(row, col)];
            let m = &mut metrics[i];
            m.cells += 1;
            m.area += cell_area;
            m.max_height = m.max_height.max(height);
            m.mean_height += height;
        }
    }

    metrics.retain(|m| m.cells > 0);
    for m in &mut metrics {
        m.mean_height /= m.cells as C;
    }
    metrics
}

use crate::{CanopyError, PointCloud};
use georaster::C;
use std::collections::HashMap;

/// Separates ground returns from everything else.
pub trait GroundClassifier {
    /// Returns one flag per point in `cloud`, `true` for ground.
    fn classify(&self, cloud: &PointCloud) -> Result<Vec<bool>, CanopyError>;
}

/// Labels as ground every point within `tolerance` of the lowest
/// point in its `cell_size` square.
///
/// Cheap, and good enough under open canopy. Cells fully covered by
/// crowns get their lowest canopy return labelled ground, which the
/// DTM's gap filling can't undo, so pick `cell_size` wider than the
/// widest crown.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridMinimum {
    pub cell_size: C,
    pub tolerance: C,
}

impl Default for GridMinimum {
    fn default() -> Self {
        Self {
            cell_size: 10.0,
            tolerance: 0.5,
        }
    }
}

impl GridMinimum {
    #[allow(clippy::cast_possible_truncation)]
    fn cell(&self, x: C, y: C) -> (i64, i64) {
        ((x / self.cell_size).floor() as i64, (y / self.cell_size).floor() as i64)
    }
}

impl GroundClassifier for GridMinimum {
    fn classify(&self, cloud: &PointCloud) -> Result<Vec<bool>, CanopyError> {
        if !(self.cell_size > 0.0 && self.tolerance >= 0.0) {
            return Err(CanopyError::Parameter(format!("{self:?}")));
        }
        let mut lowest: HashMap<(i64, i64), C> = HashMap::new();
        for p in &cloud.points {
            lowest
                .entry(self.cell(p.x, p.y))
                .and_modify(|z| *z = z.min(p.z))
                .or_insert(p.z);
        }
        Ok(cloud
            .points
            .iter()
            .map(|p| {
                lowest
                    .get(&self.cell(p.x, p.y))
                    .map_or(false, |z| p.z - z <= self.tolerance)
            })
            .collect())
    }
}

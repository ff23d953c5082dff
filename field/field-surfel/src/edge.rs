//! The surfel graph edge type carrying resolved symmetry labels.

use nalgebra::Vector2;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Edge data between two neighbouring surfels.
///
/// Symmetry labels are stored canonically: `low` belongs to the endpoint with
/// the lexicographically smaller surfel id, `high` to the other. The graph
/// wrapper's `set_k`/`set_t` helpers write both directed copies of an
/// undirected edge so the two stay value-equal; accessors swap transparently
/// when queried from the higher-id side.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SurfelGraphEdge {
    weight: f32,
    k_low: u16,
    k_high: u16,
    t_low: Vec<Vector2<i32>>,
    t_high: Vec<Vector2<i32>>,
}

impl SurfelGraphEdge {
    /// Create an edge with the given weight and unresolved symmetry labels.
    #[must_use]
    pub fn new(weight: f32) -> Self {
        Self {
            weight,
            k_low: 0,
            k_high: 0,
            t_low: Vec::new(),
            t_high: Vec::new(),
        }
    }

    /// The informational edge weight.
    #[must_use]
    pub fn weight(&self) -> f32 {
        self.weight
    }

    /// The resolved rotation index pair `(k_low, k_high)`.
    #[must_use]
    pub fn k(&self) -> (u16, u16) {
        (self.k_low, self.k_high)
    }

    /// Store the resolved rotation index pair.
    pub fn set_k(&mut self, k_low: u16, k_high: u16) {
        self.k_low = k_low;
        self.k_high = k_high;
    }

    /// The lattice translation pair `(t_low, t_high)` for `frame`, zero if
    /// never set for that frame.
    #[must_use]
    pub fn t(&self, frame: usize) -> (Vector2<i32>, Vector2<i32>) {
        let low = self.t_low.get(frame).copied().unwrap_or_else(Vector2::zeros);
        let high = self
            .t_high
            .get(frame)
            .copied()
            .unwrap_or_else(Vector2::zeros);
        (low, high)
    }

    /// Store the lattice translation pair for `frame`, growing the per-frame
    /// storage with zeroes as needed.
    pub fn set_t(&mut self, frame: usize, t_low: Vector2<i32>, t_high: Vector2<i32>) {
        if self.t_low.len() <= frame {
            self.t_low.resize(frame + 1, Vector2::zeros());
            self.t_high.resize(frame + 1, Vector2::zeros());
        }
        self.t_low[frame] = t_low;
        self.t_high[frame] = t_high;
    }

    /// The number of frames with stored translation pairs.
    #[must_use]
    pub fn num_t_frames(&self) -> usize {
        self.t_low.len()
    }
}

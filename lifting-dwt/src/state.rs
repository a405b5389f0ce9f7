//! The carried state of the lifting recursion.

use crate::error::{Result, try_fill, try_reserve};
use crate::geometry::PassGeometry;
use crate::simd::LANES;

/// The carries of up to [`LANES`] neighboring lines, one vector per lifting
/// step, transposed so that each step forms a vector.
pub(crate) type Lanes<const STEPS: usize> = [[f32; LANES]; STEPS];

/// One carry vector per extended position of an axis.
#[derive(Default)]
pub(crate) struct CarryBuffer<const STEPS: usize> {
    data: Vec<[f32; STEPS]>,
}

impl<const STEPS: usize> CarryBuffer<STEPS> {
    pub(crate) fn reserve(&mut self, len: usize) -> Result<()> {
        try_reserve(&mut self.data, len)
    }

    /// Zero the carries of `len` positions.
    pub(crate) fn reset(&mut self, len: usize) -> Result<()> {
        try_fill(&mut self.data, [0.0; STEPS], len)
    }

    #[cfg(test)]
    pub(crate) fn capacity(&self) -> usize {
        self.data.capacity()
    }

    /// Load the carries of the `count` lines starting at `base`.
    #[inline(always)]
    pub(crate) fn gather(&self, base: usize, count: usize) -> Lanes<STEPS> {
        debug_assert!(count <= LANES && base + count <= self.data.len());

        let mut lanes = [[0.0; LANES]; STEPS];
        for (lane, carry) in self.data[base..base + count].iter().enumerate() {
            for (step, value) in carry.iter().enumerate() {
                lanes[step][lane] = *value;
            }
        }

        lanes
    }

    /// Store the carries of the `count` lines starting at `base`.
    #[inline(always)]
    pub(crate) fn scatter(&mut self, base: usize, count: usize, lanes: &Lanes<STEPS>) {
        debug_assert!(count <= LANES && base + count <= self.data.len());

        for (lane, carry) in self.data[base..base + count].iter_mut().enumerate() {
            for (step, value) in carry.iter_mut().enumerate() {
                *value = lanes[step][lane];
            }
        }
    }
}

/// The row and column carries of one worker.
///
/// Row carries follow the horizontal recursion along each extended row, column
/// carries the vertical recursion down each extended column. Both are zeroed
/// at the start of a pass.
#[derive(Default)]
pub(crate) struct StateBuffers<const STEPS: usize> {
    pub(crate) rows: CarryBuffer<STEPS>,
    pub(crate) cols: CarryBuffer<STEPS>,
}

impl<const STEPS: usize> StateBuffers<STEPS> {
    /// Make room for a pass over `geometry`.
    pub(crate) fn reserve(&mut self, geometry: &PassGeometry) -> Result<()> {
        self.rows.reserve(geometry.y.carry_len())?;
        self.cols.reserve(geometry.x.carry_len())
    }

    /// Start a pass over `geometry`.
    pub(crate) fn reset(&mut self, geometry: &PassGeometry) -> Result<()> {
        self.rows.reset(geometry.y.carry_len())?;
        self.cols.reset(geometry.x.carry_len())
    }

    #[cfg(test)]
    pub(crate) fn capacity(&self) -> usize {
        self.rows.capacity() + self.cols.capacity()
    }
}

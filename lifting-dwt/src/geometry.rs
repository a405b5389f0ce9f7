//! The layout of a single transform pass.
//!
//! A pass streams over an extended coordinate system: extended position `0` is
//! the virtual position `-overlap`, and the stream runs far enough past the
//! image for the lagging output to cover every real sample.

use crate::border::BorderMap;
use crate::rect::IntRect;
use crate::schedule::TileShape;
use crate::wavelet::{Direction, WaveletSpec};

/// The layout of one axis.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Axis {
    /// The number of real samples.
    pub(crate) size: usize,
    /// The number of virtual samples streamed before the first real one.
    pub(crate) overlap: usize,
    /// The number of streamed samples, a multiple of the tile side.
    pub(crate) extent: usize,
    /// The lag of the output behind the input.
    pub(crate) delay: usize,
    pub(crate) border: BorderMap,
    /// Whether odd positions are empty high-pass samples of a single-sample
    /// signal being synthesized.
    degenerate: bool,
}

impl Axis {
    pub(crate) fn new(size: usize, side: usize, spec: &WaveletSpec, direction: Direction) -> Self {
        let (steps, delay) = (spec.steps(), spec.delay());
        let parity = direction.lead_parity();
        let bump = |n: usize| if n % 2 == parity { n } else { n + 1 };

        // Zero-initialized carries corrupt the first `steps` output samples,
        // all of which must fall before the image. Pairs start on positions of
        // the lead parity.
        let overlap = bump(steps + 1);
        let end = bump(size + delay);
        let extent = (end + overlap).next_multiple_of(side);

        Self {
            size,
            overlap,
            extent,
            delay,
            border: BorderMap::new(size),
            degenerate: size == 1 && direction == Direction::Inverse,
        }
    }

    /// The number of virtual positions streamed after the last real one.
    pub(crate) fn tail(&self) -> usize {
        self.extent - self.overlap - self.size
    }

    /// The number of carry vectors needed for this axis.
    pub(crate) fn carry_len(&self) -> usize {
        self.extent + self.delay
    }

    /// The carry slot of the extended position `pos`.
    ///
    /// Input positions and output positions (lagging by the delay) share one
    /// indexing, so slots never alias across the seam between extension and
    /// image.
    #[inline(always)]
    pub(crate) fn carry_index(&self, pos: usize, lagged: bool) -> usize {
        if lagged { pos } else { pos + self.delay }
    }

    /// Whether the virtual position `r` reads as zero.
    ///
    /// A single-sample signal has no high-pass band, but the reflection would
    /// hand its low-pass sample to every odd position.
    #[inline(always)]
    pub(crate) fn vanishes(&self, r: isize) -> bool {
        self.degenerate && r & 1 == 1
    }
}

/// The layout of a 2-D pass.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PassGeometry {
    pub(crate) x: Axis,
    pub(crate) y: Axis,
    pub(crate) tile: TileShape,
    pub(crate) steps: usize,
}

impl PassGeometry {
    pub(crate) fn new(
        size_x: usize,
        size_y: usize,
        tile: TileShape,
        direction: Direction,
        spec: &WaveletSpec,
    ) -> Self {
        Self {
            x: Axis::new(size_x, tile.width(), spec, direction),
            y: Axis::new(size_y, tile.height(), spec, direction),
            tile,
            steps: spec.steps(),
        }
    }

    /// The whole extended area, in extended coordinates.
    pub(crate) fn area(&self) -> IntRect {
        IntRect::from_xywh(0, 0, self.x.extent, self.y.extent)
    }

    /// The number of tile rows of the extended area.
    pub(crate) fn tile_rows(&self) -> usize {
        self.y.extent / self.tile.height()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wavelet::{CDF53, CDF97};

    #[test]
    fn overlap_parity() {
        assert_eq!(Axis::new(16, 2, &CDF97, Direction::Forward).overlap, 5);
        assert_eq!(Axis::new(16, 2, &CDF97, Direction::Inverse).overlap, 6);
        assert_eq!(Axis::new(16, 2, &CDF53, Direction::Forward).overlap, 3);
        assert_eq!(Axis::new(16, 2, &CDF53, Direction::Inverse).overlap, 4);
    }

    #[test]
    fn extent_covers_lagging_output() {
        for size in 1..40 {
            for side in [2, 4, 6, 8] {
                for spec in [&CDF53, &CDF97] {
                    for direction in [Direction::Forward, Direction::Inverse] {
                        let axis = Axis::new(size, side, spec, direction);
                        assert_eq!(axis.extent % side, 0);
                        // The last pair must end at or after `size + delay`.
                        assert!(axis.extent >= axis.overlap + size + axis.delay);
                        assert_eq!((axis.overlap + direction.lead_parity()) % 2, 0);
                    }
                }
            }
        }
    }

    #[test]
    fn carry_slots() {
        let axis = Axis::new(10, 4, &CDF97, Direction::Forward);
        assert_eq!(axis.carry_index(0, true), 0);
        assert_eq!(axis.carry_index(0, false), 3);
        assert_eq!(axis.carry_index(axis.extent - 1, false) + 1, axis.carry_len());
    }
}

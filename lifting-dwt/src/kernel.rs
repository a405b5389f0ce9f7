//! The fused lifting kernel.
//!
//! A tile is loaded into a small block, lifted along one axis with the carries
//! of its lines, transposed, lifted along the other axis and stored. Each pair
//! of samples entering the recursion releases one pair of finished samples,
//! lagging behind by the delay of the wavelet.

use core::ops::{Add, Mul};

use crate::border::{BorderMap, BorderStash};
use crate::geometry::PassGeometry;
use crate::image::Plane;
use crate::schedule::TileDescriptor;
use crate::simd::{LANES, Level, Simd, dispatch, f32x8};
use crate::state::{Lanes, StateBuffers};
use crate::wavelet::{Direction, WaveletSpec};

/// The implementation of the innermost lifting loops.
///
/// Both paths produce bit-identical results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum KernelPath {
    /// Lift up to eight lines at once using SIMD vectors.
    #[default]
    Simd,
    /// Lift one line at a time using scalar arithmetic.
    Scalar,
}

/// A value the lifting recursion can run on.
pub(crate) trait Lift: Copy + Add<Output = Self> + Mul<f32, Output = Self> {}

impl Lift for f32 {}
impl<S: Simd> Lift for f32x8<S> {}

type Block = [[f32; LANES]; LANES];

/// Feed the pair `(first, second)` into the recursion and return the pair that
/// leaves it.
///
/// `first` must lie on a position updated by the first lifting step. The
/// returned pair lies `STEPS - 1` positions before the fed pair. `carry[k]`
/// holds the most recent output of step `k - 1` (for `k == 0`, the most recent
/// raw `second`).
#[inline(always)]
pub(crate) fn lift_pair<V: Lift, const STEPS: usize>(
    first: V,
    second: V,
    carry: &mut [V; STEPS],
    weights: &[f32; STEPS],
) -> (V, V) {
    debug_assert!(STEPS >= 2);

    let mut prev = first + (carry[0] + second) * weights[0];
    let mut held = carry[0];
    carry[0] = second;

    for k in 1..STEPS {
        let next = held + (carry[k] + prev) * weights[k];
        held = carry[k];
        carry[k] = prev;
        prev = next;
    }

    (prev, carry[STEPS - 1])
}

#[inline(always)]
fn lift_vectors<S: Simd, const STEPS: usize>(
    simd: S,
    block: &mut Block,
    pairs: usize,
    carry: &mut Lanes<STEPS>,
    weights: &[f32; STEPS],
) {
    let mut state: [f32x8<S>; STEPS] =
        core::array::from_fn(|step| f32x8::from_slice(simd, &carry[step]));

    for pair in block.chunks_exact_mut(2).take(pairs) {
        let first = f32x8::from_slice(simd, &pair[0]);
        let second = f32x8::from_slice(simd, &pair[1]);
        let (a, b) = lift_pair(first, second, &mut state, weights);
        a.store(&mut pair[0]);
        b.store(&mut pair[1]);
    }

    for (vector, lanes) in state.into_iter().zip(carry.iter_mut()) {
        vector.store(lanes);
    }
}

#[inline(always)]
fn lift_lanes<const STEPS: usize>(
    block: &mut Block,
    pairs: usize,
    lanes: usize,
    carry: &mut Lanes<STEPS>,
    weights: &[f32; STEPS],
) {
    for lane in 0..lanes {
        let mut state: [f32; STEPS] = core::array::from_fn(|step| carry[step][lane]);

        for pair in block.chunks_exact_mut(2).take(pairs) {
            let (a, b) = lift_pair(pair[0][lane], pair[1][lane], &mut state, weights);
            pair[0][lane] = a;
            pair[1][lane] = b;
        }

        for (step, value) in state.into_iter().enumerate() {
            carry[step][lane] = value;
        }
    }
}

/// Transpose the leading `n × n` square of the block.
#[inline(always)]
fn transpose(block: &mut Block, n: usize) {
    let source = *block;

    for (i, line) in source.iter().enumerate().take(n) {
        for (j, value) in line.iter().enumerate().take(n) {
            block[j][i] = *value;
        }
    }
}

/// The receiver of the finished samples of a tile.
pub(crate) trait TileSink {
    /// Receive the finished sample at the real position `(x, y)`.
    fn store(&mut self, x: usize, y: usize, value: f32);
}

/// Writes finished samples back into the image.
pub(crate) struct ImageSink<'a> {
    plane: Plane<'a>,
}

impl<'a> ImageSink<'a> {
    pub(crate) fn new(plane: Plane<'a>) -> Self {
        Self { plane }
    }
}

impl TileSink for ImageSink<'_> {
    #[inline(always)]
    fn store(&mut self, x: usize, y: usize, value: f32) {
        // SAFETY: The kernel only emits positions inside the image, and the
        // pass schedule never lets two workers touch the same sample at once.
        unsafe { self.plane.store(x, y, value) }
    }
}

/// Drops finished samples.
pub(crate) struct Discard;

impl TileSink for Discard {
    #[inline(always)]
    fn store(&mut self, _: usize, _: usize, _: f32) {}
}

/// Everything a pass needs to process tiles, shared by all workers.
pub(crate) struct Kernel<'a, const STEPS: usize> {
    plane: Plane<'a>,
    stash: &'a BorderStash,
    geometry: PassGeometry,
    weights: [f32; STEPS],
    /// Factors applied to loaded samples, indexed by `[y parity][x parity]`.
    input_scale: [[f32; 2]; 2],
    /// Factors applied to finished samples, indexed like `input_scale`.
    output_scale: [[f32; 2]; 2],
    direction: Direction,
    path: KernelPath,
}

impl<'a, const STEPS: usize> Kernel<'a, STEPS> {
    pub(crate) fn new(
        plane: Plane<'a>,
        stash: &'a BorderStash,
        geometry: PassGeometry,
        spec: &WaveletSpec,
        direction: Direction,
        path: KernelPath,
    ) -> Self {
        let scales = spec.scale_table(direction);
        let unit = [[1.0; 2]; 2];

        let (input_scale, output_scale) = match direction {
            Direction::Forward => (unit, scales),
            Direction::Inverse => (scales, unit),
        };

        Self {
            plane,
            stash,
            geometry,
            weights: spec.lifting_weights(direction),
            input_scale,
            output_scale,
            direction,
            path,
        }
    }

    pub(crate) fn plane(&self) -> Plane<'a> {
        self.plane
    }

    pub(crate) fn geometry(&self) -> &PassGeometry {
        &self.geometry
    }

    /// Process `tiles` in order, threading the carries through `state`.
    pub(crate) fn run(
        &self,
        tiles: impl Iterator<Item = TileDescriptor>,
        state: &mut StateBuffers<STEPS>,
        sink: &mut impl TileSink,
    ) {
        dispatch!(Level::new(), simd => run_tiles(simd, self, tiles, state, sink));
    }

    /// The sample at the extended position `(x, y)`, scaled for the input of
    /// the lifting recursion.
    #[inline(always)]
    fn load(&self, x: usize, y: usize) -> f32 {
        let (gx, gy) = (&self.geometry.x, &self.geometry.y);
        let vx = BorderMap::virtual_pos(x, 0, gx.overlap);
        let vy = BorderMap::virtual_pos(y, 0, gy.overlap);

        if gx.vanishes(vx) || gy.vanishes(vy) {
            return 0.0;
        }

        let sample = if !gy.border.contains(vy) {
            self.stash.row(vy)[gx.border.real(x, 0, gx.overlap)]
        } else if !gx.border.contains(vx) {
            self.stash.column(vx)[vy as usize]
        } else {
            // SAFETY: Both coordinates lie inside the image. Every order and
            // partition reads an interior sample before the pass overwrites it,
            // and never while another worker writes it.
            unsafe { self.plane.load(vx as usize, vy as usize) }
        };

        sample * self.input_scale[(vy & 1) as usize][(vx & 1) as usize]
    }

    /// Emit the finished samples of a tile, held as `block[dy][dx]`.
    #[inline(always)]
    fn store(&self, tile: TileDescriptor, block: &Block, sink: &mut impl TileSink) {
        let (gx, gy) = (&self.geometry.x, &self.geometry.y);
        let (tw, th) = (self.geometry.tile.width(), self.geometry.tile.height());

        for (dy, line) in block.iter().enumerate().take(th) {
            let Some(y) = gy.border.real_write(tile.y, dy as isize - gy.delay as isize, gy.overlap)
            else {
                continue;
            };

            for (dx, value) in line.iter().enumerate().take(tw) {
                let Some(x) =
                    gx.border
                        .real_write(tile.x, dx as isize - gx.delay as isize, gx.overlap)
                else {
                    continue;
                };

                sink.store(x, y, *value * self.output_scale[y & 1][x & 1]);
            }
        }
    }

    #[inline(always)]
    fn lift<S: Simd>(
        &self,
        simd: S,
        block: &mut Block,
        pairs: usize,
        lanes: usize,
        carry: &mut Lanes<STEPS>,
    ) {
        match self.path {
            KernelPath::Simd => lift_vectors(simd, block, pairs, carry, &self.weights),
            KernelPath::Scalar => lift_lanes(block, pairs, lanes, carry, &self.weights),
        }
    }

    /// Rows first, then columns, then scaling.
    #[inline(always)]
    fn forward_tile<S: Simd>(
        &self,
        simd: S,
        tile: TileDescriptor,
        state: &mut StateBuffers<STEPS>,
        sink: &mut impl TileSink,
    ) {
        let (tw, th) = (self.geometry.tile.width(), self.geometry.tile.height());
        let mut block = [[0.0; LANES]; LANES];

        // `block[dx][dy]`: each vector runs down a column of the tile.
        for dy in 0..th {
            for (dx, column) in block.iter_mut().enumerate().take(tw) {
                column[dy] = self.load(tile.x + dx, tile.y + dy);
            }
        }

        let rows = self.geometry.y.carry_index(tile.y, false);
        let mut carry = state.rows.gather(rows, th);
        self.lift(simd, &mut block, tw / 2, th, &mut carry);
        state.rows.scatter(rows, th, &carry);

        transpose(&mut block, tw.max(th));

        // The row pass left its output one delay to the left.
        let cols = self.geometry.x.carry_index(tile.x, true);
        let mut carry = state.cols.gather(cols, tw);
        self.lift(simd, &mut block, th / 2, tw, &mut carry);
        state.cols.scatter(cols, tw, &carry);

        self.store(tile, &block, sink);
    }

    /// Scaling, then columns, then rows.
    #[inline(always)]
    fn inverse_tile<S: Simd>(
        &self,
        simd: S,
        tile: TileDescriptor,
        state: &mut StateBuffers<STEPS>,
        sink: &mut impl TileSink,
    ) {
        let (tw, th) = (self.geometry.tile.width(), self.geometry.tile.height());
        let mut block = [[0.0; LANES]; LANES];

        // `block[dy][dx]`: each vector runs along a row of the tile.
        for (dy, row) in block.iter_mut().enumerate().take(th) {
            for (dx, sample) in row.iter_mut().enumerate().take(tw) {
                *sample = self.load(tile.x + dx, tile.y + dy);
            }
        }

        let cols = self.geometry.x.carry_index(tile.x, false);
        let mut carry = state.cols.gather(cols, tw);
        self.lift(simd, &mut block, th / 2, tw, &mut carry);
        state.cols.scatter(cols, tw, &carry);

        transpose(&mut block, tw.max(th));

        // The column pass left its output one delay above.
        let rows = self.geometry.y.carry_index(tile.y, true);
        let mut carry = state.rows.gather(rows, th);
        self.lift(simd, &mut block, tw / 2, th, &mut carry);
        state.rows.scatter(rows, th, &carry);

        transpose(&mut block, tw.max(th));

        self.store(tile, &block, sink);
    }
}

#[inline(always)]
fn run_tiles<S: Simd, const STEPS: usize>(
    simd: S,
    kernel: &Kernel<'_, STEPS>,
    tiles: impl Iterator<Item = TileDescriptor>,
    state: &mut StateBuffers<STEPS>,
    sink: &mut impl TileSink,
) {
    match kernel.direction {
        Direction::Forward => {
            for tile in tiles {
                kernel.forward_tile(simd, tile, state, sink);
            }
        }
        Direction::Inverse => {
            for tile in tiles {
                kernel.inverse_tile(simd, tile, state, sink);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Axis;
    use crate::wavelet::{CDF53, CDF97};

    fn signal(len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| ((i * 7919 + 13) % 101) as f32 / 7.0 - 5.0)
            .collect()
    }

    /// Lift a whole signal in place, extended far enough to each side.
    fn reference<const STEPS: usize>(
        signal: &[f32],
        weights: &[f32; STEPS],
        direction: Direction,
    ) -> Vec<f32> {
        let margin = 16;
        let map = BorderMap::new(signal.len());
        let mut extended: Vec<f32> = (0..signal.len() + 2 * margin)
            .map(|i| signal[map.reflect(i as isize - margin as isize)])
            .collect();

        for (step, weight) in weights.iter().enumerate() {
            let parity = (direction.lead_parity() + step) % 2;

            for i in 1..extended.len() - 1 {
                if (i + margin) % 2 == parity {
                    extended[i] = extended[i] + (extended[i - 1] + extended[i + 1]) * weight;
                }
            }
        }

        extended[margin..margin + signal.len()].to_vec()
    }

    /// Stream a signal through the recursion one pair at a time.
    fn stream<const STEPS: usize>(
        signal: &[f32],
        spec: &WaveletSpec,
        direction: Direction,
    ) -> Vec<f32> {
        let weights = spec.lifting_weights::<STEPS>(direction);
        let axis = Axis::new(signal.len(), 2, spec, direction);
        let delay = axis.delay as isize;
        let mut output = vec![f32::NAN; signal.len()];
        let mut carry = [0.0; STEPS];

        for pos in (0..axis.extent).step_by(2) {
            let first = signal[axis.border.real(pos, 0, axis.overlap)];
            let second = signal[axis.border.real(pos, 1, axis.overlap)];
            let (a, b) = lift_pair(first, second, &mut carry, &weights);

            if let Some(i) = axis.border.real_write(pos, -delay, axis.overlap) {
                output[i] = a;
            }
            if let Some(i) = axis.border.real_write(pos, 1 - delay, axis.overlap) {
                output[i] = b;
            }
        }

        output
    }

    #[test]
    fn streaming_matches_whole_signal_lifting() {
        for len in 2..40 {
            let input = signal(len);

            for direction in [Direction::Forward, Direction::Inverse] {
                let weights = CDF97.lifting_weights::<4>(direction);
                assert_eq!(
                    stream::<4>(&input, &CDF97, direction),
                    reference(&input, &weights, direction),
                    "9/7 {direction:?} {len}"
                );

                let weights = CDF53.lifting_weights::<2>(direction);
                assert_eq!(
                    stream::<2>(&input, &CDF53, direction),
                    reference(&input, &weights, direction),
                    "5/3 {direction:?} {len}"
                );
            }
        }
    }

    #[test]
    fn streaming_round_trip() {
        for len in 2..40 {
            let input = signal(len);
            let coefficients = stream::<4>(&input, &CDF97, Direction::Forward);
            let output = stream::<4>(&coefficients, &CDF97, Direction::Inverse);

            for (a, b) in input.iter().zip(&output) {
                assert!((a - b).abs() < 1e-4, "{len}: {a} != {b}");
            }
        }
    }

    #[test]
    fn vector_and_scalar_lanes_agree() {
        let weights = CDF97.lifting_weights::<4>(Direction::Forward);
        let values = signal(LANES * LANES + LANES * 4);

        let mut block = [[0.0; LANES]; LANES];
        for (i, value) in block.iter_mut().flatten().enumerate() {
            *value = values[i];
        }
        let mut carry = [[0.0; LANES]; 4];
        for (i, value) in carry.iter_mut().flatten().enumerate() {
            *value = values[LANES * LANES + i];
        }

        let (mut vector_block, mut vector_carry) = (block, carry);
        dispatch!(Level::new(), simd => lift_vectors(simd, &mut vector_block, 4, &mut vector_carry, &weights));
        lift_lanes(&mut block, 4, LANES, &mut carry, &weights);

        assert_eq!(vector_block, block);
        assert_eq!(vector_carry, carry);
    }

    #[test]
    fn transpose_square() {
        let mut block = [[0.0; LANES]; LANES];
        block[0][1] = 1.0;
        block[2][3] = 2.0;
        block[7][7] = 3.0;
        transpose(&mut block, 4);
        assert_eq!(block[1][0], 1.0);
        assert_eq!(block[3][2], 2.0);
        assert_eq!(block[0][1], 0.0);
        // Outside the square nothing moves.
        assert_eq!(block[7][7], 3.0);
    }
}

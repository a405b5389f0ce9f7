//! Whole-point symmetric border extension.
//!
//! The image is never padded. Reads at virtual positions outside of it are
//! folded back into the image, and writes to such positions are dropped.

use crate::error::{Result, try_fill, try_reserve};
use crate::geometry::{Axis, PassGeometry};
use crate::image::Image;

/// Maps virtual positions on one axis to real positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BorderMap {
    size: usize,
}

impl BorderMap {
    pub(crate) fn new(size: usize) -> Self {
        debug_assert!(size > 0);

        Self { size }
    }

    /// The virtual position addressed by `offset` relative to the extended
    /// position `pos`, where extended positions start `overlap` samples before
    /// the image.
    #[inline(always)]
    pub(crate) fn virtual_pos(pos: usize, offset: isize, overlap: usize) -> isize {
        pos as isize + offset - overlap as isize
    }

    #[inline(always)]
    pub(crate) fn contains(&self, r: isize) -> bool {
        r >= 0 && (r as usize) < self.size
    }

    /// Reflect a virtual position around the first and last sample.
    ///
    /// The extension is periodic with period `2 * (size - 1)`, so positions
    /// more than one image length outside fold repeatedly.
    #[inline(always)]
    pub(crate) fn reflect(&self, r: isize) -> usize {
        if self.contains(r) {
            return r as usize;
        }

        if self.size == 1 {
            return 0;
        }

        let last = self.size as isize - 1;
        let folded = r.rem_euclid(2 * last);

        if folded > last {
            (2 * last - folded) as usize
        } else {
            folded as usize
        }
    }

    /// The real position to read for the virtual position of `pos + offset`.
    #[inline(always)]
    pub(crate) fn real(&self, pos: usize, offset: isize, overlap: usize) -> usize {
        self.reflect(Self::virtual_pos(pos, offset, overlap))
    }

    /// The real position to write for the virtual position of `pos + offset`,
    /// or `None` if it lies in the extension.
    #[inline(always)]
    pub(crate) fn real_write(&self, pos: usize, offset: isize, overlap: usize) -> Option<usize> {
        let r = Self::virtual_pos(pos, offset, overlap);
        self.contains(r).then_some(r as usize)
    }
}

/// Pristine copies of the lines that reads from the extension resolve to.
///
/// The transform runs in place, and the output lags behind the input. A read
/// that reflects back into the image may therefore target a sample that has
/// already been overwritten. All such reads are served from this stash, which
/// is captured before the pass starts.
#[derive(Default)]
pub(crate) struct BorderStash {
    /// Full rows for virtual rows outside the image.
    rows: Lines,
    /// Full columns for virtual columns outside the image.
    columns: Lines,
}

impl BorderStash {
    /// Make room for the stash of a pass over `geometry`.
    pub(crate) fn reserve(&mut self, geometry: &PassGeometry) -> Result<()> {
        self.rows.reserve(&geometry.y, geometry.x.size)?;
        self.columns.reserve(&geometry.x, geometry.y.size)
    }

    /// Copy the border lines of `image` for a pass over `geometry`.
    pub(crate) fn capture(&mut self, image: &Image<'_>, geometry: &PassGeometry) -> Result<()> {
        self.rows
            .capture(&geometry.y, image.size_x(), |y, x| image.sample(x, y))?;
        self.columns
            .capture(&geometry.x, image.size_y(), |x, y| image.sample(x, y))
    }

    /// The real row that the virtual row `vy` reflects to. `vy` must lie
    /// outside the image.
    #[inline(always)]
    pub(crate) fn row(&self, vy: isize) -> &[f32] {
        self.rows.line(vy)
    }

    /// The real column that the virtual column `vx` reflects to. `vx` must lie
    /// outside the image.
    #[inline(always)]
    pub(crate) fn column(&self, vx: isize) -> &[f32] {
        self.columns.line(vx)
    }

    /// The number of stashed samples.
    pub(crate) fn len(&self) -> usize {
        self.rows.data.len() + self.columns.data.len()
    }

    #[cfg(test)]
    pub(crate) fn capacity(&self) -> usize {
        self.rows.data.capacity() + self.columns.data.capacity()
    }
}

/// One stashed line per virtual position in the extension of an axis.
#[derive(Default)]
struct Lines {
    before: usize,
    size: usize,
    len: usize,
    data: Vec<f32>,
}

impl Lines {
    fn reserve(&mut self, axis: &Axis, len: usize) -> Result<()> {
        try_reserve(&mut self.data, (axis.overlap + axis.tail()) * len)
    }

    fn capture(
        &mut self,
        axis: &Axis,
        len: usize,
        read: impl Fn(usize, usize) -> f32,
    ) -> Result<()> {
        let before = axis.overlap;
        let after = axis.tail();
        try_fill(&mut self.data, 0.0, (before + after) * len)?;

        let positions = (-(before as isize)..0).chain(axis.size as isize..(axis.size + after) as isize);

        for (line, r) in self.data.chunks_exact_mut(len).zip(positions) {
            let real = axis.border.reflect(r);

            for (i, sample) in line.iter_mut().enumerate() {
                *sample = read(real, i);
            }
        }

        self.before = before;
        self.size = axis.size;
        self.len = len;

        Ok(())
    }

    #[inline(always)]
    fn line(&self, r: isize) -> &[f32] {
        let idx = if r < 0 {
            (r + self.before as isize) as usize
        } else {
            debug_assert!(r as usize >= self.size);
            self.before + (r as usize - self.size)
        };

        &self.data[idx * self.len..][..self.len]
    }
}

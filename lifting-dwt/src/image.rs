//! Strided views of caller-owned sample buffers.

use core::marker::PhantomData;
use core::ptr::NonNull;

use crate::error::{ImageError, Result, bail};
use crate::wavelet::Subband;

const SAMPLE_SIZE: usize = size_of::<f32>();
const MAX_SIZE: usize = u32::MAX as usize;

/// A mutable view of a rectangular image of `f32` samples.
///
/// The sample at `(x, y)` lives at index `x * step_x + y * step_y` of the
/// underlying buffer, where the steps are the strides divided by the sample
/// size. Rows may be padded, and both row-major and column-major layouts are
/// supported, as long as no two samples share a memory location.
#[derive(Debug)]
pub struct Image<'a> {
    data: &'a mut [f32],
    size_x: usize,
    size_y: usize,
    step_x: usize,
    step_y: usize,
}

impl<'a> Image<'a> {
    /// Create a view of a packed row-major buffer.
    pub fn new(data: &'a mut [f32], size_x: usize, size_y: usize) -> Result<Self> {
        let stride_x = SAMPLE_SIZE;
        let stride_y = size_x.checked_mul(SAMPLE_SIZE).ok_or(ImageError::TooLarge)?;

        Self::with_strides(data, size_x, size_y, stride_x, stride_y)
    }

    /// Create a view with explicit strides, given in bytes.
    pub fn with_strides(
        data: &'a mut [f32],
        size_x: usize,
        size_y: usize,
        stride_x: usize,
        stride_y: usize,
    ) -> Result<Self> {
        if size_x == 0 || size_y == 0 {
            bail!(ImageError::Empty);
        }

        if size_x > MAX_SIZE || size_y > MAX_SIZE {
            bail!(ImageError::TooLarge);
        }

        let step = |stride: usize| {
            if stride == 0 || stride % SAMPLE_SIZE != 0 {
                Err(ImageError::InvalidStride)
            } else {
                Ok(stride / SAMPLE_SIZE)
            }
        };
        let step_x = step(stride_x)?;
        let step_y = step(stride_y)?;

        let span_x = step_x.checked_mul(size_x).ok_or(ImageError::TooLarge)?;
        let span_y = step_y.checked_mul(size_y).ok_or(ImageError::TooLarge)?;

        // Either whole rows fit between two rows, or whole columns fit between
        // two columns.
        if span_x > step_y && span_y > step_x {
            bail!(ImageError::OverlappingLayout);
        }

        let last = (size_x - 1)
            .checked_mul(step_x)
            .and_then(|x| (size_y - 1).checked_mul(step_y)?.checked_add(x))
            .ok_or(ImageError::TooLarge)?;

        if last >= data.len() {
            bail!(ImageError::BufferTooSmall);
        }

        Ok(Self {
            data,
            size_x,
            size_y,
            step_x,
            step_y,
        })
    }

    /// Create a view of a raw byte buffer holding native-endian `f32` samples.
    ///
    /// Trailing bytes that do not form a whole sample are ignored.
    pub fn from_bytes(
        bytes: &'a mut [u8],
        size_x: usize,
        size_y: usize,
        stride_x: usize,
        stride_y: usize,
    ) -> Result<Self> {
        let len = bytes.len() / SAMPLE_SIZE * SAMPLE_SIZE;
        let data = bytemuck::try_cast_slice_mut::<u8, f32>(&mut bytes[..len])
            .map_err(|_| ImageError::Misaligned)?;

        Self::with_strides(data, size_x, size_y, stride_x, stride_y)
    }

    /// The width of the image.
    pub fn size_x(&self) -> usize {
        self.size_x
    }

    /// The height of the image.
    pub fn size_y(&self) -> usize {
        self.size_y
    }

    /// The sample at `(x, y)`, or `None` if it lies outside the image.
    pub fn get(&self, x: usize, y: usize) -> Option<f32> {
        self.offset(x, y).map(|idx| self.data[idx])
    }

    /// A mutable reference to the sample at `(x, y)`, or `None` if it lies
    /// outside the image.
    pub fn get_mut(&mut self, x: usize, y: usize) -> Option<&mut f32> {
        self.offset(x, y).map(|idx| &mut self.data[idx])
    }

    /// The subband that the sample at `(x, y)` belongs to after a forward
    /// transform.
    pub fn subband(&self, x: usize, y: usize) -> Subband {
        Subband::at(x, y)
    }

    /// A view of the low-low subband, i.e. all samples with even coordinates.
    ///
    /// This is the input of the next decomposition level.
    pub fn low_pass_mut(&mut self) -> Result<Image<'_>> {
        self.decimated(1)
    }

    /// The low-low subband after `levels` decomposition levels.
    pub(crate) fn decimated(&mut self, levels: u32) -> Result<Image<'_>> {
        let (mut size_x, mut size_y) = (self.size_x, self.size_y);
        let (mut step_x, mut step_y) = (self.step_x, self.step_y);

        for _ in 0..levels {
            if size_x < 2 || size_y < 2 {
                bail!(ImageError::TooSmallForLevel);
            }

            size_x = size_x.div_ceil(2);
            size_y = size_y.div_ceil(2);
            step_x *= 2;
            step_y *= 2;
        }

        Ok(Image {
            data: &mut *self.data,
            size_x,
            size_y,
            step_x,
            step_y,
        })
    }

    /// The sample at `(x, y)`, which must lie inside the image.
    #[inline(always)]
    pub(crate) fn sample(&self, x: usize, y: usize) -> f32 {
        debug_assert!(x < self.size_x && y < self.size_y);

        self.data[x * self.step_x + y * self.step_y]
    }

    fn offset(&self, x: usize, y: usize) -> Option<usize> {
        (x < self.size_x && y < self.size_y).then(|| x * self.step_x + y * self.step_y)
    }
}

/// A shared handle to the samples of an image, used while a pass is running.
///
/// Several workers hold copies of the same plane. The pass schedule guarantees
/// that a sample is never written by one worker while another one reads or
/// writes it.
#[derive(Clone, Copy)]
pub(crate) struct Plane<'a> {
    ptr: NonNull<f32>,
    len: usize,
    size_x: usize,
    size_y: usize,
    step_x: usize,
    step_y: usize,
    _marker: PhantomData<&'a mut [f32]>,
}

// SAFETY: A plane only hands out sample values, never references, and the
// unsafe accessors require callers to rule out data races.
unsafe impl Send for Plane<'_> {}
// SAFETY: See above.
unsafe impl Sync for Plane<'_> {}

impl<'a> Plane<'a> {
    pub(crate) fn new(image: &'a mut Image<'_>) -> Self {
        Self {
            ptr: NonNull::from(&mut *image.data).cast(),
            len: image.data.len(),
            size_x: image.size_x,
            size_y: image.size_y,
            step_x: image.step_x,
            step_y: image.step_y,
            _marker: PhantomData,
        }
    }

    pub(crate) fn size_x(&self) -> usize {
        self.size_x
    }

    #[inline(always)]
    fn offset(&self, x: usize, y: usize) -> usize {
        debug_assert!(x < self.size_x && y < self.size_y);
        let offset = x * self.step_x + y * self.step_y;
        debug_assert!(offset < self.len);

        offset
    }

    /// Read the sample at `(x, y)`.
    ///
    /// # Safety
    /// `(x, y)` must lie inside the image, and no other thread may write the
    /// sample concurrently.
    #[inline(always)]
    pub(crate) unsafe fn load(&self, x: usize, y: usize) -> f32 {
        let offset = self.offset(x, y);

        // SAFETY: The offset of an in-bounds sample lies within the buffer, as
        // checked when the image was created.
        unsafe { self.ptr.as_ptr().add(offset).read() }
    }

    /// Write the sample at `(x, y)`.
    ///
    /// # Safety
    /// `(x, y)` must lie inside the image, and no other thread may access the
    /// sample concurrently.
    #[inline(always)]
    pub(crate) unsafe fn store(&self, x: usize, y: usize, value: f32) {
        let offset = self.offset(x, y);

        // SAFETY: See `load`.
        unsafe { self.ptr.as_ptr().add(offset).write(value) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransformError;

    fn image_err(result: Result<Image<'_>>) -> ImageError {
        match result {
            Err(TransformError::Image(e)) => e,
            _ => panic!("expected an image error"),
        }
    }

    #[test]
    fn packed_layout() {
        let mut data: Vec<f32> = (0..12).map(|i| i as f32).collect();
        let image = Image::new(&mut data, 4, 3).unwrap();
        assert_eq!(image.get(1, 2), Some(9.0));
        assert_eq!(image.get(4, 0), None);
        assert_eq!(image.get(0, 3), None);
    }

    #[test]
    fn column_major_layout() {
        let mut data: Vec<f32> = (0..12).map(|i| i as f32).collect();
        let image = Image::with_strides(&mut data, 4, 3, 12, 4).unwrap();
        assert_eq!(image.get(1, 2), Some(5.0));
        assert_eq!(image.get(3, 0), Some(9.0));
    }

    #[test]
    fn invalid_layouts() {
        let mut data = vec![0.0; 64];
        assert_eq!(image_err(Image::new(&mut data, 0, 4)), ImageError::Empty);
        assert_eq!(
            image_err(Image::new(&mut data, 9, 8)),
            ImageError::BufferTooSmall
        );
        assert_eq!(
            image_err(Image::with_strides(&mut data, 4, 4, 6, 32)),
            ImageError::InvalidStride
        );
        assert_eq!(
            image_err(Image::with_strides(&mut data, 4, 4, 0, 16)),
            ImageError::InvalidStride
        );
        assert_eq!(
            image_err(Image::with_strides(&mut data, 4, 4, 4, 8)),
            ImageError::OverlappingLayout
        );
        assert_eq!(
            image_err(Image::with_strides(&mut data, usize::MAX, 1, 4, 4)),
            ImageError::TooLarge
        );
    }

    #[test]
    fn padded_rows() {
        let mut data = vec![0.0; 3 * 8];
        let mut image = Image::with_strides(&mut data, 5, 3, 4, 32).unwrap();
        *image.get_mut(4, 2).unwrap() = 1.0;
        assert_eq!(data[2 * 8 + 4], 1.0);
    }

    #[test]
    fn from_bytes() {
        let mut bytes = vec![0_u32; 5];
        let bytes: &mut [u8] = bytemuck::cast_slice_mut(&mut bytes);
        bytes[4..8].copy_from_slice(&2.5_f32.to_ne_bytes());

        let image = Image::from_bytes(bytes, 2, 2, 4, 8).unwrap();
        assert_eq!(image.get(1, 0), Some(2.5));

        assert_eq!(
            image_err(Image::from_bytes(&mut bytes[1..], 2, 2, 4, 8)),
            ImageError::Misaligned
        );
    }

    #[test]
    fn subbands_are_interleaved() {
        let mut data = vec![0.0; 12];
        let image = Image::new(&mut data, 4, 3).unwrap();
        assert_eq!(image.subband(0, 0), Subband::LowLow);
        assert_eq!(image.subband(3, 2), Subband::HighLow);
        assert_eq!(image.subband(2, 1), Subband::LowHigh);
        assert_eq!(image.subband(1, 1), Subband::HighHigh);
    }

    #[test]
    fn low_pass_view() {
        let mut data: Vec<f32> = (0..35).map(|i| i as f32).collect();
        let mut image = Image::new(&mut data, 7, 5).unwrap();
        let low = image.low_pass_mut().unwrap();
        assert_eq!((low.size_x(), low.size_y()), (4, 3));
        assert_eq!(low.get(3, 2), Some(34.0));
        assert_eq!(low.get(1, 1), Some(16.0));

        let mut data = vec![0.0; 6];
        let mut image = Image::new(&mut data, 6, 1).unwrap();
        assert_eq!(
            image_err(image.low_pass_mut()),
            ImageError::TooSmallForLevel
        );
    }
}

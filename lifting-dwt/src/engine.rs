//! Running whole transform passes.

use crate::border::BorderStash;
use crate::error::{Result, SettingsError, bail};
use crate::geometry::PassGeometry;
use crate::image::{Image, Plane};
use crate::kernel::{Kernel, KernelPath};
use crate::partition::Workers;
use crate::schedule::{ScanOrder, TileShape};
use crate::wavelet::{Direction, Wavelet};

/// Settings for a transform.
///
/// None of the settings besides the wavelet change the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformSettings {
    /// The wavelet to transform with.
    pub wavelet: Wavelet,
    /// The shape of the tiles processed by the kernel.
    pub tile: TileShape,
    /// The order in which tiles are visited.
    pub order: ScanOrder,
    /// The number of worker threads. A pass never uses more workers than it has
    /// tile rows.
    pub threads: usize,
    /// The implementation of the innermost kernel loops.
    pub path: KernelPath,
}

impl Default for TransformSettings {
    fn default() -> Self {
        Self {
            wavelet: Wavelet::Cdf97,
            tile: TileShape::T2X2,
            order: ScanOrder::RowMajor,
            threads: 1,
            path: KernelPath::Simd,
        }
    }
}

impl TransformSettings {
    fn validate(&self) -> Result<()> {
        if self.threads == 0 {
            bail!(SettingsError::NoThreads);
        }

        self.order.validate()
    }
}

/// Perform one level of the forward transform in place.
pub fn forward(image: &mut Image<'_>, settings: &TransformSettings) -> Result<()> {
    transform(image, Direction::Forward, settings)
}

/// Perform one level of the inverse transform in place.
pub fn inverse(image: &mut Image<'_>, settings: &TransformSettings) -> Result<()> {
    transform(image, Direction::Inverse, settings)
}

/// Perform one level of the transform in place.
///
/// All errors are reported before the first sample is written.
pub fn transform(
    image: &mut Image<'_>,
    direction: Direction,
    settings: &TransformSettings,
) -> Result<()> {
    transform_levels(image, direction, 1, settings)
}

/// Perform `levels` levels of the transform in place.
///
/// Each further level transforms the low-low subband of the previous one, see
/// [`Image::low_pass_mut`]. The inverse starts at the coarsest level. Memory
/// for all levels is allocated up front, so all errors are reported before
/// the first sample is written.
pub fn transform_levels(
    image: &mut Image<'_>,
    direction: Direction,
    levels: u32,
    settings: &TransformSettings,
) -> Result<()> {
    settings.validate()?;

    match settings.wavelet {
        Wavelet::Cdf97 => run_levels::<4>(image, direction, levels, settings),
        Wavelet::Cdf53 => run_levels::<2>(image, direction, levels, settings),
    }
}

fn run_levels<const STEPS: usize>(
    image: &mut Image<'_>,
    direction: Direction,
    levels: u32,
    settings: &TransformSettings,
) -> Result<()> {
    if levels == 0 {
        return Ok(());
    }

    // The first level is the largest one.
    let mut pass = Pass::<STEPS>::new(&geometry(image, direction, settings), settings.threads)?;
    for level in 1..levels {
        let view = image.decimated(level)?;
        pass.reserve(&geometry(&view, direction, settings), settings.threads)?;
    }

    for i in 0..levels {
        let level = match direction {
            Direction::Forward => i,
            Direction::Inverse => levels - 1 - i,
        };
        ldebug!("level {} of {}", level + 1, levels);

        let mut view = image.decimated(level)?;
        let layout = geometry(&view, direction, settings);
        pass.run(&mut view, &layout, direction, settings)?;
    }

    Ok(())
}

fn geometry(image: &Image<'_>, direction: Direction, settings: &TransformSettings) -> PassGeometry {
    PassGeometry::new(
        image.size_x(),
        image.size_y(),
        settings.tile,
        direction,
        settings.wavelet.spec(),
    )
}

/// The memory of a transform, shared by all of its passes.
struct Pass<const STEPS: usize> {
    stash: BorderStash,
    workers: Workers<STEPS>,
}

impl<const STEPS: usize> Pass<STEPS> {
    fn new(geometry: &PassGeometry, threads: usize) -> Result<Self> {
        debug_assert_eq!(geometry.steps, STEPS);

        let mut stash = BorderStash::default();
        stash.reserve(geometry)?;

        Ok(Self {
            stash,
            workers: Workers::new(geometry, threads)?,
        })
    }

    /// Make room for a further pass over `geometry`.
    fn reserve(&mut self, geometry: &PassGeometry, threads: usize) -> Result<()> {
        self.stash.reserve(geometry)?;
        self.workers.reserve(geometry, threads)
    }

    fn run(
        &mut self,
        image: &mut Image<'_>,
        geometry: &PassGeometry,
        direction: Direction,
        settings: &TransformSettings,
    ) -> Result<()> {
        let spec = settings.wavelet.spec();

        ldebug!(
            "{:?} {} pass over {}x{} samples: extent {}x{}, {}x{} tiles, {:?}, {} thread(s)",
            direction,
            spec.name(),
            image.size_x(),
            image.size_y(),
            geometry.x.extent,
            geometry.y.extent,
            settings.tile.width(),
            settings.tile.height(),
            settings.order,
            settings.threads
        );

        self.stash.capture(image, geometry)?;
        ltrace!("stashed {} border samples", self.stash.len());

        let kernel = Kernel::<STEPS>::new(
            Plane::new(image),
            &self.stash,
            *geometry,
            spec,
            direction,
            settings.path,
        );

        self.workers.run(&kernel, settings.order, settings.threads)
    }

    #[cfg(test)]
    fn capacity(&self) -> usize {
        self.stash.capacity() + self.workers.capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransformError;

    #[test]
    fn rejects_invalid_settings() {
        let mut data = vec![1.0; 16];
        let mut image = Image::new(&mut data, 4, 4).unwrap();

        let settings = TransformSettings {
            threads: 0,
            ..TransformSettings::default()
        };
        assert_eq!(
            forward(&mut image, &settings),
            Err(TransformError::Settings(SettingsError::NoThreads))
        );

        let settings = TransformSettings {
            order: ScanOrder::Blocks {
                width: 8,
                height: 0,
            },
            ..TransformSettings::default()
        };
        assert_eq!(
            forward(&mut image, &settings),
            Err(TransformError::Settings(SettingsError::InvalidBlockSize))
        );

        assert_eq!(data, vec![1.0; 16]);
    }

    #[test]
    fn too_many_levels_leave_image_untouched() {
        let mut data: Vec<f32> = (0..64).map(|i| i as f32).collect();
        let expected = data.clone();
        let mut image = Image::new(&mut data, 8, 8).unwrap();

        // 8 -> 4 -> 2 -> 1, a fifth level would need a 1x1 image to split.
        let result = transform_levels(
            &mut image,
            Direction::Forward,
            5,
            &TransformSettings::default(),
        );
        assert!(result.is_err());
        assert_eq!(data, expected);
    }

    #[test]
    fn levels_allocate_up_front() {
        let (width, height) = (45, 38);
        let original: Vec<f32> = (0..width * height).map(|i| (i % 29) as f32).collect();

        for direction in [Direction::Forward, Direction::Inverse] {
            for threads in [1, 3] {
                let settings = TransformSettings {
                    threads,
                    ..TransformSettings::default()
                };
                let mut data = original.clone();
                let mut image = Image::new(&mut data, width, height).unwrap();

                let mut pass =
                    Pass::<4>::new(&geometry(&image, direction, &settings), threads).unwrap();
                for level in 1..3 {
                    let view = image.decimated(level).unwrap();
                    pass.reserve(&geometry(&view, direction, &settings), threads)
                        .unwrap();
                }
                let capacity = pass.capacity();

                // Coarsest level first, like the inverse.
                for level in (0..3).rev() {
                    let mut view = image.decimated(level).unwrap();
                    let layout = geometry(&view, direction, &settings);
                    pass.run(&mut view, &layout, direction, &settings).unwrap();
                }
                assert_eq!(pass.capacity(), capacity);

                // Reused buffers give the same result as fresh ones.
                let mut expected = original.clone();
                let mut image = Image::new(&mut expected, width, height).unwrap();
                for level in (0..3).rev() {
                    transform(&mut image.decimated(level).unwrap(), direction, &settings)
                        .unwrap();
                }
                assert_eq!(data, expected);
            }
        }
    }
}

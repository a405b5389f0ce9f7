//! Splitting a pass into row bands for independent workers.
//!
//! The lifting recursion runs sequentially down every column, so a worker
//! cannot simply start in the middle of the image. Instead, each worker
//!
//! 1. replays a few tile rows before its band with output discarded, which
//!    leaves its column carries exactly where a sequential pass would have
//!    them (the recursion forgets its initial state after `steps` pairs),
//! 2. processes the first rows of its band into private scratch memory,
//!    since their output lands on rows the previous band still reads,
//! 3. processes the rest of its band straight into the image and
//! 4. copies the scratch rows into the image.
//!
//! All workers finish a phase before any worker starts the next one.

use core::ops::Range;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::border::BorderMap;
use crate::error::{Result, try_fill, try_reserve};
use crate::geometry::PassGeometry;
use crate::image::Plane;
use crate::kernel::{Discard, ImageSink, Kernel, TileSink};
use crate::rect::IntRect;
use crate::schedule::{ScanOrder, TileScheduler};
use crate::state::StateBuffers;

/// The extended rows handled by one worker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Band {
    /// Rows replayed before the band, output discarded.
    pub(crate) prologue: Range<usize>,
    /// The first rows of the band, output staged.
    pub(crate) overlay: Range<usize>,
    /// The remaining rows of the band.
    pub(crate) main: Range<usize>,
}

impl Band {
    fn rows(&self) -> Range<usize> {
        self.overlay.start..self.main.end
    }
}

/// Split the tile rows of a pass into at most `threads` contiguous bands.
pub(crate) fn partition(geometry: &PassGeometry, threads: usize) -> Vec<Band> {
    let height = geometry.tile.height();
    let tile_rows = geometry.tile_rows();
    let workers = threads.clamp(1, tile_rows);

    let prologue_rows = (2 * geometry.steps).div_ceil(height) * height;
    let overlay_rows = geometry.y.delay.div_ceil(height) * height;

    let (base, extra) = (tile_rows / workers, tile_rows % workers);
    let mut start = 0;

    (0..workers)
        .map(|i| {
            let end = start + (base + usize::from(i < extra)) * height;
            // Output of the first band only lands in the extension.
            let overlay_end = if start == 0 {
                start
            } else {
                (start + overlay_rows).min(end)
            };

            let band = Band {
                prologue: start.saturating_sub(prologue_rows)..start,
                overlay: start..overlay_end,
                main: overlay_end..end,
            };
            start = end;

            band
        })
        .collect()
}

/// Finished samples of the overlay rows, held back until the merge.
#[derive(Default)]
struct Staging {
    /// Real rows covered.
    rows: Range<usize>,
    width: usize,
    data: Vec<f32>,
}

impl Staging {
    /// The real rows and the width covered for `band`.
    fn layout(band: &Band, geometry: &PassGeometry) -> (Range<usize>, usize) {
        let axis = &geometry.y;
        let real = |pos: usize| {
            BorderMap::virtual_pos(pos, -(axis.delay as isize), axis.overlap)
                .clamp(0, axis.size as isize) as usize
        };

        (
            real(band.overlay.start)..real(band.overlay.end),
            geometry.x.size,
        )
    }

    fn reserve(&mut self, band: &Band, geometry: &PassGeometry) -> Result<()> {
        let (rows, width) = Self::layout(band, geometry);
        try_reserve(&mut self.data, rows.len() * width)
    }

    fn reset(&mut self, band: &Band, geometry: &PassGeometry) -> Result<()> {
        let (rows, width) = Self::layout(band, geometry);
        try_fill(&mut self.data, 0.0, rows.len() * width)?;
        self.rows = rows;
        self.width = width;

        Ok(())
    }

    fn merge(&self, plane: Plane<'_>) {
        debug_assert!(self.rows.is_empty() || plane.size_x() == self.width);

        for (y, line) in self.rows.clone().zip(self.data.chunks_exact(self.width)) {
            for (x, value) in line.iter().enumerate() {
                // SAFETY: The staged rows lie inside the image, and no other
                // worker touches them during the merge.
                unsafe { plane.store(x, y, *value) }
            }
        }
    }

    #[cfg(test)]
    fn capacity(&self) -> usize {
        self.data.capacity()
    }
}

impl TileSink for Staging {
    #[inline(always)]
    fn store(&mut self, x: usize, y: usize, value: f32) {
        debug_assert!(self.rows.contains(&y));

        self.data[(y - self.rows.start) * self.width + x] = value;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Prologue,
    Overlay,
    Main,
    Merge,
}

impl Phase {
    const ALL: [Self; 4] = [Self::Prologue, Self::Overlay, Self::Main, Self::Merge];
}

#[derive(Default)]
struct Worker<const STEPS: usize> {
    band: Band,
    state: StateBuffers<STEPS>,
    staging: Staging,
}

impl<const STEPS: usize> Worker<STEPS> {
    fn reserve(&mut self, band: &Band, geometry: &PassGeometry) -> Result<()> {
        self.state.reserve(geometry)?;
        self.staging.reserve(band, geometry)
    }

    fn prepare(&mut self, band: Band, geometry: &PassGeometry) -> Result<()> {
        self.state.reset(geometry)?;
        self.staging.reset(&band, geometry)?;
        self.band = band;

        Ok(())
    }

    fn run(&mut self, phase: Phase, kernel: &Kernel<'_, STEPS>, order: ScanOrder) {
        let geometry = kernel.geometry();
        let tiles = |rows: &Range<usize>| {
            let area = IntRect::from_ltrb(0, rows.start, geometry.x.extent, rows.end);
            TileScheduler::new(area, geometry.tile, order).tiles()
        };

        match phase {
            Phase::Prologue => {
                kernel.run(tiles(&self.band.prologue), &mut self.state, &mut Discard);
            }
            Phase::Overlay => {
                kernel.run(
                    tiles(&self.band.overlay),
                    &mut self.state,
                    &mut self.staging,
                );
            }
            Phase::Main => {
                let mut sink = ImageSink::new(kernel.plane());
                kernel.run(tiles(&self.band.main), &mut self.state, &mut sink);
            }
            Phase::Merge => self.staging.merge(kernel.plane()),
        }
    }
}

/// The workers of a transform and the threads they run on.
///
/// Created for the largest pass of a transform, and reused by its smaller
/// passes without further allocation.
pub(crate) struct Workers<const STEPS: usize> {
    workers: Vec<Worker<STEPS>>,
    #[cfg(feature = "parallel")]
    pool: Option<rayon::ThreadPool>,
}

impl<const STEPS: usize> Workers<STEPS> {
    /// Create the workers for a pass over `geometry` on up to `threads`
    /// threads.
    pub(crate) fn new(geometry: &PassGeometry, threads: usize) -> Result<Self> {
        let count = partition(geometry, threads).len();
        let mut workers = Vec::new();
        try_reserve(&mut workers, count)?;
        workers.resize_with(count, Worker::default);

        #[cfg(feature = "parallel")]
        let pool = if count > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(count)
                .build()
                .map_err(|_| crate::error::ResourceError::ThreadPool)?;
            Some(pool)
        } else {
            None
        };

        let mut this = Self {
            workers,
            #[cfg(feature = "parallel")]
            pool,
        };
        this.reserve(geometry, threads)?;

        Ok(this)
    }

    /// Make room for a further pass over `geometry`.
    pub(crate) fn reserve(&mut self, geometry: &PassGeometry, threads: usize) -> Result<()> {
        let bands = partition(geometry, threads);

        if bands.len() > self.workers.len() {
            try_reserve(&mut self.workers, bands.len())?;
            self.workers.resize_with(bands.len(), Worker::default);
        }

        for (worker, band) in self.workers.iter_mut().zip(&bands) {
            worker.reserve(band, geometry)?;
        }

        Ok(())
    }

    /// Run a pass on up to `threads` workers.
    pub(crate) fn run(
        &mut self,
        kernel: &Kernel<'_, STEPS>,
        order: ScanOrder,
        threads: usize,
    ) -> Result<()> {
        let geometry = kernel.geometry();
        let bands = partition(geometry, threads);

        if bands.len() < threads {
            lwarn!(
                "requested {} threads, but the pass only has {} tile rows",
                threads,
                bands.len()
            );
        }

        self.reserve(geometry, threads)?;
        let count = bands.len();

        for (worker, band) in self.workers.iter_mut().zip(bands) {
            ltrace!(
                "band {:?}: prologue {:?}, overlay {:?}",
                band.rows(),
                band.prologue,
                band.overlay
            );
            worker.prepare(band, geometry)?;
        }

        let workers = &mut self.workers[..count];

        #[cfg(feature = "parallel")]
        if let Some(pool) = &self.pool
            && count > 1
        {
            pool.install(|| {
                for phase in Phase::ALL {
                    workers
                        .par_iter_mut()
                        .for_each(|worker| worker.run(phase, kernel, order));
                }
            });

            return Ok(());
        }

        for phase in Phase::ALL {
            for worker in workers.iter_mut() {
                worker.run(phase, kernel, order);
            }
        }

        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn capacity(&self) -> usize {
        self.workers
            .iter()
            .map(|w| w.state.capacity() + w.staging.capacity())
            .sum()
    }
}

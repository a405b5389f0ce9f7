/*!
A lifting-scheme 2-D discrete wavelet transform.

This crate computes the forward and inverse 2-D discrete wavelet transform of
an `f32` image in place, using the lifting factorizations of the CDF 9/7 and
CDF 5/3 wavelets with whole-point symmetric border extension. The four
subbands of a level are stored interleaved: the sample at `(x, y)` belongs to
[`Subband::LowLow`] when both coordinates are even, to [`Subband::HighLow`]
when only `x` is odd, to [`Subband::LowHigh`] when only `y` is odd and to
[`Subband::HighHigh`] when both are odd.

The image is never padded or copied. A single fused kernel streams over the
image in small tiles, carrying the state of the lifting recursion from tile to
tile and writing finished samples back behind the input. Tiles can be visited
in several orders (see [`ScanOrder`]), and a pass can be split into row bands
processed by independent worker threads. Neither choice changes the result:
every configuration produces bit-identical output.

```rust
use lifting_dwt::{Image, TransformSettings};

let mut data: Vec<f32> = (0..64 * 48).map(|i| (i % 64) as f32).collect();
let original = data.clone();
let mut image = Image::new(&mut data, 64, 48).unwrap();

let settings = TransformSettings {
    threads: 2,
    ..TransformSettings::default()
};
lifting_dwt::forward(&mut image, &settings).unwrap();
lifting_dwt::inverse(&mut image, &settings).unwrap();

for (a, b) in data.iter().zip(&original) {
    assert!((a - b).abs() < 1e-3);
}
```

## Cargo features
- `simd` (default): vectorize the kernel via `fearless_simd`.
- `parallel` (default): run multi-threaded passes on a `rayon` thread pool.
  Without it, the same phases run on the calling thread.
- `logging`: emit diagnostics via the `log` crate.
*/

#![deny(missing_docs)]

#[macro_use]
mod log;

mod border;
mod engine;
mod error;
mod geometry;
mod image;
mod kernel;
mod partition;
mod rect;
mod schedule;
mod simd;
mod state;
mod wavelet;

pub use engine::{TransformSettings, forward, inverse, transform, transform_levels};
pub use error::{ImageError, ResourceError, Result, SettingsError, TransformError};
pub use image::Image;
pub use kernel::KernelPath;
pub use schedule::{ScanOrder, TileShape};
pub use wavelet::{CDF53, CDF97, Direction, Subband, Wavelet, WaveletSpec};

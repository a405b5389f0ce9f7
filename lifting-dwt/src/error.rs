//! Error types for wavelet transforms.
//!
//! Every error is detected before the first sample of an image is written, so
//! a failed call never leaves a partially transformed buffer behind.

use core::fmt;

/// The main error type for transform operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformError {
    /// Errors related to the image buffer and its layout.
    Image(ImageError),
    /// Errors related to the transform settings.
    Settings(SettingsError),
    /// Errors related to acquiring working memory or threads.
    Resource(ResourceError),
}

/// Errors related to the image buffer and its layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageError {
    /// The image has no samples.
    Empty,
    /// The buffer is too small for the given size and strides.
    BufferTooSmall,
    /// A stride is zero or not a multiple of the sample size.
    InvalidStride,
    /// Rows and columns of the layout overlap in memory.
    OverlappingLayout,
    /// A byte buffer is not aligned for `f32` samples.
    Misaligned,
    /// The image dimensions exceed supported limits.
    TooLarge,
    /// The image is too small for another decomposition level.
    TooSmallForLevel,
}

/// Errors related to the transform settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsError {
    /// Tile sides must be even and between 2 and 8.
    InvalidTileShape,
    /// A strip or block of a scan order has a zero side.
    InvalidBlockSize,
    /// At least one thread is required.
    NoThreads,
}

/// Errors related to acquiring working memory or threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceError {
    /// A working buffer of the given number of elements could not be allocated.
    OutOfMemory(usize),
    /// The worker thread pool could not be created.
    ThreadPool,
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image(e) => write!(f, "{e}"),
            Self::Settings(e) => write!(f, "{e}"),
            Self::Resource(e) => write!(f, "{e}"),
        }
    }
}

impl fmt::Display for ImageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "image has no samples"),
            Self::BufferTooSmall => write!(f, "buffer is too small for the image layout"),
            Self::InvalidStride => {
                write!(f, "strides must be non-zero multiples of the sample size")
            }
            Self::OverlappingLayout => write!(f, "rows and columns overlap in memory"),
            Self::Misaligned => write!(f, "byte buffer is not aligned for f32 samples"),
            Self::TooLarge => write!(f, "image is too large"),
            Self::TooSmallForLevel => {
                write!(f, "image is too small for another decomposition level")
            }
        }
    }
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTileShape => {
                write!(f, "tile sides must be even and between 2 and 8")
            }
            Self::InvalidBlockSize => write!(f, "strips and blocks must not be empty"),
            Self::NoThreads => write!(f, "at least one thread is required"),
        }
    }
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfMemory(len) => write!(f, "failed to allocate {len} elements"),
            Self::ThreadPool => write!(f, "failed to create the worker thread pool"),
        }
    }
}

impl std::error::Error for TransformError {}
impl std::error::Error for ImageError {}
impl std::error::Error for SettingsError {}
impl std::error::Error for ResourceError {}

impl From<ImageError> for TransformError {
    fn from(e: ImageError) -> Self {
        Self::Image(e)
    }
}

impl From<SettingsError> for TransformError {
    fn from(e: SettingsError) -> Self {
        Self::Settings(e)
    }
}

impl From<ResourceError> for TransformError {
    fn from(e: ResourceError) -> Self {
        Self::Resource(e)
    }
}

/// Result type for transform operations.
pub type Result<T> = core::result::Result<T, TransformError>;

macro_rules! bail {
    ($err:expr) => {
        return Err($err.into())
    };
}

macro_rules! err {
    ($err:expr) => {
        Err($err.into())
    };
}

/// Make sure `vec` can grow to `len` elements without reallocating,
/// reporting allocation failure as an error instead of aborting.
pub(crate) fn try_reserve<T>(vec: &mut Vec<T>, len: usize) -> Result<()> {
    if let Some(additional) = len.checked_sub(vec.len()) {
        vec.try_reserve_exact(additional)
            .map_err(|_| ResourceError::OutOfMemory(len))?;
    }

    Ok(())
}

/// Replace the contents of `vec` with `len` copies of `elem`.
///
/// Never allocates if `vec` was reserved for at least `len` elements.
pub(crate) fn try_fill<T: Clone>(vec: &mut Vec<T>, elem: T, len: usize) -> Result<()> {
    vec.clear();
    try_reserve(vec, len)?;
    vec.resize(len, elem);

    Ok(())
}

pub(crate) use bail;
pub(crate) use err;

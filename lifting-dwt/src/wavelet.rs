//! Wavelet families, their lifting factorizations and subband scaling.

/// A wavelet family supported by the transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Wavelet {
    /// The Cohen-Daubechies-Feauveau 9/7 wavelet (four lifting steps).
    #[default]
    Cdf97,
    /// The Cohen-Daubechies-Feauveau 5/3 wavelet (two lifting steps).
    Cdf53,
}

impl Wavelet {
    /// The lifting factorization of this wavelet.
    pub fn spec(self) -> &'static WaveletSpec {
        match self {
            Self::Cdf97 => &CDF97,
            Self::Cdf53 => &CDF53,
        }
    }
}

/// The direction of a transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Decompose samples into interleaved subbands.
    Forward,
    /// Reconstruct samples from interleaved subbands.
    Inverse,
}

impl Direction {
    /// Parity of the positions updated by the first lifting step.
    pub(crate) fn lead_parity(self) -> usize {
        match self {
            Self::Forward => 1,
            Self::Inverse => 0,
        }
    }
}

/// One of the four subbands of a decomposition level.
///
/// Subbands are stored interleaved: the subband of a sample follows from the
/// parity of its coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subband {
    /// Low-pass in both directions (even `x`, even `y`).
    LowLow,
    /// High-pass horizontally, low-pass vertically (odd `x`, even `y`).
    HighLow,
    /// Low-pass horizontally, high-pass vertically (even `x`, odd `y`).
    LowHigh,
    /// High-pass in both directions (odd `x`, odd `y`).
    HighHigh,
}

impl Subband {
    /// The subband that the sample at `(x, y)` belongs to.
    pub fn at(x: usize, y: usize) -> Self {
        match (x % 2 == 1, y % 2 == 1) {
            (false, false) => Self::LowLow,
            (true, false) => Self::HighLow,
            (false, true) => Self::LowHigh,
            (true, true) => Self::HighHigh,
        }
    }
}

/// The constants describing the lifting factorization of a wavelet.
#[derive(Debug)]
pub struct WaveletSpec {
    name: &'static str,
    weights: &'static [f32],
    zeta: f32,
}

/// CDF 9/7, as used by the irreversible path of JPEG 2000.
pub static CDF97: WaveletSpec = WaveletSpec {
    name: "CDF 9/7",
    weights: &[-1.586_134_3, -0.052_980_117, 0.882_911_1, 0.443_506_87],
    zeta: 1.230_174_1,
};

/// CDF 5/3, as used by the reversible path of JPEG 2000 (without rounding).
pub static CDF53: WaveletSpec = WaveletSpec {
    name: "CDF 5/3",
    weights: &[-0.5, 0.25],
    zeta: 1.0,
};

impl WaveletSpec {
    /// A human-readable name of the wavelet.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The forward lifting weights, in the order they are applied.
    ///
    /// Even-indexed steps update odd samples, odd-indexed steps update even
    /// samples.
    pub fn weights(&self) -> &'static [f32] {
        self.weights
    }

    /// The number of lifting steps.
    pub fn steps(&self) -> usize {
        self.weights.len()
    }

    /// The number of samples by which the streaming output lags behind the
    /// input on each axis.
    pub fn delay(&self) -> usize {
        self.steps() - 1
    }

    /// The gain of the low-pass branch at zero frequency before scaling.
    ///
    /// The forward transform divides low-pass samples by this constant and
    /// multiplies high-pass samples by it, once per axis.
    pub fn zeta(&self) -> f32 {
        self.zeta
    }

    /// The factor applied to samples of `subband`.
    ///
    /// The forward transform applies it to its output, the inverse transform to
    /// its input. The factors of the two directions are reciprocal.
    pub fn scale(&self, subband: Subband, direction: Direction) -> f32 {
        let squared = self.zeta * self.zeta;

        let forward = match subband {
            Subband::LowLow => 1.0 / squared,
            Subband::HighLow | Subband::LowHigh => 1.0,
            Subband::HighHigh => squared,
        };

        match direction {
            Direction::Forward => forward,
            Direction::Inverse => 1.0 / forward,
        }
    }

    /// Scale factors indexed by `[y parity][x parity]`.
    pub(crate) fn scale_table(&self, direction: Direction) -> [[f32; 2]; 2] {
        [
            [
                self.scale(Subband::LowLow, direction),
                self.scale(Subband::HighLow, direction),
            ],
            [
                self.scale(Subband::LowHigh, direction),
                self.scale(Subband::HighHigh, direction),
            ],
        ]
    }

    /// The weights in application order for `direction`.
    ///
    /// The inverse undoes the forward steps in reverse order.
    pub(crate) fn lifting_weights<const STEPS: usize>(&self, direction: Direction) -> [f32; STEPS] {
        debug_assert_eq!(self.steps(), STEPS);

        match direction {
            Direction::Forward => core::array::from_fn(|i| self.weights[i]),
            Direction::Inverse => core::array::from_fn(|i| -self.weights[STEPS - 1 - i]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subband_parity() {
        assert_eq!(Subband::at(0, 0), Subband::LowLow);
        assert_eq!(Subband::at(3, 0), Subband::HighLow);
        assert_eq!(Subband::at(2, 5), Subband::LowHigh);
        assert_eq!(Subband::at(7, 1), Subband::HighHigh);
    }

    #[test]
    fn output_delay() {
        assert_eq!(CDF97.delay(), 3);
        assert_eq!(CDF53.delay(), 1);
    }

    #[test]
    fn scales_are_reciprocal() {
        for wavelet in [Wavelet::Cdf97, Wavelet::Cdf53] {
            let spec = wavelet.spec();
            for subband in [
                Subband::LowLow,
                Subband::HighLow,
                Subband::LowHigh,
                Subband::HighHigh,
            ] {
                let product =
                    spec.scale(subband, Direction::Forward) * spec.scale(subband, Direction::Inverse);
                assert!((product - 1.0).abs() < 1e-6, "{} {subband:?}", spec.name());
            }
        }
    }

    #[test]
    fn zeta_is_the_dc_gain() {
        // Lifting a constant signal leaves the low-pass samples at `zeta` times
        // the constant and the high-pass samples at zero.
        for wavelet in [Wavelet::Cdf97, Wavelet::Cdf53] {
            let spec = wavelet.spec();
            let (mut even, mut odd) = (1.0_f32, 1.0_f32);

            for (step, weight) in spec.weights().iter().enumerate() {
                if step % 2 == 0 {
                    odd += 2.0 * even * weight;
                } else {
                    even += 2.0 * odd * weight;
                }
            }

            assert!((even - spec.zeta()).abs() < 1e-5, "{}", spec.name());
            assert!(odd.abs() < 1e-5, "{}", spec.name());
        }
    }

    #[test]
    fn inverse_weights() {
        let weights = CDF97.lifting_weights::<4>(Direction::Inverse);
        assert_eq!(weights[0], -0.443_506_87);
        assert_eq!(weights[3], 1.586_134_3);
        assert_eq!(CDF53.lifting_weights::<2>(Direction::Forward), [-0.5, 0.25]);
    }
}

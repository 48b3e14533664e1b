// Biquad filters and Linkwitz-Riley crossovers
// Coefficients follow the Audio EQ Cookbook; state is kept per channel

use std::f64::consts::PI;

/// Butterworth Q
pub const BUTTERWORTH_Q: f64 = std::f64::consts::FRAC_1_SQRT_2;

/// Keep cutoffs safely below Nyquist
fn clamp_cutoff(cutoff: f64, sample_rate: f64) -> f64 {
    cutoff.clamp(1.0, sample_rate * 0.49)
}

/// Normalized biquad coefficients (a0 = 1)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoeffs {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl BiquadCoeffs {
    /// Lowpass at `cutoff` Hz with resonance `q`
    pub fn lowpass(cutoff: f64, q: f64, sample_rate: f64) -> Self {
        let q = q.max(0.5);
        let omega = 2.0 * PI * clamp_cutoff(cutoff, sample_rate) / sample_rate;
        let (sin_omega, cos_omega) = omega.sin_cos();
        let alpha = sin_omega / (2.0 * q);
        let a0 = 1.0 + alpha;

        BiquadCoeffs {
            b0: (1.0 - cos_omega) / 2.0 / a0,
            b1: (1.0 - cos_omega) / a0,
            b2: (1.0 - cos_omega) / 2.0 / a0,
            a1: -2.0 * cos_omega / a0,
            a2: (1.0 - alpha) / a0,
        }
    }

    /// Highpass at `cutoff` Hz with resonance `q`
    pub fn highpass(cutoff: f64, q: f64, sample_rate: f64) -> Self {
        let q = q.max(0.5);
        let omega = 2.0 * PI * clamp_cutoff(cutoff, sample_rate) / sample_rate;
        let (sin_omega, cos_omega) = omega.sin_cos();
        let alpha = sin_omega / (2.0 * q);
        let a0 = 1.0 + alpha;

        BiquadCoeffs {
            b0: (1.0 + cos_omega) / 2.0 / a0,
            b1: -(1.0 + cos_omega) / a0,
            b2: (1.0 + cos_omega) / 2.0 / a0,
            a1: -2.0 * cos_omega / a0,
            a2: (1.0 - alpha) / a0,
        }
    }
}

/// Direct form I biquad with its own state
#[derive(Debug, Clone)]
pub struct Biquad {
    coeffs: BiquadCoeffs,
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
}

impl Biquad {
    pub fn new(coeffs: BiquadCoeffs) -> Self {
        Biquad {
            coeffs,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    #[inline]
    pub fn process(&mut self, x: f64) -> f64 {
        let c = &self.coeffs;
        let y = c.b0 * x + c.b1 * self.x1 + c.b2 * self.x2 - c.a1 * self.y1 - c.a2 * self.y2;
        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        self.y1 = y;
        y
    }

    pub fn process_buffer(&mut self, buffer: &mut [f64]) {
        for sample in buffer.iter_mut() {
            *sample = self.process(*sample);
        }
    }
}

/// Fourth-order Linkwitz-Riley split: two cascaded Butterworth sections per side
///
/// Low and high outputs sum to an allpass response.
#[derive(Debug, Clone)]
pub struct LinkwitzRiley {
    low: [Biquad; 2],
    high: [Biquad; 2],
}

impl LinkwitzRiley {
    pub fn new(crossover_hz: f64, sample_rate: f64) -> Self {
        let lp = BiquadCoeffs::lowpass(crossover_hz, BUTTERWORTH_Q, sample_rate);
        let hp = BiquadCoeffs::highpass(crossover_hz, BUTTERWORTH_Q, sample_rate);
        LinkwitzRiley {
            low: [Biquad::new(lp), Biquad::new(lp)],
            high: [Biquad::new(hp), Biquad::new(hp)],
        }
    }

    /// Returns (low, high)
    #[inline]
    pub fn split(&mut self, x: f64) -> (f64, f64) {
        let low_first = self.low[0].process(x);
        let low = self.low[1].process(low_first);
        let high_first = self.high[0].process(x);
        let high = self.high[1].process(high_first);
        (low, high)
    }
}

/// Second-order Butterworth highpass applied in place
pub fn highpass_in_place(buffer: &mut [f64], cutoff: f64, sample_rate: f64) {
    Biquad::new(BiquadCoeffs::highpass(cutoff, BUTTERWORTH_Q, sample_rate)).process_buffer(buffer);
}

/// Split a channel into low, mid and high bands
///
/// The low band also passes through the upper crossover's allpass so all three
/// bands share the same phase response and sum back flat.
pub fn split_three_bands(buffer: &[f64], low_hz: f64, high_hz: f64, sample_rate: f64) -> [Vec<f64>; 3] {
    let mut lower = LinkwitzRiley::new(low_hz, sample_rate);
    let mut upper = LinkwitzRiley::new(high_hz, sample_rate);
    let mut low_allpass = LinkwitzRiley::new(high_hz, sample_rate);

    let mut low = Vec::with_capacity(buffer.len());
    let mut mid = Vec::with_capacity(buffer.len());
    let mut high = Vec::with_capacity(buffer.len());

    for &x in buffer {
        let (l, rest) = lower.split(x);
        let (m, h) = upper.split(rest);
        let (la, lb) = low_allpass.split(l);
        low.push(la + lb);
        mid.push(m);
        high.push(h);
    }

    [low, mid, high]
}

// Effect Processing
// Schroeder reverb: parallel feedback combs into series allpasses

/// Comb delays in samples at 44.1 kHz, scaled to the render rate
const COMB_TUNING: [usize; 4] = [1116, 1188, 1277, 1356];
const ALLPASS_TUNING: [usize; 2] = [556, 441];

const COMB_FEEDBACK: f64 = 0.78;
const COMB_DAMPING: f64 = 0.25;
const ALLPASS_FEEDBACK: f64 = 0.5;

struct Comb {
    buffer: Vec<f64>,
    index: usize,
    filter_state: f64,
}

impl Comb {
    fn new(length: usize) -> Self {
        Self {
            buffer: vec![0.0; length.max(1)],
            index: 0,
            filter_state: 0.0,
        }
    }

    fn process(&mut self, input: f64) -> f64 {
        let output = self.buffer[self.index];
        // One-pole damping in the feedback path
        self.filter_state = output * (1.0 - COMB_DAMPING) + self.filter_state * COMB_DAMPING;
        self.buffer[self.index] = input + self.filter_state * COMB_FEEDBACK;
        self.index = (self.index + 1) % self.buffer.len();
        output
    }
}

struct Allpass {
    buffer: Vec<f64>,
    index: usize,
}

impl Allpass {
    fn new(length: usize) -> Self {
        Self {
            buffer: vec![0.0; length.max(1)],
            index: 0,
        }
    }

    fn process(&mut self, input: f64) -> f64 {
        let delayed = self.buffer[self.index];
        let output = delayed - input;
        self.buffer[self.index] = input + delayed * ALLPASS_FEEDBACK;
        self.index = (self.index + 1) % self.buffer.len();
        output
    }
}

/// Mono reverb used for the CC91 send bus
pub struct Reverb {
    combs: Vec<Comb>,
    allpasses: Vec<Allpass>,
}

impl Reverb {
    pub fn new(sample_rate: f64) -> Self {
        let scale = sample_rate / 44100.0;
        let scaled = |n: usize| ((n as f64) * scale).round() as usize;
        Self {
            combs: COMB_TUNING.iter().map(|&n| Comb::new(scaled(n))).collect(),
            allpasses: ALLPASS_TUNING.iter().map(|&n| Allpass::new(scaled(n))).collect(),
        }
    }

    /// Wet signal only
    pub fn process(&mut self, input: &[f64]) -> Vec<f64> {
        let gain = 1.0 / self.combs.len() as f64;
        input
            .iter()
            .map(|&x| {
                let mut y = self.combs.iter_mut().map(|c| c.process(x)).sum::<f64>() * gain;
                for allpass in self.allpasses.iter_mut() {
                    y = allpass.process(y);
                }
                y
            })
            .collect()
    }
}

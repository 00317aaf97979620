use super::MonoSource;
use std::f32::consts::TAU;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Square,
    Triangle,
    Sawtooth,
    /// Deterministic white noise (xorshift)
    Noise,
}

/// Waveform, frequency and gain of a synthesized tone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneSpec {
    pub waveform: Waveform,
    /// Frequency in Hz
    pub frequency: f32,
    /// Linear gain (0.0 = silent)
    pub gain: f32,
}

impl ToneSpec {
    pub const fn new(waveform: Waveform, frequency: f32, gain: f32) -> Self {
        Self {
            waveform,
            frequency,
            gain,
        }
    }

    pub const fn sine(frequency: f32, gain: f32) -> Self {
        Self::new(Waveform::Sine, frequency, gain)
    }
}

/// Cue categories, each mapped to a fixed tone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CueKind {
    Beep,
    Pulse,
    Warning,
    Boundary,
    Marker,
}

const CUE_TONES: [ToneSpec; 5] = [
    ToneSpec::new(Waveform::Sine, 880.0, 0.25),
    ToneSpec::new(Waveform::Square, 440.0, 0.12),
    ToneSpec::new(Waveform::Sawtooth, 220.0, 0.2),
    ToneSpec::new(Waveform::Triangle, 330.0, 0.3),
    ToneSpec::new(Waveform::Sine, 1320.0, 0.2),
];

impl CueKind {
    pub const ALL: [CueKind; 5] = [
        CueKind::Beep,
        CueKind::Pulse,
        CueKind::Warning,
        CueKind::Boundary,
        CueKind::Marker,
    ];

    pub fn tone(self) -> ToneSpec {
        CUE_TONES[self as usize]
    }
}

/// Phase-accumulating oscillator.
///
/// Changing the tone keeps the phase, so retuning mid-stream does not click.
#[derive(Debug, Clone)]
pub struct Oscillator {
    tone: ToneSpec,
    sample_rate: f32,
    phase: f32,
    noise_state: u32,
}

impl Oscillator {
    pub fn new(tone: ToneSpec, sample_rate: u32) -> Self {
        Self {
            tone,
            sample_rate: sample_rate.max(1) as f32,
            phase: 0.0,
            noise_state: 0x9E37_79B9,
        }
    }

    pub fn for_cue(kind: CueKind, sample_rate: u32) -> Self {
        Self::new(kind.tone(), sample_rate)
    }

    pub fn tone(&self) -> ToneSpec {
        self.tone
    }

    pub fn set_tone(&mut self, tone: ToneSpec) {
        self.tone = tone;
    }

    pub fn reset(&mut self) {
        self.phase = 0.0;
        self.noise_state = 0x9E37_79B9;
    }

    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        let p = self.phase;
        let raw = match self.tone.waveform {
            Waveform::Sine => (TAU * p).sin(),
            Waveform::Square => {
                if p < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Triangle => 1.0 - 4.0 * (p - 0.5).abs(),
            Waveform::Sawtooth => 2.0 * p - 1.0,
            Waveform::Noise => self.next_noise(),
        };

        self.phase += self.tone.frequency / self.sample_rate;
        self.phase -= self.phase.floor();

        raw * self.tone.gain
    }

    fn next_noise(&mut self) -> f32 {
        let mut x = self.noise_state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.noise_state = x;
        (x as f32 / u32::MAX as f32) * 2.0 - 1.0
    }
}

impl MonoSource for Oscillator {
    fn read(&mut self, out: &mut [f32]) -> usize {
        for sample in out.iter_mut() {
            *sample = self.next_sample();
        }
        out.len()
    }

    fn is_continuous(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cue_table_covers_all_kinds() {
        for kind in CueKind::ALL {
            let tone = kind.tone();
            assert!(tone.frequency > 0.0);
            assert!(tone.gain > 0.0 && tone.gain <= 1.0);
        }
        assert_eq!(CueKind::Pulse.tone().waveform, Waveform::Square);
    }

    #[test]
    fn test_sine_peak_matches_gain() {
        let mut osc = Oscillator::new(ToneSpec::sine(1000.0, 0.5), 48000);
        let mut buf = vec![0.0; 4800];
        assert_eq!(osc.read(&mut buf), 4800);
        let peak = buf.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!((peak - 0.5).abs() < 1e-2);
    }

    #[test]
    fn test_square_levels() {
        let mut osc = Oscillator::new(ToneSpec::new(Waveform::Square, 100.0, 1.0), 48000);
        let mut buf = vec![0.0; 960];
        osc.read(&mut buf);
        assert!(buf.iter().all(|s| *s == 1.0 || *s == -1.0));
    }

    #[test]
    fn test_waveforms_stay_in_range() {
        for waveform in [
            Waveform::Sine,
            Waveform::Square,
            Waveform::Triangle,
            Waveform::Sawtooth,
            Waveform::Noise,
        ] {
            let mut osc = Oscillator::new(ToneSpec::new(waveform, 523.25, 1.0), 44100);
            let mut buf = vec![0.0; 2048];
            osc.read(&mut buf);
            assert!(buf.iter().all(|s| s.is_finite() && s.abs() <= 1.0), "{:?}", waveform);
        }
    }

    #[test]
    fn test_retune_keeps_phase_continuous() {
        let mut osc = Oscillator::new(ToneSpec::sine(440.0, 1.0), 48000);
        let mut buf = vec![0.0; 100];
        osc.read(&mut buf);
        let before = buf[99];
        osc.set_tone(ToneSpec::sine(450.0, 1.0));
        let after = osc.next_sample();
        assert!((after - before).abs() < 0.1);
    }

    #[test]
    fn test_noise_is_deterministic() {
        let tone = ToneSpec::new(Waveform::Noise, 1.0, 1.0);
        let mut a = Oscillator::new(tone, 48000);
        let mut b = Oscillator::new(tone, 48000);
        let mut buf_a = vec![0.0; 64];
        let mut buf_b = vec![0.0; 64];
        a.read(&mut buf_a);
        b.read(&mut buf_b);
        assert_eq!(buf_a, buf_b);
    }
}

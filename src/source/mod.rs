//! Mono sample producers feeding the spatial pipeline.
//!
//! - [`Oscillator`]: parametric tone generator for synthesized cues
//! - [`ClipSource`]: file-backed reader, played once or looped seamlessly
//! - [`Silence`]: placeholder that always fills with zeros

mod clip;
mod oscillator;

pub use clip::{ClipSource, LoopMode};
pub use oscillator::{CueKind, Oscillator, ToneSpec, Waveform};

/// A producer of a mono `f32` sample stream.
///
/// `read` fills up to `out.len()` samples and returns how many were written.
/// It returns fewer only at a genuine end of stream; continuous sources always
/// fill the whole request. Called on the audio thread, so implementations must
/// not allocate or block.
pub trait MonoSource: Send {
    fn read(&mut self, out: &mut [f32]) -> usize;

    /// True if the source never runs out.
    fn is_continuous(&self) -> bool {
        false
    }
}

impl<S: MonoSource + ?Sized> MonoSource for Box<S> {
    fn read(&mut self, out: &mut [f32]) -> usize {
        (**self).read(out)
    }

    fn is_continuous(&self) -> bool {
        (**self).is_continuous()
    }
}

/// Endless silence.
#[derive(Debug, Default, Clone, Copy)]
pub struct Silence;

impl MonoSource for Silence {
    fn read(&mut self, out: &mut [f32]) -> usize {
        out.fill(0.0);
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
    fn test_silence_fills_request() {
        let mut buf = [1.0f32; 37];
        assert_eq!(Silence.read(&mut buf), 37);
        assert!(buf.iter().all(|s| *s == 0.0));
        assert!(Silence.is_continuous());
    }
}

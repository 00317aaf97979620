use super::SpatialSnapshot;
use super::binaural::BinauralSpatializer;
use super::native::Interpolation;
use super::pan::PanSpatializer;
use crate::context::AudioContext;
use crate::occlusion::OcclusionStage;
use crate::source::MonoSource;

/// The per-emitter spatialization strategy.
pub enum Spatializer {
    Binaural(BinauralSpatializer),
    /// Used when the process has no HRTF engine at all
    Panned(PanSpatializer),
}

impl Spatializer {
    /// HRTF when the context has an engine, constant-power panning otherwise.
    pub fn for_context(context: &AudioContext) -> Self {
        match context.hrtf() {
            Some(engine) => Self::Binaural(BinauralSpatializer::new(
                engine.as_ref(),
                context.desc().interpolation,
            )),
            None => Self::Panned(PanSpatializer::new(context.frame_size())),
        }
    }

    pub fn binaural(engine: &dyn super::HrtfEngine, interpolation: Interpolation) -> Self {
        Self::Binaural(BinauralSpatializer::new(engine, interpolation))
    }

    pub fn frame_size(&self) -> usize {
        match self {
            Self::Binaural(s) => s.frame_size(),
            Self::Panned(s) => s.frame_size(),
        }
    }

    fn process(&mut self, mono: &[f32], snapshot: &SpatialSnapshot, out: &mut [f32]) {
        match self {
            Self::Binaural(s) => {
                s.process(mono, snapshot, out);
            }
            Self::Panned(s) => s.process(mono, snapshot, out),
        }
    }

    fn dispose(&mut self) {
        if let Self::Binaural(s) = self {
            s.dispose();
        }
    }
}

/// Adapts a fixed-frame spatializer to reads of any size.
///
/// Each spatialized frame yields `2N` interleaved samples. Whatever a read
/// does not consume is parked in the overflow buffer and served first on the
/// next read, so no sample is dropped or repeated. Every read fills its
/// destination completely; past the end of the source the rest is silence.
pub struct FrameAdapter {
    source: Box<dyn MonoSource>,
    occlusion: OcclusionStage,
    spatializer: Spatializer,
    mono: Vec<f32>,
    stereo: Vec<f32>,
    overflow: Vec<f32>,
    overflow_offset: usize,
    overflow_count: usize,
    exhausted: bool,
}

impl FrameAdapter {
    pub fn new(
        source: Box<dyn MonoSource>,
        occlusion: OcclusionStage,
        spatializer: Spatializer,
    ) -> Self {
        let n = spatializer.frame_size();
        Self {
            source,
            occlusion,
            spatializer,
            mono: vec![0.0; n],
            stereo: vec![0.0; n * 2],
            overflow: vec![0.0; n * 2],
            overflow_offset: 0,
            overflow_count: 0,
            exhausted: false,
        }
    }

    pub fn frame_size(&self) -> usize {
        self.mono.len()
    }

    /// True once the source has run out; further reads are silence.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub(crate) fn overflow_count(&self) -> usize {
        self.overflow_count
    }

    /// Fills all of `out` with interleaved stereo and returns `out.len()`.
    pub fn read(&mut self, out: &mut [f32], snapshot: &SpatialSnapshot) -> usize {
        let frame_len = self.stereo.len();
        let mut written = 0;

        if self.overflow_count > 0 {
            let n = self.overflow_count.min(out.len());
            let start = self.overflow_offset;
            out[..n].copy_from_slice(&self.overflow[start..start + n]);
            self.overflow_offset += n;
            self.overflow_count -= n;
            written = n;
        }

        while written < out.len() {
            if self.exhausted || frame_len == 0 {
                out[written..].fill(0.0);
                break;
            }

            let got = self.source.read(&mut self.mono);
            if got == 0 {
                self.exhausted = true;
                out[written..].fill(0.0);
                break;
            }
            if got < self.mono.len() {
                self.mono[got..].fill(0.0);
                self.exhausted = true;
            }

            self.occlusion.process(&mut self.mono, &snapshot.direct);
            self.spatializer.process(&self.mono, snapshot, &mut self.stereo);

            let take = (out.len() - written).min(frame_len);
            out[written..written + take].copy_from_slice(&self.stereo[..take]);
            written += take;

            if take < frame_len {
                let excess = frame_len - take;
                self.overflow[..excess].copy_from_slice(&self.stereo[take..]);
                self.overflow_offset = 0;
                self.overflow_count = excess;
            }
        }

        out.len()
    }

    /// Releases the native effects. Safe to call more than once; later
    /// reads are silent.
    pub fn dispose(&mut self) {
        self.spatializer.dispose();
        self.occlusion.dispose();
        self.overflow_count = 0;
        self.overflow_offset = 0;
    }
}

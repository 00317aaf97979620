//! The process-wide audio context.
//!
//! One `AudioContext` is created at startup and passed by reference to every
//! emitter. It owns the native HRTF engine, if one could be brought up.

use crate::config::CueSonicDesc;
use crate::error::{CueSonicError, Result};
use crate::spatial::{HrtfEngine, SteamHrtfEngine};
use std::sync::Arc;

pub struct AudioContext {
    desc: CueSonicDesc,
    hrtf: Option<Arc<dyn HrtfEngine>>,
}

impl AudioContext {
    /// Validates `desc` and brings up the Steam Audio HRTF engine.
    ///
    /// Failure to create the engine is not an error: the context comes up
    /// without HRTF and every emitter falls back to stereo panning.
    pub fn new(desc: CueSonicDesc) -> Result<Self> {
        desc.validate()?;

        let hrtf: Option<Arc<dyn HrtfEngine>> = if desc.enable_hrtf {
            match SteamHrtfEngine::new(desc.sample_rate, desc.frame_size, desc.hrtf_path.as_deref())
            {
                Ok(engine) => Some(Arc::new(engine)),
                Err(e) => {
                    log::warn!("HRTF unavailable, falling back to stereo panning: {}", e);
                    None
                }
            }
        } else {
            log::info!("HRTF disabled, emitters will use stereo panning");
            None
        };

        Ok(Self { desc, hrtf })
    }

    /// Like [`new`](Self::new), but fails instead of falling back to panning
    /// when the HRTF engine cannot be created.
    pub fn with_required_hrtf(desc: CueSonicDesc) -> Result<Self> {
        desc.validate()?;
        let engine =
            SteamHrtfEngine::new(desc.sample_rate, desc.frame_size, desc.hrtf_path.as_deref())?;
        Ok(Self {
            desc,
            hrtf: Some(Arc::new(engine)),
        })
    }

    /// Builds a context around a caller-supplied engine (or none).
    ///
    /// The engine's frame size must match `desc.frame_size`.
    pub fn with_engine(desc: CueSonicDesc, hrtf: Option<Arc<dyn HrtfEngine>>) -> Result<Self> {
        desc.validate()?;
        if let Some(engine) = &hrtf {
            if engine.frame_size() != desc.frame_size {
                return Err(CueSonicError::SpatialAudio(format!(
                    "HRTF engine frame size {} does not match configured {}",
                    engine.frame_size(),
                    desc.frame_size
                )));
            }
        }
        Ok(Self { desc, hrtf })
    }

    pub fn desc(&self) -> &CueSonicDesc {
        &self.desc
    }

    pub fn hrtf(&self) -> Option<&Arc<dyn HrtfEngine>> {
        self.hrtf.as_ref()
    }

    pub fn has_hrtf(&self) -> bool {
        self.hrtf.is_some()
    }

    pub fn sample_rate(&self) -> u32 {
        self.desc.sample_rate
    }

    pub fn frame_size(&self) -> usize {
        self.desc.frame_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::testing::ReferenceEngine;

    #[test]
    fn test_disabled_hrtf_has_no_engine() {
        let ctx = AudioContext::new(CueSonicDesc::new().enable_hrtf(false)).unwrap();
        assert!(!ctx.has_hrtf());
        assert_eq!(ctx.frame_size(), 512);
        assert_eq!(ctx.sample_rate(), 48000);
    }

    #[test]
    fn test_with_engine_checks_frame_size() {
        let desc = CueSonicDesc::new().frame_size(256);
        let ok = AudioContext::with_engine(desc.clone(), Some(Arc::new(ReferenceEngine::new(256))));
        assert!(ok.unwrap().has_hrtf());

        let mismatched = AudioContext::with_engine(desc, Some(Arc::new(ReferenceEngine::new(128))));
        assert!(mismatched.is_err());
    }

    #[test]
    fn test_invalid_desc_rejected() {
        assert!(AudioContext::new(CueSonicDesc::new().sample_rate(0)).is_err());
    }

    #[test]
    fn test_required_hrtf_reports_missing_sofa() {
        let desc = CueSonicDesc::new().hrtf_path("/nonexistent/hrtf.sofa");
        let result = AudioContext::with_required_hrtf(desc);
        assert!(matches!(result, Err(CueSonicError::Native(_))));
    }
}

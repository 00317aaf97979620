use super::SpatialSnapshot;
use std::f32::consts::FRAC_PI_4;

/// Constant-power stereo panner used when no HRTF engine is available.
///
/// Gains glide linearly across each frame so pan changes do not click.
pub struct PanSpatializer {
    frame_size: usize,
    left_gain: f32,
    right_gain: f32,
}

impl PanSpatializer {
    pub fn new(frame_size: usize) -> Self {
        let (left_gain, right_gain) = pan_gains(0.0);
        Self {
            frame_size,
            left_gain,
            right_gain,
        }
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn process(&mut self, mono: &[f32], snapshot: &SpatialSnapshot, out: &mut [f32]) {
        let pan = if snapshot.pan.is_finite() { snapshot.pan } else { 0.0 };
        let (target_left, target_right) = pan_gains(pan);

        let frames = mono.len().min(out.len() / 2);
        let step = if frames > 0 { 1.0 / frames as f32 } else { 0.0 };
        for (i, (frame, sample)) in out.chunks_exact_mut(2).zip(mono).enumerate() {
            let t = (i + 1) as f32 * step;
            let l = self.left_gain + (target_left - self.left_gain) * t;
            let r = self.right_gain + (target_right - self.right_gain) * t;
            frame[0] = sample * l;
            frame[1] = sample * r;
        }
        out[frames * 2..].fill(0.0);

        self.left_gain = target_left;
        self.right_gain = target_right;
    }
}

/// Constant-power gains for a pan in [-1, 1].
pub fn pan_gains(pan: f32) -> (f32, f32) {
    let angle = (pan.clamp(-1.0, 1.0) + 1.0) * FRAC_PI_4;
    (angle.cos(), angle.sin())
}

//! Mixer registry and render-side summing.
//!
//! The mixer is split in two halves connected by channels:
//!
//! - [`Mixer`] lives on the control/simulation side. It hands out input ids,
//!   tracks the registered set and sends add/remove commands.
//! - [`MixerRenderer`] lives on the audio thread. It applies pending commands
//!   at the start of each pull, sums every input into the output, and ships
//!   removed inputs back so they are dropped off the audio thread.
//!
//! Registration never stops the device and never blocks the render side.

use crate::config::CueSonicDesc;
use crate::error::{CueSonicError, Result};
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded, unbounded};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

pub type InputId = u64;

/// A provider of interleaved stereo samples, pulled on the audio thread.
pub trait MixerInput: Send {
    /// Overwrites all of `out` with interleaved stereo samples.
    fn read(&mut self, out: &mut [f32]);
}

enum MixerCommand {
    Add(InputId, Box<dyn MixerInput>),
    Remove(InputId),
}

struct MixerShared {
    commands: Sender<MixerCommand>,
    retired: Receiver<Box<dyn MixerInput>>,
    registered: Mutex<HashSet<InputId>>,
    next_id: AtomicU64,
}

/// Control-side handle to the mixer registry. Cheap to clone.
#[derive(Clone)]
pub struct Mixer {
    shared: Arc<MixerShared>,
}

impl Mixer {
    /// Creates the registry and its unique render half.
    pub fn new(desc: &CueSonicDesc) -> (Mixer, MixerRenderer) {
        let (command_sender, command_receiver) = unbounded();
        let (retired_sender, retired_receiver) = bounded(desc.max_emitters.max(1));

        let mixer = Mixer {
            shared: Arc::new(MixerShared {
                commands: command_sender,
                retired: retired_receiver,
                registered: Mutex::new(HashSet::with_capacity(desc.max_emitters)),
                next_id: AtomicU64::new(1),
            }),
        };

        let renderer = MixerRenderer {
            commands: command_receiver,
            retired: retired_sender,
            inputs: Vec::with_capacity(desc.max_emitters),
            scratch: vec![0.0; desc.pull_frames() * 2],
        };

        (mixer, renderer)
    }

    /// Registers an input. It starts contributing on the renderer's next pull.
    pub fn add_input(&self, input: Box<dyn MixerInput>) -> Result<InputId> {
        self.collect_retired();
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        self.shared
            .commands
            .send(MixerCommand::Add(id, input))
            .map_err(|_| CueSonicError::Engine("Mixer renderer is gone".into()))?;
        self.registered().insert(id);
        log::debug!("Mixer: registered input {}", id);
        Ok(id)
    }

    /// Deregisters an input. Unknown ids are a no-op and return false.
    pub fn remove_input(&self, id: InputId) -> bool {
        self.collect_retired();
        if !self.registered().remove(&id) {
            return false;
        }
        if self.shared.commands.send(MixerCommand::Remove(id)).is_err() {
            log::debug!("Mixer: renderer gone, input {} dropped with it", id);
        } else {
            log::debug!("Mixer: deregistered input {}", id);
        }
        true
    }

    pub fn contains(&self, id: InputId) -> bool {
        self.registered().contains(&id)
    }

    pub fn input_count(&self) -> usize {
        self.registered().len()
    }

    /// Snapshot of the registered ids.
    pub fn registered_ids(&self) -> HashSet<InputId> {
        self.registered().clone()
    }

    /// Drops inputs the renderer has retired. Returns how many were dropped.
    ///
    /// Also runs on every [`add_input`](Self::add_input) and
    /// [`remove_input`](Self::remove_input), so the retired queue drains
    /// without the caller polling.
    pub fn collect_retired(&self) -> usize {
        self.shared.retired.try_iter().count()
    }

    fn registered(&self) -> std::sync::MutexGuard<'_, HashSet<InputId>> {
        self.shared
            .registered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Render half of the mixer. Owned by whatever drives the audio callback.
pub struct MixerRenderer {
    commands: Receiver<MixerCommand>,
    retired: Sender<Box<dyn MixerInput>>,
    inputs: Vec<(InputId, Box<dyn MixerInput>)>,
    scratch: Vec<f32>,
}

impl MixerRenderer {
    #[cfg(test)]
    pub(crate) fn scratch_len(&self) -> usize {
        self.scratch.len()
    }

    /// Sums every registered input into `out` (interleaved stereo).
    pub fn render(&mut self, out: &mut [f32]) {
        self.apply_commands();

        out.fill(0.0);
        if self.inputs.is_empty() {
            return;
        }

        if self.scratch.len() < out.len() {
            log::warn!(
                "Mixer: growing scratch buffer from {} to {} samples",
                self.scratch.len(),
                out.len()
            );
            self.scratch.resize(out.len(), 0.0);
        }
        let scratch = &mut self.scratch[..out.len()];

        for (_, input) in self.inputs.iter_mut() {
            input.read(scratch);
            for (o, s) in out.iter_mut().zip(scratch.iter()) {
                *o += *s;
            }
        }
    }

    /// Number of inputs currently being summed.
    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    fn apply_commands(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            match command {
                MixerCommand::Add(id, input) => self.inputs.push((id, input)),
                MixerCommand::Remove(id) => {
                    let Some(index) = self.inputs.iter().position(|(i, _)| *i == id) else {
                        continue;
                    };
                    let (_, input) = self.inputs.swap_remove(index);
                    if let Err(TrySendError::Full(input) | TrySendError::Disconnected(input)) =
                        self.retired.try_send(input)
                    {
                        log::warn!("Mixer: retired queue unavailable, dropping input {} in place", id);
                        drop(input);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct Constant(f32);

    /// Counts how many instances have been dropped.
    struct Counted(Arc<AtomicUsize>);

    impl MixerInput for Counted {
        fn read(&mut self, out: &mut [f32]) {
            out.fill(0.0);
        }
    }

    impl Drop for Counted {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl MixerInput for Constant {
        fn read(&mut self, out: &mut [f32]) {
            out.fill(self.0);
        }
    }

    fn desc() -> CueSonicDesc {
        CueSonicDesc::new().frame_size(16).max_emitters(4)
    }

    #[test]
    fn test_render_sums_inputs() {
        let (mixer, mut renderer) = Mixer::new(&desc());
        mixer.add_input(Box::new(Constant(0.25))).unwrap();
        mixer.add_input(Box::new(Constant(0.5))).unwrap();

        let mut out = [0.0; 32];
        renderer.render(&mut out);
        assert_eq!(renderer.input_count(), 2);
        assert!(out.iter().all(|s| (*s - 0.75).abs() < 1e-6));
    }

    #[test]
    fn test_empty_mixer_renders_silence() {
        let (_mixer, mut renderer) = Mixer::new(&desc());
        let mut out = [1.0; 8];
        renderer.render(&mut out);
        assert!(out.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_registration_is_idempotent() {
        let (mixer, mut renderer) = Mixer::new(&desc());
        let resident = mixer.add_input(Box::new(Constant(0.1))).unwrap();
        let baseline = mixer.registered_ids();

        let mut out = [0.0; 32];
        for _ in 0..2 {
            let id = mixer.add_input(Box::new(Constant(0.5))).unwrap();
            renderer.render(&mut out);
            assert!(mixer.contains(id));
            assert!(mixer.remove_input(id));
            assert!(!mixer.remove_input(id));
            renderer.render(&mut out);
        }

        assert_eq!(mixer.registered_ids(), baseline);
        assert!(mixer.contains(resident));
        assert_eq!(renderer.input_count(), 1);
        assert!(out.iter().all(|s| (*s - 0.1).abs() < 1e-6));
        // The first retired input was already drained by the second add.
        assert_eq!(mixer.collect_retired(), 1);
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let (mixer, mut renderer) = Mixer::new(&desc());
        assert!(!mixer.remove_input(42));
        assert_eq!(mixer.input_count(), 0);
        let mut out = [0.0; 8];
        renderer.render(&mut out);
        assert_eq!(mixer.collect_retired(), 0);
    }

    #[test]
    fn test_add_and_remove_before_first_pull() {
        let (mixer, mut renderer) = Mixer::new(&desc());
        let id = mixer.add_input(Box::new(Constant(1.0))).unwrap();
        mixer.remove_input(id);

        let mut out = [0.0; 8];
        renderer.render(&mut out);
        assert_eq!(renderer.input_count(), 0);
        assert!(out.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_add_fails_without_renderer() {
        let (mixer, renderer) = Mixer::new(&desc());
        drop(renderer);
        assert!(mixer.add_input(Box::new(Constant(1.0))).is_err());
        assert_eq!(mixer.input_count(), 0);
    }

    #[test]
    fn test_scratch_grows_for_large_pulls() {
        let (mixer, mut renderer) = Mixer::new(&desc());
        mixer.add_input(Box::new(Constant(0.5))).unwrap();
        let mut out = vec![0.0; 1024];
        renderer.render(&mut out);
        assert!(out.iter().all(|s| (*s - 0.5).abs() < 1e-6));
    }

    #[test]
    fn test_device_pull_does_not_grow_scratch() {
        for desc in [desc(), desc().buffer_size(100)] {
            let (mixer, mut renderer) = Mixer::new(&desc);
            mixer.add_input(Box::new(Constant(0.5))).unwrap();
            let before = renderer.scratch_len();

            let mut out = vec![0.0; desc.pull_frames() * 2];
            renderer.render(&mut out);
            assert_eq!(renderer.scratch_len(), before);
            assert!(out.iter().all(|s| (*s - 0.5).abs() < 1e-6));
        }
    }

    #[test]
    fn test_churn_drains_retired_queue() {
        let desc = CueSonicDesc::new().frame_size(16).max_emitters(2);
        let (mixer, mut renderer) = Mixer::new(&desc);
        let dropped = Arc::new(AtomicUsize::new(0));

        let mut out = [0.0; 32];
        for _ in 0..5 {
            let id = mixer.add_input(Box::new(Counted(dropped.clone()))).unwrap();
            renderer.render(&mut out);
            mixer.remove_input(id);
            renderer.render(&mut out);
        }

        // Every earlier input was released on this thread by add/remove;
        // only the last one is still queued.
        assert_eq!(dropped.load(Ordering::SeqCst), 4);
        assert_eq!(mixer.collect_retired(), 1);
        assert_eq!(dropped.load(Ordering::SeqCst), 5);
    }
}

//! Background timed tone effects.
//!
//! A [`ToneSequence`] is a list of tones and rests with durations. Sequences
//! play on [`CueChannel`]s, which are plain mixer inputs rendering an
//! oscillator. One [`ToneSequencer`] worker thread paces every channel from a
//! deadline queue, so any number of sequences can run without a thread each.
//! Stepping only blocks the worker; the simulation and audio threads never
//! wait on it.
//!
//! The worker hands each step to its channel through a small queue. The voice
//! plays every step for its duration in samples and holds the last one until
//! the next arrives, so steps shorter than a device pull are not lost.

use crate::error::{CueSonicError, Result};
use crate::mixer::{InputId, Mixer, MixerInput};
use crate::source::{CueKind, Oscillator, ToneSpec};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError, bounded, unbounded};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

/// One step of a sequence. `tone: None` is a rest.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneStep {
    pub tone: Option<ToneSpec>,
    pub duration: Duration,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToneSequence {
    steps: Vec<ToneStep>,
}

impl ToneSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tone(mut self, tone: ToneSpec, duration: Duration) -> Self {
        self.steps.push(ToneStep {
            tone: Some(tone),
            duration,
        });
        self
    }

    pub fn rest(mut self, duration: Duration) -> Self {
        self.steps.push(ToneStep {
            tone: None,
            duration,
        });
        self
    }

    /// `count` repetitions of `tone`, separated by `gap`.
    pub fn repeated(tone: ToneSpec, count: usize, on: Duration, gap: Duration) -> Self {
        let mut sequence = Self::new();
        for i in 0..count {
            if i > 0 {
                sequence = sequence.rest(gap);
            }
            sequence = sequence.tone(tone, on);
        }
        sequence
    }

    /// A single blip of the tone mapped to `kind`.
    pub fn cue(kind: CueKind, duration: Duration) -> Self {
        Self::new().tone(kind.tone(), duration)
    }

    pub fn steps(&self) -> &[ToneStep] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn total_duration(&self) -> Duration {
        self.steps.iter().map(|s| s.duration).sum()
    }
}

/// Capacity of each channel's pending step queue.
const STEP_QUEUE: usize = 16;

/// Attack and release length of the cue envelope, in frames.
const RAMP_FRAMES: usize = 48;

/// One published tone change. Timed steps are played for exactly `hold`;
/// untimed ones last until the next step arrives.
#[derive(Debug, Clone, Copy, PartialEq)]
struct StepEvent {
    tone: Option<ToneSpec>,
    hold: Option<Duration>,
    generation: u64,
}

#[derive(Debug)]
struct ChannelState {
    /// Last published tone, for observers on the control side
    tone: Mutex<Option<ToneSpec>>,
    closed: AtomicBool,
    /// Bumped whenever a step must cut off everything queued before it
    generation: AtomicU64,
    steps: Sender<StepEvent>,
    pending: Receiver<StepEvent>,
}

impl ChannelState {
    fn new() -> Self {
        let (steps, pending) = bounded(STEP_QUEUE);
        Self {
            tone: Mutex::new(None),
            closed: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            steps,
            pending,
        }
    }

    /// Queues a step for the voice. `preempt` drops whatever is still queued
    /// or playing. Returns false once the channel is closed.
    fn publish(&self, tone: Option<ToneSpec>, hold: Option<Duration>, preempt: bool) -> bool {
        if self.closed.load(Ordering::Acquire) {
            return false;
        }
        self.push(tone, hold, preempt);
        true
    }

    fn set_tone(&self, tone: Option<ToneSpec>) -> bool {
        self.publish(tone, None, true)
    }

    fn silence(&self) {
        self.push(None, None, true);
    }

    fn push(&self, tone: Option<ToneSpec>, hold: Option<Duration>, preempt: bool) {
        let generation = if preempt {
            let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
            for _ in self.pending.try_iter() {}
            generation
        } else {
            self.generation.load(Ordering::Acquire)
        };
        *self.tone.lock().unwrap_or_else(PoisonError::into_inner) = tone;

        let mut event = StepEvent {
            tone,
            hold,
            generation,
        };
        // Nobody is rendering: make room by dropping the oldest step.
        while let Err(TrySendError::Full(rejected)) = self.steps.try_send(event) {
            let _ = self.pending.try_recv();
            event = rejected;
        }
    }

    fn current(&self) -> Option<ToneSpec> {
        *self.tone.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A non-spatial mixer input that plays the tone steps published to it.
pub struct CueChannel {
    id: InputId,
    state: Arc<ChannelState>,
    mixer: Mixer,
}

impl CueChannel {
    /// Registers a new silent channel with the mixer.
    pub fn new(mixer: &Mixer, sample_rate: u32) -> Result<Self> {
        let state = Arc::new(ChannelState::new());
        let voice = CueVoice {
            state: Arc::clone(&state),
            oscillator: Oscillator::new(ToneSpec::sine(440.0, 0.0), sample_rate),
            sample_rate,
            step: None,
            envelope: 0.0,
        };
        let id = mixer.add_input(Box::new(voice))?;
        Ok(Self {
            id,
            state,
            mixer: mixer.clone(),
        })
    }

    pub fn id(&self) -> InputId {
        self.id
    }

    /// Sets the tone directly, bypassing any sequencer. Holds until changed.
    pub fn set_tone(&self, tone: Option<ToneSpec>) -> Result<()> {
        if self.state.set_tone(tone) {
            Ok(())
        } else {
            Err(CueSonicError::ChannelClosed(self.id))
        }
    }

    pub fn current_tone(&self) -> Option<ToneSpec> {
        self.state.current()
    }

    pub fn is_closed(&self) -> bool {
        self.state.closed.load(Ordering::Acquire)
    }

    /// Silences the channel and removes it from the mixer. Idempotent.
    pub fn close(&self) {
        self.state.silence();
        if !self.state.closed.swap(true, Ordering::AcqRel) {
            self.mixer.remove_input(self.id);
        }
    }
}

impl Drop for CueChannel {
    fn drop(&mut self) {
        self.close();
    }
}

/// The step a voice is currently rendering.
#[derive(Debug, Clone, Copy)]
struct ActiveStep {
    tone: Option<ToneSpec>,
    /// Frames left before the next step may start; None = until replaced
    remaining: Option<usize>,
    generation: u64,
}

impl ActiveStep {
    fn can_advance(&self) -> bool {
        self.remaining.is_none_or(|frames| frames == 0)
    }
}

/// Render side of a [`CueChannel`]. Steps are timed in samples, so a step
/// shorter than one pull is still played for its full length.
struct CueVoice {
    state: Arc<ChannelState>,
    oscillator: Oscillator,
    sample_rate: u32,
    step: Option<ActiveStep>,
    envelope: f32,
}

impl CueVoice {
    fn is_idle(&self) -> bool {
        self.step
            .is_none_or(|step| step.tone.is_none() && step.remaining.is_none())
    }

    /// Starts the next queued step. Steps from before the latest preemption
    /// are skipped. Returns false if nothing was queued.
    fn next_step(&mut self, latest: u64) -> bool {
        while let Ok(event) = self.state.pending.try_recv() {
            if event.generation < latest {
                continue;
            }
            if let Some(spec) = event.tone {
                if self.envelope == 0.0 {
                    self.oscillator.reset();
                }
                self.oscillator.set_tone(spec);
            }
            self.step = Some(ActiveStep {
                tone: event.tone,
                remaining: event.hold.map(|hold| {
                    ((hold.as_secs_f64() * self.sample_rate as f64).round() as usize).max(1)
                }),
                generation: event.generation,
            });
            return true;
        }
        false
    }
}

impl MixerInput for CueVoice {
    fn read(&mut self, out: &mut [f32]) {
        let latest = self.state.generation.load(Ordering::Acquire);
        if self.step.is_some_and(|step| step.generation < latest) {
            self.step = None;
        }

        if self.envelope == 0.0 && self.is_idle() {
            self.next_step(latest);
            if self.is_idle() {
                out.fill(0.0);
                return;
            }
        }

        let ramp = 1.0 / RAMP_FRAMES as f32;
        let mut queue_empty = false;
        for frame in out.chunks_exact_mut(2) {
            if !queue_empty && self.step.is_none_or(|step| step.can_advance()) {
                queue_empty = !self.next_step(latest);
            }

            let sounding = self.step.is_some_and(|step| step.tone.is_some());
            self.envelope = if sounding {
                (self.envelope + ramp).min(1.0)
            } else {
                (self.envelope - ramp).max(0.0)
            };
            let sample = if self.envelope > 0.0 {
                self.oscillator.next_sample() * self.envelope
            } else {
                0.0
            };
            frame[0] = sample;
            frame[1] = sample;

            if let Some(ActiveStep {
                remaining: Some(frames),
                ..
            }) = self.step.as_mut()
            {
                *frames = frames.saturating_sub(1);
            }
        }
    }
}

enum SequencerCommand {
    Play {
        channel: InputId,
        state: Arc<ChannelState>,
        sequence: ToneSequence,
    },
    Stop(InputId),
    Shutdown,
}

/// Background scheduler that plays [`ToneSequence`]s on [`CueChannel`]s.
pub struct ToneSequencer {
    commands: Sender<SequencerCommand>,
    worker: Option<thread::JoinHandle<()>>,
}

impl ToneSequencer {
    pub fn new() -> Result<Self> {
        let (commands, receiver) = unbounded();
        let worker = thread::Builder::new()
            .name("cuesonic-sequencer".to_string())
            .spawn(move || SequencerWorker::default().run(receiver))?;
        Ok(Self {
            commands,
            worker: Some(worker),
        })
    }

    /// Starts `sequence` on `channel`, replacing whatever it was playing.
    pub fn play(&self, channel: &CueChannel, sequence: ToneSequence) -> Result<()> {
        if channel.is_closed() {
            return Err(CueSonicError::ChannelClosed(channel.id));
        }
        self.send(SequencerCommand::Play {
            channel: channel.id,
            state: Arc::clone(&channel.state),
            sequence,
        })
    }

    /// Stops the channel's sequence and silences it.
    pub fn stop(&self, channel: &CueChannel) -> Result<()> {
        self.send(SequencerCommand::Stop(channel.id))
    }

    fn send(&self, command: SequencerCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| CueSonicError::Engine("Sequencer thread is gone".into()))
    }
}

impl Drop for ToneSequencer {
    fn drop(&mut self) {
        let _ = self.commands.send(SequencerCommand::Shutdown);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("Sequencer thread panicked");
            }
        }
    }
}

struct Playback {
    state: Arc<ChannelState>,
    steps: Vec<ToneStep>,
    next: usize,
    generation: u64,
}

#[derive(Default)]
struct SequencerWorker {
    playing: HashMap<InputId, Playback>,
    deadlines: BinaryHeap<Reverse<(Instant, InputId, u64)>>,
    generation: u64,
}

impl SequencerWorker {
    fn run(mut self, commands: Receiver<SequencerCommand>) {
        log::debug!("Sequencer thread started");
        loop {
            let command = match self.deadlines.peek() {
                Some(Reverse((at, _, _))) => {
                    commands.recv_timeout(at.saturating_duration_since(Instant::now()))
                }
                None => commands.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };

            match command {
                Ok(SequencerCommand::Play {
                    channel,
                    state,
                    sequence,
                }) => self.start(channel, state, sequence),
                Ok(SequencerCommand::Stop(channel)) => {
                    if let Some(playback) = self.playing.remove(&channel) {
                        playback.state.set_tone(None);
                    }
                }
                Ok(SequencerCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {}
            }

            self.fire_due(Instant::now());
        }

        for playback in self.playing.values() {
            playback.state.set_tone(None);
        }
        log::debug!("Sequencer thread stopped");
    }

    fn start(&mut self, channel: InputId, state: Arc<ChannelState>, sequence: ToneSequence) {
        self.generation += 1;
        self.playing.insert(
            channel,
            Playback {
                state,
                steps: sequence.steps,
                next: 0,
                generation: self.generation,
            },
        );
        self.deadlines
            .push(Reverse((Instant::now(), channel, self.generation)));
    }

    fn fire_due(&mut self, now: Instant) {
        while let Some(Reverse((at, channel, generation))) = self.deadlines.peek().copied() {
            if at > now {
                break;
            }
            self.deadlines.pop();
            if let Err(e) = self.advance(channel, generation, at) {
                log::error!("Sequencer step failed: {}", e);
            }
        }
    }

    fn advance(&mut self, channel: InputId, generation: u64, due: Instant) -> Result<()> {
        let Some(playback) = self.playing.get_mut(&channel) else {
            return Ok(());
        };
        // Superseded by a newer sequence on the same channel.
        if playback.generation != generation {
            return Ok(());
        }

        let Some(step) = playback.steps.get(playback.next).copied() else {
            playback.state.publish(None, None, false);
            self.playing.remove(&channel);
            return Ok(());
        };
        // The first step cuts off whatever the channel was playing before.
        let preempt = playback.next == 0;
        playback.next += 1;

        if !playback
            .state
            .publish(step.tone, Some(step.duration), preempt)
        {
            self.playing.remove(&channel);
            return Err(CueSonicError::ChannelClosed(channel));
        }

        self.deadlines
            .push(Reverse((due + step.duration, channel, generation)));
        Ok(())
    }
}

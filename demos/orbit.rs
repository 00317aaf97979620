//! Orbits a beeping emitter around the listener while a tone sequence plays.
//!
//! Run with `RUST_LOG=info cargo run --example orbit`.

use anyhow::Context as _;
use cuesonic::*;
use std::f32::consts::TAU;
use std::time::{Duration, Instant};

const TICK: Duration = Duration::from_millis(16);
const ORBIT_RADIUS: f32 = 6.0;
const ORBIT_PERIOD_SECS: f32 = 4.0;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let desc = CueSonicDesc::default();
    let context = AudioContext::new(desc.clone()).context("creating audio context")?;
    let (mixer, renderer) = Mixer::new(&desc);
    let output = OutputDevice::open(desc.clone(), renderer).context("opening output device")?;

    let mut emitter = Emitter::new(
        &context,
        &mixer,
        Oscillator::for_cue(CueKind::Beep, desc.sample_rate),
    )?;
    emitter.activate(Vec3::new(ORBIT_RADIUS, 0.0, 0.0));

    let sequencer = ToneSequencer::new()?;
    let channel = CueChannel::new(&mixer, desc.sample_rate)?;
    let melody = ToneSequence::new()
        .tone(ToneSpec::sine(523.25, 0.1), Duration::from_millis(200))
        .rest(Duration::from_millis(100))
        .tone(ToneSpec::sine(659.25, 0.1), Duration::from_millis(200))
        .rest(Duration::from_millis(100))
        .tone(ToneSpec::sine(783.99, 0.1), Duration::from_millis(400));
    sequencer.play(&channel, melody)?;

    let listener = ListenerBasis::default();
    let params = AttenuationParams::new(20.0, 0.01, 0.5);
    let start = Instant::now();

    while start.elapsed() < Duration::from_secs(8) {
        let angle = start.elapsed().as_secs_f32() / ORBIT_PERIOD_SECS * TAU;
        emitter.set_position(Vec3::new(angle.cos(), 0.0, angle.sin()) * ORBIT_RADIUS);
        let mix = emitter.update(&listener, &params, None);
        log::debug!(
            "direction {:?} volume {:.3} pan {:.2}",
            mix.direction,
            mix.volume,
            mix.pan
        );

        if start.elapsed() > Duration::from_secs(6) && emitter.is_active() {
            log::info!("Deactivating emitter");
            emitter.deactivate();
        }
        std::thread::sleep(TICK);
    }

    log::info!("Rendered {} frames", output.frames_processed());

    emitter.dispose();
    channel.close();
    std::thread::sleep(Duration::from_millis(50));
    mixer.collect_retired();
    Ok(())
}

//! # 02 - Live Tuner
//!
//! Print the pitch of the default input device for ten seconds.
//!
//! **Concepts:** record mode, `PromptPermission`, device listing
//!
//! ```bash
//! cargo run --example 02_live_tuner
//! ```

use pitchline::prelude::*;
use std::time::Duration;

struct Tuner;

impl PitchListener for Tuner {
    fn on_pitch(&self, pitch: Pitch) {
        println!("{:<4} {:+5.1} cents", pitch.note().name(), pitch.cents_offset());
    }

    fn on_error(&self, error: Error) {
        if !error.is_recoverable() {
            eprintln!("error: {error}");
        }
    }
}

fn main() -> pitchline::Result<()> {
    for name in pitchline::InputSource::list_devices()? {
        println!("Input device: {name}");
    }

    let permission = Arc::new(PromptPermission::new(|| {
        println!("Recording from the microphone. Press Enter to allow.");
        let mut line = String::new();
        std::io::stdin().read_line(&mut line).is_ok()
    }));

    let tuner = Arc::new(Tuner);
    let engine = PitchEngine::builder()
        .buffer_size(2048)
        .transform(TransformStrategy::Passthrough)
        .estimation(EstimationStrategy::Yin)
        .permission(permission)
        .listener(&tuner)
        .build()?;

    engine.start()?;
    std::thread::sleep(Duration::from_secs(10));
    engine.stop();

    Ok(())
}

//! # 01 - File Tuner
//!
//! Analyse a WAV file and print the detected notes.
//!
//! **Concepts:** `audio_file()`, `PitchListener`, `on_finished`
//!
//! ```bash
//! AUDIO_FILE=/path/to/voice.wav cargo run --example 01_file_tuner
//! ```

use crossbeam_channel::{bounded, Sender};
use parking_lot::Mutex;
use pitchline::prelude::*;

struct Printer {
    done: Mutex<Option<Sender<()>>>,
}

impl PitchListener for Printer {
    fn on_pitch(&self, pitch: Pitch) {
        println!(
            "{:>8.2} Hz  {:<4} {:+5.1} cents",
            pitch.frequency(),
            pitch.note().name(),
            pitch.cents_offset()
        );
    }

    fn on_error(&self, error: Error) {
        if error.is_recoverable() {
            println!("       -   ({error})");
        } else {
            eprintln!("error: {error}");
            self.finish();
        }
    }

    fn on_finished(&self) {
        println!("done");
        self.finish();
    }
}

impl Printer {
    fn finish(&self) {
        if let Some(tx) = self.done.lock().take() {
            let _ = tx.send(());
        }
    }
}

fn main() -> pitchline::Result<()> {
    let Ok(path) = std::env::var("AUDIO_FILE") else {
        println!("Set AUDIO_FILE=/path/to/your.wav");
        return Ok(());
    };

    let (tx, rx) = bounded(1);
    let printer = Arc::new(Printer {
        done: Mutex::new(Some(tx)),
    });

    let engine = PitchEngine::builder()
        .audio_file(&path)
        .transform(TransformStrategy::Fft)
        .estimation(EstimationStrategy::Quadratic)
        .realtime_playback(false)
        .listener(&printer)
        .build()?;

    println!("Analysing: {path}");
    engine.start()?;
    let _ = rx.recv();

    Ok(())
}

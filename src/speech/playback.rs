//! Local MP3 playback through rodio.

use std::io::Cursor;

use rodio::{Decoder, OutputStreamBuilder, Sink};
use tracing::{debug, info};

use crate::error::AppError;

/// Play MP3 bytes on the default output device, blocking until finished.
pub fn play_mp3_blocking(audio: Vec<u8>) -> Result<(), AppError> {
    let stream = OutputStreamBuilder::open_default_stream()
        .map_err(|e| AppError::Playback(format!("failed to open audio output: {e}")))?;

    // rodio 0.21: Sink::connect_new takes &Mixer
    let sink = Sink::connect_new(stream.mixer());
    let source = Decoder::new(Cursor::new(audio))
        .map_err(|e| AppError::Playback(format!("failed to decode MP3: {e}")))?;
    sink.append(source);

    info!("Playing audio...");
    sink.sleep_until_end();
    debug!("Playback finished");
    Ok(())
}

/// Async wrapper that keeps the blocking sink off the runtime threads.
pub async fn play_mp3(audio: Vec<u8>) -> Result<(), AppError> {
    tokio::task::spawn_blocking(move || play_mp3_blocking(audio))
        .await
        .map_err(|e| AppError::Playback(format!("playback task failed: {e}")))?
}

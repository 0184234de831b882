//! Speech pipeline collaborators.
//!
//! Components:
//! - `tts`: Google Translate speech RPC, text → MP3 bytes
//! - `translator`: Google Translate text endpoint, used before synthesis
//! - `playback`: rodio playback of the generated MP3

pub mod playback;
pub mod translator;
pub mod tts;

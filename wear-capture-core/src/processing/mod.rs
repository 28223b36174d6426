//! Audio payload handling: codec expansion and WAV assembly.

pub mod assembler;
pub mod mulaw;
pub mod wav_format;

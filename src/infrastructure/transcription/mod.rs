//! Transcription engine adapters

pub mod engine_cli;

pub use engine_cli::EngineCliTranscriber;

//! ScribeFleet - chat-driven transcription service on ephemeral workers
//!
//! This crate accepts transcription requests from a chat transport, queues
//! them under global and per-submitter concurrency limits, provisions a
//! short-lived worker per job, runs the transcription remotely, and delivers
//! the transcript back to the conversation.
//!
//! # Architecture
//!
//! The crate follows hexagonal (ports & adapters) architecture:
//!
//! - **Domain**: Job entity and lifecycle, value objects, errors
//! - **Application**: Scheduler, job runner, cache warmer, and port interfaces (traits)
//! - **Infrastructure**: Adapter implementations (OpenSSH, tfcmd, Telegram, etc.)
//! - **CLI**: Command-line interface and configuration commands

pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;

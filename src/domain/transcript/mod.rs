//! Transcription value objects and the remote engine result format

use serde::Deserialize;
use thiserror::Error;

use crate::domain::error::JobError;

/// Model tiers offered to submitters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ModelTier {
    /// Fast, low-fidelity model
    Tiny,
    /// High-fidelity model with fast-preview support
    #[default]
    Turbo,
}

impl ModelTier {
    pub const ALL: &'static [ModelTier] = &[ModelTier::Tiny, ModelTier::Turbo];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Tiny => "tiny",
            Self::Turbo => "turbo",
        }
    }

    /// Whether jobs on this tier get a preliminary local fast pass while the
    /// main job is queued.
    pub const fn supports_preview(&self) -> bool {
        matches!(self, Self::Turbo)
    }
}

impl std::fmt::Display for ModelTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error when an unknown model tier is requested
#[derive(Debug, Clone, Error)]
#[error("Invalid model: \"{input}\". Valid models are: tiny, turbo")]
pub struct InvalidModelError {
    pub input: String,
}

impl std::str::FromStr for ModelTier {
    type Err = InvalidModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tiny" => Ok(Self::Tiny),
            "turbo" => Ok(Self::Turbo),
            _ => Err(InvalidModelError { input: s.to_string() }),
        }
    }
}

/// Transcription language selection: `auto` or an ISO 639-1 code with an
/// optional region suffix (`en`, `es`, `pt-BR`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Language(String);

impl Language {
    pub fn auto() -> Self {
        Self("auto".to_string())
    }

    pub fn is_auto(&self) -> bool {
        self.0 == "auto"
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Language {
    fn default() -> Self {
        Self::auto()
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Error when an invalid language code is provided
#[derive(Debug, Clone, Error)]
#[error("Invalid language code: \"{input}\". Use 'auto' or ISO 639-1 codes like en, es, de")]
pub struct InvalidLanguageError {
    pub input: String,
}

fn is_valid_language_code(s: &str) -> bool {
    let bytes = s.as_bytes();
    match bytes.len() {
        2 => bytes.iter().all(|b| b.is_ascii_lowercase()),
        5 => {
            bytes[..2].iter().all(|b| b.is_ascii_lowercase())
                && bytes[2] == b'-'
                && bytes[3..].iter().all(|b| b.is_ascii_uppercase())
        }
        _ => false,
    }
}

impl std::str::FromStr for Language {
    type Err = InvalidLanguageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed == "auto" || is_valid_language_code(trimmed) {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(InvalidLanguageError { input: s.to_string() })
        }
    }
}

/// Structured result printed by the transcription engine as the single
/// trailing line of its output.
#[derive(Debug, Clone, Deserialize)]
pub struct RunOutcome {
    pub ok: bool,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub duration_sec: Option<f64>,
    #[serde(default)]
    pub text_path: Option<String>,
    #[serde(default)]
    pub chars: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
}

impl RunOutcome {
    /// Parse the last non-empty output line as the result.
    pub fn parse(output: &str) -> Result<Self, JobError> {
        let line = output
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .ok_or_else(|| JobError::MalformedResult("engine produced no output".to_string()))?;
        serde_json::from_str(line.trim())
            .map_err(|e| JobError::MalformedResult(format!("{e} in {:?}", clip_chars(line, 200))))
    }

    /// Classify an `ok: false` result into the failure taxonomy, keyed on the
    /// engine's error-code prefix.
    pub fn engine_error(&self) -> JobError {
        let detail = self
            .error
            .clone()
            .unwrap_or_else(|| "transcription failed".to_string());
        if detail.starts_with("E_FFMPEG_TIMEOUT") {
            JobError::ConversionTimeout
        } else if detail.starts_with("E_INPUT") {
            JobError::InputNotFound(detail)
        } else {
            JobError::Engine(detail)
        }
    }
}

/// Clip text to at most `limit` characters, respecting UTF-8 boundaries.
pub fn clip_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_tier_parses() {
        assert_eq!("tiny".parse::<ModelTier>().unwrap(), ModelTier::Tiny);
        assert_eq!("TURBO".parse::<ModelTier>().unwrap(), ModelTier::Turbo);
        assert!("large-v3".parse::<ModelTier>().is_err());
    }

    #[test]
    fn only_turbo_supports_preview() {
        assert!(ModelTier::Turbo.supports_preview());
        assert!(!ModelTier::Tiny.supports_preview());
    }

    #[test]
    fn language_accepts_auto_and_iso_codes() {
        assert!("auto".parse::<Language>().unwrap().is_auto());
        assert_eq!("en".parse::<Language>().unwrap().as_str(), "en");
        assert_eq!("pt-BR".parse::<Language>().unwrap().as_str(), "pt-BR");
    }

    #[test]
    fn language_rejects_bad_codes() {
        assert!("english".parse::<Language>().is_err());
        assert!("EN".parse::<Language>().is_err());
        assert!("pt-br".parse::<Language>().is_err());
        assert!("".parse::<Language>().is_err());
    }

    #[test]
    fn outcome_parses_trailing_line() {
        let output = "\
[info] loading model\n\
[info] transcribing\n\
{\"ok\": true, \"language\": \"en\", \"duration_sec\": 12.5, \"text_path\": \"/job/output/x/transcript.txt\", \"chars\": 42}\n";
        let outcome = RunOutcome::parse(output).unwrap();
        assert!(outcome.ok);
        assert_eq!(outcome.chars, Some(42));
        assert_eq!(
            outcome.text_path.as_deref(),
            Some("/job/output/x/transcript.txt")
        );
    }

    #[test]
    fn outcome_parse_skips_trailing_blank_lines() {
        let output = "{\"ok\": false, \"error\": \"E_ENGINE_CRASH: boom\"}\n\n\n";
        let outcome = RunOutcome::parse(output).unwrap();
        assert!(!outcome.ok);
    }

    #[test]
    fn outcome_parse_rejects_garbage() {
        let err = RunOutcome::parse("not json at all\n").unwrap_err();
        assert_eq!(err.code(), "E_BAD_RESULT");

        let err = RunOutcome::parse("").unwrap_err();
        assert_eq!(err.code(), "E_BAD_RESULT");
    }

    #[test]
    fn engine_error_classification() {
        let timeout = RunOutcome {
            ok: false,
            language: None,
            duration_sec: None,
            text_path: None,
            chars: None,
            error: Some("E_FFMPEG_TIMEOUT: conversion timed out".to_string()),
        };
        assert_eq!(timeout.engine_error().code(), "E_FFMPEG_TIMEOUT");

        let missing = RunOutcome {
            error: Some("E_INPUT: file not found: /job/input/x".to_string()),
            ..timeout.clone()
        };
        assert_eq!(missing.engine_error().code(), "E_INPUT");

        let other = RunOutcome {
            error: Some("E_ENGINE_CRASH: model exploded".to_string()),
            ..timeout
        };
        assert_eq!(other.engine_error().code(), "E_ENGINE");
    }

    #[test]
    fn clip_respects_char_boundaries() {
        assert_eq!(clip_chars("hello", 10), "hello");
        assert_eq!(clip_chars("hello", 3), "hel");
        assert_eq!(clip_chars("héllo", 2), "hé");
        assert_eq!(clip_chars("日本語テスト", 3), "日本語");
    }
}

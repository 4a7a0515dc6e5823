//! Pre-execution gate over the source text.
//!
//! This is a deterrent, not a security boundary: a case-insensitive
//! substring denylist cannot see through string concatenation, encodings or
//! any other obfuscation. Containment comes from the engine's timeout,
//! output caps, rlimits and process-group kill. Closing the gap for real
//! needs syscall filtering or container isolation, which this crate does
//! not provide.

use regex::{RegexSet, RegexSetBuilder};
use serde::Serialize;
use std::sync::OnceLock;
use thiserror::Error;

use crate::config::ValidatorConfig;

/// Substrings rejected in any language: process spawning, dynamic
/// evaluation, raw file access and interactive input primitives.
pub const DENYLIST: &[&str] = &[
    "import os",
    "import subprocess",
    "import sys",
    "exec(",
    "eval(",
    "__import__",
    "open(",
    "file(",
    "input(",
    "raw_input(",
    "System.",
    "Runtime.",
    "fs.",
    "require(\"fs\")",
    "require(\"child_process\")",
    "process.exit",
    "System.exit",
];

fn denylist() -> &'static RegexSet {
    static SET: OnceLock<RegexSet> = OnceLock::new();
    SET.get_or_init(|| {
        RegexSetBuilder::new(DENYLIST.iter().map(|pattern| regex::escape(pattern)))
            .case_insensitive(true)
            .build()
            .expect("escaped literals always compile")
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Code cannot be empty")]
    EmptyCode,

    #[error("Code is {size} bytes, above the {limit} byte limit")]
    CodeTooLarge { size: usize, limit: usize },

    #[error("Potentially dangerous code detected: {0}. Please remove it for security.")]
    DangerousPattern(&'static str),
}

impl ValidationError {
    /// Stable machine-readable reason code.
    pub fn reason(&self) -> &'static str {
        match self {
            ValidationError::EmptyCode => "empty_code",
            ValidationError::CodeTooLarge { .. } => "code_too_large",
            ValidationError::DangerousPattern(_) => "dangerous_pattern",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Validator {
    max_source_size: usize,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(&ValidatorConfig::default())
    }
}

impl Validator {
    pub fn new(config: &ValidatorConfig) -> Self {
        Self {
            max_source_size: config.max_source_size,
        }
    }

    /// Checks `source` before it is handed to the engine.
    ///
    /// The verdict depends only on the arguments. The same denylist applies
    /// whatever `language` says.
    pub fn validate(&self, _language: &str, source: &str) -> Result<(), ValidationError> {
        if source.trim().is_empty() {
            return Err(ValidationError::EmptyCode);
        }
        if source.len() > self.max_source_size {
            return Err(ValidationError::CodeTooLarge {
                size: source.len(),
                limit: self.max_source_size,
            });
        }
        if let Some(index) = denylist().matches(source).iter().next() {
            return Err(ValidationError::DangerousPattern(DENYLIST[index]));
        }
        Ok(())
    }
}

/// `{valid, reason, error}` view of a validation outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub valid: bool,
    pub reason: Option<&'static str>,
    pub error: Option<String>,
}

impl From<&Result<(), ValidationError>> for Verdict {
    fn from(result: &Result<(), ValidationError>) -> Self {
        match result {
            Ok(()) => Verdict {
                valid: true,
                reason: None,
                error: None,
            },
            Err(e) => Verdict {
                valid: false,
                reason: Some(e.reason()),
                error: Some(e.to_string()),
            },
        }
    }
}

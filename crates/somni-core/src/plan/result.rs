//! Terminal outcome of a generation request.

use std::fmt;

use serde::ser::{Serialize, SerializeStruct, Serializer};

use super::schema::PlanOutput;

/// Error code on a failed generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenerationError {
    /// The sanity gate denied the context. No model call was made.
    InsufficientData,
    /// Both attempts produced unusable output.
    ValidationFailed,
    /// A collaborator lookup failed before any model call.
    ModelError,
}

impl GenerationError {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InsufficientData => "insufficient_data",
            Self::ValidationFailed => "validation_failed",
            Self::ModelError => "model_error",
        }
    }
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of [`PlanEngine::generate`](super::PlanEngine::generate).
///
/// Serializes as `{"ok":true,"output":...,"attempts":..,"inference_ms":..}`
/// or `{"ok":false,"error":"..","reason":"..","attempts":..,"inference_ms":..}`.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationResult {
    Generated {
        output: PlanOutput,
        /// 1 or 2.
        attempts: u8,
        inference_ms: u64,
    },
    Failed {
        error: GenerationError,
        reason: Option<String>,
        /// 0 when no model call was made, otherwise 2.
        attempts: u8,
        inference_ms: u64,
    },
}

impl GenerationResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Generated { .. })
    }

    pub fn attempts(&self) -> u8 {
        match self {
            Self::Generated { attempts, .. } | Self::Failed { attempts, .. } => *attempts,
        }
    }

    pub fn inference_ms(&self) -> u64 {
        match self {
            Self::Generated { inference_ms, .. } | Self::Failed { inference_ms, .. } => {
                *inference_ms
            }
        }
    }

    pub fn output(&self) -> Option<&PlanOutput> {
        match self {
            Self::Generated { output, .. } => Some(output),
            Self::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<GenerationError> {
        match self {
            Self::Generated { .. } => None,
            Self::Failed { error, .. } => Some(*error),
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Generated { .. } => None,
            Self::Failed { reason, .. } => reason.as_deref(),
        }
    }
}

impl Serialize for GenerationResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Generated {
                output,
                attempts,
                inference_ms,
            } => {
                let mut s = serializer.serialize_struct("GenerationResult", 4)?;
                s.serialize_field("ok", &true)?;
                s.serialize_field("output", output)?;
                s.serialize_field("attempts", attempts)?;
                s.serialize_field("inference_ms", inference_ms)?;
                s.end()
            }
            Self::Failed {
                error,
                reason,
                attempts,
                inference_ms,
            } => {
                let len = if reason.is_some() { 5 } else { 4 };
                let mut s = serializer.serialize_struct("GenerationResult", len)?;
                s.serialize_field("ok", &false)?;
                s.serialize_field("error", error.as_str())?;
                match reason {
                    Some(reason) => s.serialize_field("reason", reason)?,
                    None => s.skip_field("reason")?,
                }
                s.serialize_field("attempts", attempts)?;
                s.serialize_field("inference_ms", inference_ms)?;
                s.end()
            }
        }
    }
}

use std::fmt;

use anyhow::Error;
use serde::Serialize;
use serde_json::Value;

/// Stable machine-readable failure codes, serialized as `"INVALID_RGB"` etc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidRgb,
    InvalidSize,
    InvalidDelay,
    InvalidHexColor,
    InvalidPacing,
    InvalidSettings,
    NoInput,
    EmptyResult,
    Internal,
}

impl ErrorCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidRgb => "INVALID_RGB",
            Self::InvalidSize => "INVALID_SIZE",
            Self::InvalidDelay => "INVALID_DELAY",
            Self::InvalidHexColor => "INVALID_HEX_COLOR",
            Self::InvalidPacing => "INVALID_PACING",
            Self::InvalidSettings => "INVALID_SETTINGS",
            Self::NoInput => "NO_INPUT",
            Self::EmptyResult => "EMPTY_RESULT",
            Self::Internal => "INTERNAL",
        }
    }

    /// Caller mistakes, as opposed to runs that failed to produce output.
    pub const fn is_usage(self) -> bool {
        !matches!(self, Self::EmptyResult | Self::Internal)
    }

    /// Process exit status: 2 for usage errors, 1 otherwise.
    pub const fn exit_status(self) -> u8 {
        if self.is_usage() {
            2
        } else {
            1
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct CodedError {
    pub code: ErrorCode,
    pub message: String,
    pub details: Option<Value>,
}

impl CodedError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Uncoded failure, message carrying the whole context chain.
    pub fn internal(error: &Error) -> Self {
        Self::new(ErrorCode::Internal, format!("{error:#}"))
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn envelope(&self) -> ErrorEnvelope<'_> {
        ErrorEnvelope {
            ok: false,
            error: self,
        }
    }
}

impl fmt::Display for CodedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for CodedError {}

impl Serialize for CodedError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;

        let fields = if self.details.is_some() { 3 } else { 2 };
        let mut body = serializer.serialize_struct("CodedError", fields)?;
        body.serialize_field("code", &self.code)?;
        body.serialize_field("message", &self.message)?;
        if let Some(details) = &self.details {
            body.serialize_field("details", details)?;
        }
        body.end()
    }
}

/// `{"ok": false, "error": {...}}` as printed on stderr.
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope<'a> {
    pub ok: bool,
    pub error: &'a CodedError,
}

pub fn find_coded_error(error: &Error) -> Option<&CodedError> {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<CodedError>())
}

use std::{fmt::Display, str::Utf8Error};

/// Failure modes of [`Encoder`](crate::encoder::Encoder) operations.
///
/// Encoding errors are always fatal: the current top-level `encode` call is
/// aborted and the stream position afterwards is unspecified.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum EncodeError {
    /// no registry entry and no `default` hook could handle this value
    CannotSerialize(String),
    /// a cyclic graph was encountered with `value_sharing` disabled
    CyclicNoSharing,
    /// a naive (timezone-less) datetime arrived with no default timezone configured
    NaiveDatetimeNoTZ,
    /// a major-type-7 simple value in the reserved 24..=31 range was requested
    InvalidSimpleValue(u8),
    /// a deferred `(module, type)` registry key could not be resolved
    DeferredTypeSpecMalformed(String),
    /// integer magnitude does not fit any supported representation
    IntegerTooLarge,
    /// propagated from the underlying stream
    Io(String),
    /// propagated from a user-supplied hook, with the byte offset of the
    /// outer item that was being encoded when the hook ran
    Hook { offset: usize, message: String },
}

impl Display for EncodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EncodeError::CannotSerialize(ty) => write!(f, "cannot serialize value of type `{ty}`"),
            EncodeError::CyclicNoSharing => {
                write!(f, "cyclic structure encountered with sharing disabled")
            }
            EncodeError::NaiveDatetimeNoTZ => {
                write!(f, "naive datetime has no timezone and none is configured")
            }
            EncodeError::InvalidSimpleValue(v) => write!(f, "invalid simple value {v}"),
            EncodeError::DeferredTypeSpecMalformed(spec) => {
                write!(f, "deferred type spec `{spec}` could not be resolved")
            }
            EncodeError::IntegerTooLarge => write!(f, "integer magnitude is not representable"),
            EncodeError::Io(msg) => write!(f, "I/O error: {msg}"),
            EncodeError::Hook { offset, message } => {
                write!(f, "hook error at offset {offset}: {message}")
            }
        }
    }
}

impl std::error::Error for EncodeError {}

/// Failure modes of [`Decoder`](crate::decoder::Decoder) operations.
///
/// Every variant is wrapped with the byte offset of the outer item that was
/// being decoded when the failure happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeError {
    offset: usize,
    kind: DecodeErrorKind,
}

impl DecodeError {
    pub fn new(offset: usize, kind: DecodeErrorKind) -> Self {
        Self { offset, kind }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn kind(&self) -> &DecodeErrorKind {
        &self.kind
    }
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at offset {}", self.kind, self.offset)
    }
}

impl std::error::Error for DecodeError {}

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DecodeErrorKind {
    /// fewer bytes were available than the item header promised
    PrematureEoS { expected: usize, got: usize },
    /// initial byte's info nibble was one of the reserved values, or an
    /// unrecognised major-type-7 subtype
    UnknownSubtype(u8),
    /// a `break` (0xFF) appeared outside an indefinite-length container
    UnexpectedBreak,
    /// indefinite-length string chunks did not all share the same major type
    HeterogeneousStreamChunks,
    /// a text string was not valid UTF-8 and `str_errors` was `strict`
    InvalidUtf8(Utf8Error),
    /// tag 0 text content did not parse as RFC 3339
    InvalidDatetimeSyntax(String),
    /// tag 2/3/4/5 bignum payload was malformed
    InvalidBigInt,
    /// tag 29 index had no corresponding definition
    BadSharedRef(u64),
    /// tag 29 index named a slot that has been allocated but not finished
    UninitialisedSharedRef(u64),
    /// a built-in tag's child item had the wrong shape
    InvalidTagArgument { tag: u64, reason: String },
    /// propagated from the underlying stream
    Io(String),
    /// propagated from a user-supplied hook
    Hook(String),
}

impl Display for DecodeErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeErrorKind::PrematureEoS { expected, got } => {
                write!(f, "premature end of stream: expected {expected} bytes, got {got}")
            }
            DecodeErrorKind::UnknownSubtype(b) => write!(f, "unknown subtype in byte {b:#04x}"),
            DecodeErrorKind::UnexpectedBreak => write!(f, "unexpected break outside indefinite container"),
            DecodeErrorKind::HeterogeneousStreamChunks => {
                write!(f, "indefinite-length string mixed chunk major types")
            }
            DecodeErrorKind::InvalidUtf8(e) => write!(f, "invalid UTF-8: {e}"),
            DecodeErrorKind::InvalidDatetimeSyntax(s) => write!(f, "invalid datetime syntax `{s}`"),
            DecodeErrorKind::InvalidBigInt => write!(f, "invalid big integer encoding"),
            DecodeErrorKind::BadSharedRef(idx) => write!(f, "shared reference {idx} has no definition"),
            DecodeErrorKind::UninitialisedSharedRef(idx) => {
                write!(f, "shared reference {idx} used before its value was initialised")
            }
            DecodeErrorKind::InvalidTagArgument { tag, reason } => {
                write!(f, "invalid argument for tag {tag}: {reason}")
            }
            DecodeErrorKind::Io(msg) => write!(f, "I/O error: {msg}"),
            DecodeErrorKind::Hook(msg) => write!(f, "hook error: {msg}"),
        }
    }
}

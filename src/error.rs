//! Unified error types for the panel library.
//!
//! Every fallible operation returns one of these small `Copy` enums so that
//! the control loop can log and branch on them without allocation.  None of
//! them cross a component boundary as a panic.

use core::fmt;

// ---------------------------------------------------------------------------
// Channel registration
// ---------------------------------------------------------------------------

/// Why a channel could not be added to the table.
///
/// A failed registration has no side effects: the table is unchanged and no
/// subscription was attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationError {
    /// The table already holds [`MAX_CHANNELS`](crate::channel::MAX_CHANNELS) entries.
    CapacityExceeded,
    /// No transport is attached to the panel.
    TransportUnavailable,
}

impl fmt::Display for RegistrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CapacityExceeded => write!(f, "channel table full"),
            Self::TransportUnavailable => write!(f, "no transport attached"),
        }
    }
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

/// Encode/decode failures.  On the inbound path these are never surfaced to
/// the host as errors: the bound variable keeps its prior value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    /// The payload cannot be represented by the channel's type.
    DecodeIgnored,
    /// The value does not fit the destination buffer.
    Overflow,
    /// The channel type has no representation in this direction.
    Unsupported,
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DecodeIgnored => write!(f, "payload ignored"),
            Self::Overflow => write!(f, "value exceeds buffer capacity"),
            Self::Unsupported => write!(f, "operation not defined for this type"),
        }
    }
}

// ---------------------------------------------------------------------------
// Portal collaborator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortalError {
    /// The interactive session ran out of time without a submission.
    Timeout,
    /// The portal could not be brought up (radio, server).
    StartFailed,
}

impl fmt::Display for PortalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "portal timed out"),
            Self::StartFailed => write!(f, "portal failed to start"),
        }
    }
}

// ---------------------------------------------------------------------------
// Persistent store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    /// Stored document could not be parsed.
    Corrupted,
    /// Underlying storage is full.
    Full,
    /// Generic I/O error from the storage backend.
    IoError,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Corrupted => write!(f, "stored config corrupted"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

// ---------------------------------------------------------------------------
// Settings validation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// A field failed range validation.  Describes which field and why.
    ValidationFailed(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ValidationFailed(msg) => write!(f, "validation failed: {msg}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_are_human_readable() {
        assert_eq!(
            RegistrationError::CapacityExceeded.to_string(),
            "channel table full"
        );
        assert_eq!(PortalError::Timeout.to_string(), "portal timed out");
        assert_eq!(
            ConfigError::ValidationFailed("x").to_string(),
            "validation failed: x"
        );
    }
}

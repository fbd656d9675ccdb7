//! Message-based classification of navigation failures.

use crate::error::ErrorClass;

const FRAME_DETACHED: &[&str] = &[
    "navigating frame was detached",
    "attempted to use detached frame",
    "frame was detached",
    "execution context was destroyed",
];

const TRANSIENT: &[&str] = &[
    "navigating frame was detached",
    "attempted to use detached frame",
    "execution context was destroyed",
    "target closed",
    "session closed",
    "connection closed",
    "protocol error",
    "net::err_failed",
    "net::err_timed_out",
    "net::err_connection_reset",
    "net::err_connection_refused",
    "timeout",
];

/// Classify an error by its message, case-insensitively.
pub fn classify(message: &str) -> ErrorClass {
    let message = message.to_lowercase();

    if FRAME_DETACHED.iter().any(|p| message.contains(p)) {
        ErrorClass::FrameDetached
    } else if TRANSIENT.iter().any(|p| message.contains(p)) {
        ErrorClass::Transient
    } else {
        ErrorClass::Fatal
    }
}

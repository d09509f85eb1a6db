//! Observable events
//!
//! Every lifecycle point of the persistence and index protocol has an
//! explicit, typed event.

use std::fmt;

/// Observable events in aerodoc
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Configuration
    /// Configuration file loaded
    ConfigLoaded,

    // Store lifecycle
    /// File store opened
    StoreOpen,
    /// File store log replay finished
    StoreReplayComplete,
    /// Store log corruption detected (FATAL)
    StoreCorruption,
    /// Store round-trip exceeded its timeout
    StoreTimeout,
    /// Log append failed, torn tail cut back
    StoreAppendFailed,

    // Document lifecycle
    /// Document created with `add`
    DocCreated,
    /// Document updated with `replace`
    DocUpdated,
    /// Update skipped, nothing dirty
    DocUnchanged,
    /// Document destroyed (hooks ran)
    DocDestroyed,
    /// Document deleted (hooks skipped)
    DocDeleted,
    /// Save rejected by validation
    DocRejected,
    /// CAS mismatch on replace/delete
    DocConflict,
    /// Key already present on add
    DocDuplicateKey,
    /// Generated id collided, retrying with a fresh one
    IdRetry,

    // Index lifecycle
    /// Pointer record written
    IndexPointerWritten,
    /// Pointer record removed
    IndexPointerReleased,
    /// Stale pointer record deleted during lookup
    IndexPointerHealed,
    /// Pointer maintenance failed after the document write
    IndexPointerFailed,
    /// Uniqueness check refused a save
    IndexUniqueViolation,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",

            Event::StoreOpen => "STORE_OPEN",
            Event::StoreReplayComplete => "STORE_REPLAY_COMPLETE",
            Event::StoreCorruption => "STORE_CORRUPTION",
            Event::StoreTimeout => "STORE_TIMEOUT",
            Event::StoreAppendFailed => "STORE_APPEND_FAILED",

            Event::DocCreated => "DOC_CREATED",
            Event::DocUpdated => "DOC_UPDATED",
            Event::DocUnchanged => "DOC_UNCHANGED",
            Event::DocDestroyed => "DOC_DESTROYED",
            Event::DocDeleted => "DOC_DELETED",
            Event::DocRejected => "DOC_REJECTED",
            Event::DocConflict => "DOC_CONFLICT",
            Event::DocDuplicateKey => "DOC_DUPLICATE_KEY",
            Event::IdRetry => "ID_RETRY",

            Event::IndexPointerWritten => "INDEX_POINTER_WRITTEN",
            Event::IndexPointerReleased => "INDEX_POINTER_RELEASED",
            Event::IndexPointerHealed => "INDEX_POINTER_HEALED",
            Event::IndexPointerFailed => "INDEX_POINTER_FAILED",
            Event::IndexUniqueViolation => "INDEX_UNIQUE_VIOLATION",
        }
    }

    /// Returns true if this event indicates a fatal condition
    pub fn is_fatal(&self) -> bool {
        matches!(self, Event::StoreCorruption)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_events_upper_snake() {
        let events = [
            Event::ConfigLoaded,
            Event::StoreOpen,
            Event::StoreReplayComplete,
            Event::StoreCorruption,
            Event::StoreTimeout,
            Event::StoreAppendFailed,
            Event::DocCreated,
            Event::DocUpdated,
            Event::DocUnchanged,
            Event::DocDestroyed,
            Event::DocDeleted,
            Event::DocRejected,
            Event::DocConflict,
            Event::DocDuplicateKey,
            Event::IdRetry,
            Event::IndexPointerWritten,
            Event::IndexPointerReleased,
            Event::IndexPointerHealed,
            Event::IndexPointerFailed,
            Event::IndexUniqueViolation,
        ];

        for event in events {
            let s = event.as_str();
            assert!(!s.is_empty());
            assert!(s.chars().all(|c| c.is_ascii_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_fatal_events() {
        assert!(Event::StoreCorruption.is_fatal());
        assert!(!Event::DocConflict.is_fatal());
    }
}

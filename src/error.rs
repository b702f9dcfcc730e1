//! The three fatal, process-exiting conditions, unified behind one
//! `Display` impl, the same way heap statistics formatting is unified.

#[derive(Debug)]
pub enum FatalError {
    /// The allocation-failure escalation ladder ran every rung and the
    /// request still could not be satisfied.
    MemoryExhausted,
    /// The initial heap reservation requested at startup is below the
    /// minimum the allocator can operate with.
    HeapTooSmall { requested: usize, minimum: usize },
    /// A big-object request exceeds the hard size ceiling; distinct from
    /// ordinary exhaustion because more memory would never help.
    BigObjectTooLarge { requested_words: usize },
    /// An OS mapping request (other than the oversize case above) failed.
    Oversized(String),
}

impl std::fmt::Display for FatalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FatalError::MemoryExhausted => write!(f, "ome: memory exhausted, aborting"),
            FatalError::HeapTooSmall { requested, minimum } => write!(
                f,
                "ome: heap reservation of {} bytes is below the minimum of {} bytes",
                requested, minimum
            ),
            FatalError::BigObjectTooLarge { requested_words } => write!(
                f,
                "ome: big object request of {} words exceeds the maximum allowed",
                requested_words
            ),
            FatalError::Oversized(msg) => write!(f, "ome: {}", msg),
        }
    }
}

impl std::error::Error for FatalError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_exhausted_message_matches_contract() {
        assert_eq!(FatalError::MemoryExhausted.to_string(), "ome: memory exhausted, aborting");
    }

    #[test]
    fn heap_too_small_reports_both_figures() {
        let err = FatalError::HeapTooSmall { requested: 100, minimum: 65536 };
        let msg = err.to_string();
        assert!(msg.contains("100"));
        assert!(msg.contains("65536"));
    }
}

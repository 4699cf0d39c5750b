//! System control abstraction

/// Process-level control of the node
pub trait SystemControl {
    /// Reset the whole device. Does not return.
    fn restart(&mut self) -> !;
}

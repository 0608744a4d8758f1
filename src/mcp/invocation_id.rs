//! Per-invocation identifier for tracing
//!
//! Every `tools/call` gets a fresh UUID that is attached to the span wrapping
//! the invocation, so log lines from one call can be correlated.

use uuid::Uuid;

/// Invocation ID wrapper type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InvocationId(pub Uuid);

impl InvocationId {
    /// Generate a new random invocation ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for InvocationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for InvocationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

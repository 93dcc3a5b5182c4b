/// Three-way choice for a commit's `parent_signature`, replacing the
/// Python source's module-level `_UNSET = object()` sentinel with a
/// real enum: Rust has no private singleton default to distinguish
/// "caller didn't pass anything" from "caller explicitly passed
/// `None`".
#[derive(Debug, Clone, Default)]
pub enum ParentRef {
    /// Caller omitted it — auto-chain to the store's current HEAD
    /// signature when the store was opened with auto-chaining enabled.
    #[default]
    Auto,
    /// Caller supplied a specific prior signature to chain from.
    Explicit(String),
    /// Caller explicitly wants no parent — genesis of a sub-chain.
    None,
}

impl ParentRef {
    pub(crate) fn resolve(self, auto_chain: bool, current_head: Option<&str>) -> Option<String> {
        match self {
            ParentRef::Auto if auto_chain => current_head.map(|s| s.to_string()),
            ParentRef::Auto => None,
            ParentRef::Explicit(sig) => Some(sig),
            ParentRef::None => None,
        }
    }
}

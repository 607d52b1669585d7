//! Ownership-based visibility

use mailshot_common::types::UserId;

/// Which rows an actor may see and modify.
///
/// Every repository read or update of clients, messages, campaigns and
/// attempts takes a scope and applies it through [`AccessScope::owner_filter`]
/// bound to the `($n::uuid IS NULL OR owner_id = $n)` predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessScope {
    /// Unrestricted (superusers, managers, the dispatcher itself)
    All,
    /// Only rows owned by this user
    Owner(UserId),
}

impl AccessScope {
    /// Value to bind for the owner predicate; `None` disables filtering
    pub fn owner_filter(&self) -> Option<UserId> {
        match self {
            AccessScope::All => None,
            AccessScope::Owner(id) => Some(*id),
        }
    }

    /// In-process check of the same rule the SQL predicate applies
    pub fn permits(&self, owner_id: Option<UserId>) -> bool {
        match self {
            AccessScope::All => true,
            AccessScope::Owner(id) => owner_id == Some(*id),
        }
    }
}

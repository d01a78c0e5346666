//! Immutable source-tree snapshot identifier.

use std::sync::Arc;

/// An opaque identifier for a source-tree snapshot: a branch, a revision,
/// and an optional list of change identifiers that make up the snapshot.
///
/// `SourceStamp` is immutable once constructed and is shared by reference
/// (`Arc`) across every [`BuildRequest`](crate::request::BuildRequest) in a
/// [`BuildSet`](crate). Wire transfer of the underlying files, and how a
/// revision or change list was resolved in the first place, are both out of
/// scope for this crate — we carry the identifier unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct SourceStamp {
    pub branch: Option<String>,
    pub revision: String,
    pub changes: Vec<String>,
}

impl SourceStamp {
    /// Build a `SourceStamp` for a single revision with no branch or change
    /// list information.
    pub fn revision(revision: impl Into<String>) -> Self {
        Self {
            branch: None,
            revision: revision.into(),
            changes: Vec::new(),
        }
    }

    /// Build a `SourceStamp` for a revision on a named branch.
    pub fn on_branch(branch: impl Into<String>, revision: impl Into<String>) -> Self {
        Self {
            branch: Some(branch.into()),
            revision: revision.into(),
            changes: Vec::new(),
        }
    }

    /// Wrap this stamp in an `Arc` for cheap sharing across requests.
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revision_has_no_branch() {
        let s = SourceStamp::revision("deadbeef");
        assert_eq!(s.branch, None);
        assert_eq!(s.revision, "deadbeef");
    }

    #[test]
    fn on_branch_carries_both() {
        let s = SourceStamp::on_branch("main", "deadbeef");
        assert_eq!(s.branch.as_deref(), Some("main"));
    }
}

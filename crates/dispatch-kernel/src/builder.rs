//! The `Builder` pool collaborator contract.
//!
//! This crate depends only on a builder's ability to accept a submitted
//! request and expose that request's completion signal (the signal itself
//! lives on [`BuildRequest`](crate::request::BuildRequest), not here). How a
//! builder actually schedules build slaves is entirely out of scope.

use crate::request::BuildRequest;

/// A builder identifier. Wrapped in a newtype (rather than a bare
/// `String`) so cohort and chain code reads as "a set of builder names",
/// not "a set of strings that happen to be builder names".
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct BuilderName(String);

impl BuilderName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BuilderName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for BuilderName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for BuilderName {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// External collaborator: accepts submitted build requests.
///
/// `submit_build_request` must be idempotent per request, may be invoked
/// from a callback/continuation context, and must return immediately
/// (scheduling the actual work asynchronously elsewhere). It is not an
/// `async fn` — submission itself is fire-and-forget; completion is
/// observed through the request's own
/// [`wait_until_finished`](crate::request::BuildRequest::wait_until_finished).
pub trait Builder: Send + Sync {
    /// This builder's name.
    fn name(&self) -> &BuilderName;

    /// Submit `request` for execution. Returns immediately.
    fn submit_build_request(&self, request: BuildRequest);
}

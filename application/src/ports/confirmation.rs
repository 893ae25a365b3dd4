//! Tool-confirmation gating: generalizes a three-way human-in-the-loop
//! switch (`AutoReject`/`AutoApprove`/`Interactive`) from a plan-revision gate
//! to a per-tool-call gate answered by whichever client is attached to the
//! session, if any.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ConfirmationDecision {
    Approve,
    Reject { reason: Option<String> },
}

/// What the session engine does when a tool requiring confirmation is called
/// and no caller is waiting to answer interactively (e.g. a headless
/// `EchoAdapter` exercise in tests, or a policy-locked deployment).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationPolicy {
    /// Wait indefinitely for `respond_to_confirmation`. This is the default
    /// for any session with a gateway client attached.
    Interactive,
    /// Skip the wait; treat every confirmable call as approved.
    AutoApprove,
    /// Skip the wait; treat every confirmable call as rejected.
    AutoReject,
}

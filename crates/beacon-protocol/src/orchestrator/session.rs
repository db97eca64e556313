//! An immutable snapshot of "which session am I in", handed to RPC
//! handlers and log sites instead of letting them reach into the
//! orchestrator's locked state directly.

use beacon_core::{Hash32, NodeIndex, SessionId};
use tracing::Span;

#[derive(Clone)]
pub struct SessionViewData {
    pub session_id: SessionId,
    pub index: NodeIndex,
    pub group_hash: Hash32,
}

/// Carries the data plus the `tracing::Span` every log line in the
/// session should be nested under, so a session's logs correlate without
/// threading the session id through every call site by hand.
#[derive(Clone)]
pub struct SessionView {
    data: SessionViewData,
    span: Span,
}

impl SessionView {
    pub fn new(data: SessionViewData) -> Self {
        let span = tracing::info_span!(
            "dkg_session",
            session = %data.session_id,
            index = %data.index,
            group_hash = %data.group_hash,
        );
        Self { data, span }
    }

    pub fn data(&self) -> &SessionViewData {
        &self.data
    }

    pub fn span(&self) -> &Span {
        &self.span
    }
}

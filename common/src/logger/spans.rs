use tracing::{Span, field};

use super::TraceId;

/// Root span for one reconciliation cycle.
///
/// `outcome` is left empty so the cycle can record how it ended.
pub fn cycle_span(name: &'static str, trace_id: &TraceId) -> Span {
    tracing::info_span!(
        "cycle",
        name = %name,
        trace_id = %trace_id.as_str(),
        outcome = field::Empty
    )
}

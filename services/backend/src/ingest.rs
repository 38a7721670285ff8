//! The ingest pipeline: validate or adapt, sequence, then fan out.
//!
//! Only validation failures propagate to the caller.  Broadcast, record,
//! and rule evaluation failures are counted or logged and never deny
//! acceptance of a validated event; the serialized event is handed to the
//! recorder before any derived alert is broadcast.

use serde_json::Value;
use tracing::{error, warn};
use zmeta_schema::{validate_or_adapt, Event, ValidationError};

use crate::state::AppState;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error(transparent)]
    InvalidPayload(#[from] ValidationError),
}

/// Validate (or adapt) a payload, assign a sequence when absent, and
/// dispatch the event to subscribers, the recorder, and the rule engine.
pub async fn ingest_payload(
    state: &AppState,
    payload: &Value,
    context: &str,
) -> Result<Event, IngestError> {
    let (adapter, mut event) = validate_or_adapt(payload)?;
    if event.sequence.is_none() {
        event.sequence = Some(state.metrics.next_sequence());
    }
    state.metrics.note_adapter(adapter);
    dispatch(state, &event, context).await;
    Ok(event)
}

async fn dispatch(state: &AppState, event: &Event, context: &str) {
    let serialized = event.to_json();
    state.hub.broadcast(&serialized).await;
    state.recorder.enqueue(serialized);
    state.metrics.note_validated();

    // Fault boundary: an evaluation failure is logged and treated as zero
    // alerts for this event.
    let alerts = match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let event_value = serde_json::to_value(event)?;
        Ok::<_, serde_json::Error>(state.rules.evaluate(&event_value))
    })) {
        Ok(Ok(alerts)) => alerts,
        Ok(Err(e)) => {
            error!(context, error = %e, "rule evaluation failed");
            return;
        }
        Err(_) => {
            error!(context, "rule evaluation panicked");
            return;
        }
    };

    for alert in alerts {
        if state.deduper.should_send(&alert) {
            state.hub.broadcast(&alert.to_json()).await;
            state.metrics.note_alert();
        } else {
            warn!(rule = %alert.rule, "duplicate alert suppressed");
        }
    }
}

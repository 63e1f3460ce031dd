//! Turn runners

use crate::backend::AgentBackend;
use crate::message::{Message, MessageId};
use crate::protocol::{SendParams, StreamOptions};
use crate::store::ConversationStore;

use super::{Flow, TurnFold, TurnOutcome, STREAM_CLOSED_ERROR};

/// Run one streaming turn
///
/// Opens a single non-resubscribing subscription, folds its events into
/// `store` in arrival order and releases the subscription when the turn ends.
/// Never fails: every failure becomes an error message in the store.
pub async fn run_streaming_turn<B>(
    backend: &B,
    store: &mut ConversationStore,
    params: &SendParams,
) -> TurnOutcome
where
    B: AgentBackend + ?Sized,
{
    let mut fold = TurnFold::new();

    let mut subscription = match backend.send_stream(params, StreamOptions::once()).await {
        Ok(subscription) => subscription,
        Err(e) => {
            tracing::warn!(
                backend = backend.name(),
                conversation_id = %params.conversation_id,
                error = %e,
                "Failed to open stream"
            );
            return fold.fail(store, &e.to_string());
        }
    };

    tracing::debug!(subscription = %subscription.id(), "Streaming turn started");

    let outcome = loop {
        match subscription.next_event().await {
            Some(event) => {
                if let Flow::Done(outcome) = fold.apply(store, event) {
                    break outcome;
                }
            }
            None => break fold.fail(store, STREAM_CLOSED_ERROR),
        }
    };

    subscription.release();
    outcome
}

/// Run one request/response turn
///
/// Appends a pending assistant message, waits for the full reply and
/// completes or fails that message.
pub async fn run_single_turn<B>(
    backend: &B,
    store: &mut ConversationStore,
    params: &SendParams,
) -> TurnOutcome
where
    B: AgentBackend + ?Sized,
{
    let id = MessageId::new();
    store.append_message(Message::pending(id.clone()));
    let mut fold = TurnFold::for_message(id);

    match backend.send(params).await {
        Ok(reply) => fold.complete(store, &reply.response),
        Err(e) => {
            tracing::warn!(
                backend = backend.name(),
                conversation_id = %params.conversation_id,
                error = %e,
                "Request failed"
            );
            fold.fail(store, &e.to_string())
        }
    }
}

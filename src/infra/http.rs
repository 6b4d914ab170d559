//! HTTP ingress standing in for the message broker.
//!
//! `POST /topics/{topic}` enqueues the body as an inbound message when the
//! topic is the subscribed one, and `GET /topics/{topic}` returns the payload
//! last published on a topic.

use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use tracing::{debug, warn};

use crate::application::pipeline::{InboundMessage, InboxSender};

use super::transport::RetainedPublisher;

#[derive(Clone)]
pub struct IngressState {
    pub source: String,
    pub inbox: InboxSender,
    pub retained: Arc<RetainedPublisher>,
}

pub fn build_router(state: IngressState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/topics/{*topic}", get(read_retained).post(enqueue))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn enqueue(
    State(state): State<IngressState>,
    Path(topic): Path<String>,
    body: String,
) -> Response {
    if topic != state.source {
        debug!(topic = %topic, "Ignoring message on unsubscribed topic");
        return (StatusCode::NOT_FOUND, "topic not subscribed").into_response();
    }

    debug!(topic = %topic, "Received message");
    match state.inbox.send(InboundMessage::new(topic, body)).await {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(_) => {
            warn!("Message pipeline is not running, refusing message");
            (StatusCode::SERVICE_UNAVAILABLE, "pipeline stopped").into_response()
        }
    }
}

async fn read_retained(
    State(state): State<IngressState>,
    Path(topic): Path<String>,
) -> Response {
    match state.retained.retained(&topic) {
        Some(payload) => payload.into_response(),
        None => (StatusCode::NOT_FOUND, "no retained message").into_response(),
    }
}

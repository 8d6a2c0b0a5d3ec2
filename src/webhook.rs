//! http receiver translating alertmanager webhooks into telegram messages

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::{rejection::JsonRejection, Extension, Json, Path},
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use prometheus::{Encoder, IntCounterVec, TextEncoder};
use serde_json::json;

use crate::{
    alert,
    pipeline::Pipeline,
    settings::Settings,
    telegram::{types::SendMessage, Client},
};

/// everything a request handler needs, shared read-only
pub struct AppState {
    pub settings: Arc<Settings>,
    pub pipeline: Pipeline,
    pub telegram: Client,
    received_batches: IntCounterVec,
    sent_messages: IntCounterVec,
}

impl AppState {
    pub fn new(settings: Arc<Settings>, pipeline: Pipeline, telegram: Client) -> Result<Self> {
        use prometheus::{opts, register_int_counter_vec};

        let received_batches = register_int_counter_vec!(
            opts!("received_batches", "total number of deserialized alert batches")
                .namespace("klaxon")
                .subsystem("webhook"),
            &["chat"]
        )?;

        let sent_messages = register_int_counter_vec!(
            opts!("sent_messages", "total number of messages handed to telegram")
                .namespace("klaxon")
                .subsystem("webhook"),
            &["chat"]
        )?;

        Ok(Self {
            settings,
            pipeline,
            telegram,
            received_batches,
            sent_messages,
        })
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ping/:chatid", get(ping))
        .route("/ping/:chatid/:topicid", get(ping_topic))
        .route("/alert/:chatid", post(post_alert))
        .route("/alert/:chatid/:topicid", post(post_alert_topic))
        .route("/metrics", get(metrics))
        .layer(Extension(state))
}

pub async fn run(state: Arc<AppState>) -> Result<()> {
    let addr = state.settings.listen.to_socket_addr();
    tracing::info!(%addr, "listening for alertmanager webhooks");

    axum::Server::bind(&addr)
        .serve(router(state).into_make_service())
        .await
        .context("webhook receiver crashed")?;

    Ok(())
}

async fn post_alert(
    Extension(state): Extension<Arc<AppState>>,
    Path(chat_id): Path<i64>,
    batch: Result<Json<alert::Data>, JsonRejection>,
) -> Response {
    handle_alert(state, chat_id, 0, batch).await
}

async fn post_alert_topic(
    Extension(state): Extension<Arc<AppState>>,
    Path((chat_id, topic_id)): Path<(i64, i64)>,
    batch: Result<Json<alert::Data>, JsonRejection>,
) -> Response {
    handle_alert(state, chat_id, topic_id, batch).await
}

async fn handle_alert(
    state: Arc<AppState>,
    chat_id: i64,
    topic_id: i64,
    batch: Result<Json<alert::Data>, JsonRejection>,
) -> Response {
    let batch = match batch {
        Ok(Json(batch)) => batch,
        Err(err) => {
            tracing::debug!(error = %err, "failed to deserialize alert batch");
            return (StatusCode::BAD_REQUEST, format!("invalid alert payload: {err}"))
                .into_response();
        }
    };

    tracing::info!(chat_id, topic_id, alerts = batch.alerts.len(), "received alert batch");
    state
        .received_batches
        .with_label_values(&[&chat_id.to_string()])
        .inc();

    let processed = match state.pipeline.process(&batch) {
        Ok(processed) => processed,
        Err(err) => {
            // a template that stops rendering is a deployment defect, not a
            // per-request condition; the panic hook takes the process down
            panic!("template execution failed: {err:#}");
        }
    };

    for message in &processed.messages {
        tracing::debug!(text = %message.text, "sending message chunk");

        let request = SendMessage {
            chat_id,
            text: message.text.clone(),
            parse_mode: "HTML",
            reply_to_message_id: (topic_id != 0).then_some(topic_id),
            disable_web_page_preview: true,
            disable_notification: state.settings.disable_notification,
            reply_markup: message.keyboard.as_ref().map(Into::into),
        };

        if let Err(err) = state.telegram.send_message(&request).await {
            tracing::error!(error = %err, chat_id, "failed to deliver message");
            notify_delivery_failure(&state, chat_id).await;

            return (
                StatusCode::SERVICE_UNAVAILABLE,
                axum::Json(json!({
                    "err": err.to_string(),
                    "srcmsg": processed.rendered,
                })),
            )
                .into_response();
        }

        state
            .sent_messages
            .with_label_values(&[&chat_id.to_string()])
            .inc();
    }

    (StatusCode::OK, "telegram msg sent.").into_response()
}

/// Best-effort notice so the chat knows a delivery failed; errors here are
/// only logged, there is no retry.
async fn notify_delivery_failure(state: &AppState, chat_id: i64) {
    let notice = SendMessage {
        chat_id,
        text: String::from("Error sending message, checkout logs"),
        parse_mode: "HTML",
        reply_to_message_id: None,
        disable_web_page_preview: true,
        disable_notification: state.settings.disable_notification,
        reply_markup: None,
    };

    if let Err(err) = state.telegram.send_message(&notice).await {
        tracing::error!(error = %err, chat_id, "failed to send delivery failure notice");
    }
}

async fn ping(
    Extension(state): Extension<Arc<AppState>>,
    Path(chat_id): Path<i64>,
) -> Response {
    handle_ping(state, chat_id, 0).await
}

async fn ping_topic(
    Extension(state): Extension<Arc<AppState>>,
    Path((chat_id, topic_id)): Path<(i64, i64)>,
) -> Response {
    handle_ping(state, chat_id, topic_id).await
}

/// Sends a probe message so operators can verify chat and topic ids.
async fn handle_ping(
    state: Arc<AppState>,
    chat_id: i64,
    topic_id: i64,
) -> Response {
    tracing::info!(chat_id, topic_id, "ping");

    let text = format!("Some HTTP triggered notification by klaxon... {chat_id}:{topic_id}");
    let request = SendMessage {
        chat_id,
        text: text.clone(),
        parse_mode: "HTML",
        reply_to_message_id: (topic_id != 0).then_some(topic_id),
        disable_web_page_preview: true,
        disable_notification: state.settings.disable_notification,
        reply_markup: None,
    };

    match state.telegram.send_message(&request).await {
        Ok(_) => (StatusCode::OK, text).into_response(),
        Err(err) => (
            StatusCode::BAD_REQUEST,
            axum::Json(json!({ "err": err.to_string() })),
        )
            .into_response(),
    }
}

async fn metrics() -> Response {
    let mut buffer = vec![];
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    encoder
        .encode(&metric_families, &mut buffer)
        .expect("metrics encoding failed");

    axum::http::Response::builder()
        .status(200)
        .header(CONTENT_TYPE, encoder.format_type())
        .body(Body::from(buffer))
        .expect("metrics response failed to build")
        .into_response()
}

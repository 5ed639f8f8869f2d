//! Webhook HTTP server: the axum router for `POST <webhook_uri>`, body limits, and `start`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use botgen_core::{BotgenError, HandlerError, Result, WebhookRequest, WebhookResponse};
use serde_json::{json, Value};
use tracing::{error, info, instrument, warn};

use crate::bot::Bot;

/// Parses a body size such as `100kb`, `1.5mb` or `512` (bytes).
pub fn parse_size(size: &str) -> Result<usize> {
    let normalized = size.trim().to_ascii_lowercase();
    let split = normalized
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(normalized.len());
    let (number, unit) = normalized.split_at(split);
    let number: f64 = number
        .parse()
        .map_err(|_| BotgenError::Config(format!("Invalid size: {}", size)))?;
    let multiplier = match unit.trim() {
        "" | "b" => 1.0,
        "kb" => 1024.0,
        "mb" => 1024.0 * 1024.0,
        "gb" => 1024.0 * 1024.0 * 1024.0,
        _ => return Err(BotgenError::Config(format!("Invalid size unit: {}", size))),
    };
    Ok((number * multiplier) as usize)
}

/// HTTP status for a failed webhook request.
pub fn status_for(error: &BotgenError) -> StatusCode {
    match error {
        BotgenError::Handler(HandlerError::Unauthorized) => StatusCode::UNAUTHORIZED,
        BotgenError::Handler(HandlerError::InvalidRequest(_))
        | BotgenError::Handler(HandlerError::MissingConversation)
        | BotgenError::Json(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_json(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

impl Bot {
    /// Router serving the webhook endpoint.
    pub fn router(&self) -> Router {
        let limit = self.json_limit().max(self.url_encoded_limit());
        Router::new()
            .route(self.webhook_uri(), post(webhook))
            .layer(DefaultBodyLimit::max(limit))
            .with_state(self.clone())
    }

    /// Hands a webhook request to the adapter with this bot as the turn logic.
    pub async fn process_incoming_message(&self, request: WebhookRequest) -> Result<WebhookResponse> {
        let adapter = self
            .adapter()
            .cloned()
            .ok_or_else(|| BotgenError::Adapter("No adapter configured".to_string()))?;
        adapter.process_activity(request, Arc::new(self.clone())).await
    }

    /// Serves the webhook on `0.0.0.0:<port>` until Ctrl-C.
    pub async fn start(&self) -> Result<()> {
        if self.disable_webserver() {
            return Err(BotgenError::Config(
                "Webserver is disabled; enable it to call start()".to_string(),
            ));
        }
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port()));
        let listener = tokio::net::TcpListener::bind(addr).await?;
        if !self.disable_console() {
            info!(
                %addr,
                webhook_uri = %self.webhook_uri(),
                "Webserver listening"
            );
        }
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        info!("Webserver stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }
}

#[instrument(skip(bot, headers, body), fields(size = body.len()))]
async fn webhook(State(bot): State<Bot>, headers: HeaderMap, body: Bytes) -> Response {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let limit = if content_type.starts_with("application/x-www-form-urlencoded") {
        bot.url_encoded_limit()
    } else {
        bot.json_limit()
    };
    if body.len() > limit {
        warn!(limit, content_type = %content_type, "Request body over limit");
        return error_json(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large");
    }

    let mut request = WebhookRequest::new(body.to_vec());
    for (name, value) in headers.iter() {
        if let Ok(value) = value.to_str() {
            request = request.with_header(name.as_str(), value);
        }
    }

    match bot.process_incoming_message(request).await {
        Ok(response) => {
            let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::OK);
            (status, Json(response.body.unwrap_or(Value::Null))).into_response()
        }
        Err(e) => {
            error!(error = %e, "Webhook request failed");
            error_json(status_for(&e), &e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size_units() {
        assert_eq!(parse_size("100kb").unwrap(), 102_400);
        assert_eq!(parse_size("1MB").unwrap(), 1_048_576);
        assert_eq!(parse_size("1.5kb").unwrap(), 1536);
        assert_eq!(parse_size("512").unwrap(), 512);
        assert_eq!(parse_size(" 2 b ").unwrap(), 2);
        assert_eq!(parse_size("1gb").unwrap(), 1_073_741_824);
    }

    #[test]
    fn test_parse_size_rejects_garbage() {
        assert!(parse_size("").is_err());
        assert!(parse_size("kb").is_err());
        assert!(parse_size("10tb").is_err());
    }

    #[test]
    fn test_status_for_errors() {
        assert_eq!(
            status_for(&HandlerError::Unauthorized.into()),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_for(&HandlerError::InvalidRequest("x".into()).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&BotgenError::Adapter("down".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_start_fails_when_webserver_disabled() {
        let bot = Bot::new(crate::BotOptions {
            disable_webserver: true,
            ..Default::default()
        })
        .unwrap();
        assert!(matches!(bot.start().await, Err(BotgenError::Config(_))));
    }
}

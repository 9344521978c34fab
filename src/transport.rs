use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;

use crate::protocol::{CallbackData, Interaction, InteractionResponse, MessagePayload};

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("target message not found")]
    NotFound,
    #[error("missing permission")]
    Forbidden,
    #[error("API error: {status} - {body}")]
    Status { status: u16, body: String },
    #[error("attachment error: {0}")]
    Attachment(#[from] std::io::Error),
    #[error("encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Result of a best-effort delete. Only `Deleted` means the message was live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
    Denied,
    Failed(String),
}

/// Reference to a message sent through an interaction token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageHandle {
    pub token: String,
    pub message_id: String,
}

impl MessageHandle {
    pub const ORIGINAL: &'static str = "@original";

    /// The initial response of an interaction, or for component
    /// interactions the message carrying the component.
    pub fn original(token: &str) -> Self {
        Self {
            token: token.to_string(),
            message_id: Self::ORIGINAL.to_string(),
        }
    }
}

/// Per-interaction reply context. Tracks whether the interaction has been
/// acknowledged so later sends go out as follow-ups.
#[derive(Debug)]
pub struct InteractionCtx {
    pub interaction_id: String,
    pub token: String,
    pub user_id: String,
    pub guild_id: Option<String>,
    pub channel_id: Option<String>,
    pub roles: Vec<String>,
    acknowledged: AtomicBool,
}

impl InteractionCtx {
    pub fn new(interaction_id: impl Into<String>, token: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            interaction_id: interaction_id.into(),
            token: token.into(),
            user_id: user_id.into(),
            guild_id: None,
            channel_id: None,
            roles: Vec::new(),
            acknowledged: AtomicBool::new(false),
        }
    }

    pub fn from_interaction(interaction: &Interaction) -> Option<Self> {
        let user_id = interaction.user_id()?;
        let mut ctx = Self::new(&interaction.id, &interaction.token, user_id);
        ctx.guild_id = interaction.guild_id.clone();
        ctx.channel_id = interaction.channel_id.clone();
        ctx.roles = interaction.roles().to_vec();
        Some(ctx)
    }

    pub fn is_acknowledged(&self) -> bool {
        self.acknowledged.load(Ordering::SeqCst)
    }

    /// Only called once the initial response has been accepted.
    fn mark_acknowledged(&self) {
        self.acknowledged.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn create_response(
        &self,
        interaction_id: &str,
        token: &str,
        response: &InteractionResponse,
    ) -> Result<(), TransportError>;

    async fn create_followup(
        &self,
        token: &str,
        message: &MessagePayload,
    ) -> Result<MessageHandle, TransportError>;

    async fn edit_message(
        &self,
        handle: &MessageHandle,
        message: &MessagePayload,
    ) -> Result<(), TransportError>;

    async fn delete_message(&self, handle: &MessageHandle) -> DeleteOutcome;
}

/// Sends `message` as the interaction's initial response, or as a follow-up
/// once the interaction has been acknowledged.
pub async fn send_message(
    transport: &dyn Transport,
    ctx: &InteractionCtx,
    message: MessagePayload,
) -> Result<MessageHandle, TransportError> {
    if ctx.is_acknowledged() {
        return transport.create_followup(&ctx.token, &message).await;
    }
    transport
        .create_response(&ctx.interaction_id, &ctx.token, &InteractionResponse::message(message))
        .await?;
    ctx.mark_acknowledged();
    Ok(MessageHandle::original(&ctx.token))
}

/// Acknowledges a component interaction without sending anything yet.
pub async fn defer_update(transport: &dyn Transport, ctx: &InteractionCtx) -> Result<(), TransportError> {
    if !ctx.is_acknowledged() {
        transport
            .create_response(&ctx.interaction_id, &ctx.token, &InteractionResponse::deferred_update())
            .await?;
        ctx.mark_acknowledged();
    }
    Ok(())
}

/// HTTP transport speaking the interaction webhook API.
pub struct RestTransport {
    client: Client,
    api_base: String,
    application_id: String,
    bot_token: String,
}

#[derive(Deserialize)]
struct CreatedMessage {
    id: String,
}

impl RestTransport {
    pub fn new(
        api_base: String,
        application_id: String,
        bot_token: String,
        timeout_ms: u64,
    ) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            application_id,
            bot_token,
        })
    }

    pub fn application_id(&self) -> &str {
        &self.application_id
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.api_base, path))
            .header("Authorization", format!("Bot {}", self.bot_token))
    }

    fn message_path(&self, handle: &MessageHandle) -> String {
        format!(
            "/webhooks/{}/{}/messages/{}",
            self.application_id, handle.token, handle.message_id
        )
    }

    /// Adds the message body, switching to multipart when a file is attached.
    async fn with_body(
        &self,
        request: RequestBuilder,
        payload: &MessagePayload,
        envelope: Option<&InteractionResponse>,
    ) -> Result<RequestBuilder, TransportError> {
        let json = match envelope {
            Some(response) => serde_json::to_string(response)?,
            None => serde_json::to_string(payload)?,
        };

        match &payload.file {
            None => Ok(request
                .header("Content-Type", "application/json")
                .body(json)),
            Some(file) => {
                let bytes = tokio::fs::read(&file.path).await?;
                let part = reqwest::multipart::Part::bytes(bytes)
                    .file_name(file.filename.clone())
                    .mime_str("image/jpeg")?;
                let form = reqwest::multipart::Form::new()
                    .text("payload_json", json)
                    .part("files[0]", part);
                Ok(request.multipart(form))
            }
        }
    }

    pub async fn put_json(&self, path: &str, body: &serde_json::Value) -> Result<(), TransportError> {
        let response = self.request(Method::PUT, path).json(body).send().await?;
        check_status(response).await?;
        Ok(())
    }
}

async fn check_status(response: Response) -> Result<Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    match status {
        StatusCode::NOT_FOUND => Err(TransportError::NotFound),
        StatusCode::FORBIDDEN => Err(TransportError::Forbidden),
        _ => Err(TransportError::Status {
            status: status.as_u16(),
            body: response.text().await.unwrap_or_default(),
        }),
    }
}

#[async_trait]
impl Transport for RestTransport {
    async fn create_response(
        &self,
        interaction_id: &str,
        token: &str,
        response: &InteractionResponse,
    ) -> Result<(), TransportError> {
        let path = format!("/interactions/{}/{}/callback", interaction_id, token);
        let request = self.request(Method::POST, &path);
        let request = match &response.data {
            Some(CallbackData::Message(payload)) => {
                self.with_body(request, payload, Some(response)).await?
            }
            _ => request.json(response),
        };
        check_status(request.send().await?).await?;
        Ok(())
    }

    async fn create_followup(
        &self,
        token: &str,
        message: &MessagePayload,
    ) -> Result<MessageHandle, TransportError> {
        let path = format!("/webhooks/{}/{}?wait=true", self.application_id, token);
        let request = self.with_body(self.request(Method::POST, &path), message, None).await?;
        let created: CreatedMessage = check_status(request.send().await?).await?.json().await?;
        Ok(MessageHandle {
            token: token.to_string(),
            message_id: created.id,
        })
    }

    async fn edit_message(
        &self,
        handle: &MessageHandle,
        message: &MessagePayload,
    ) -> Result<(), TransportError> {
        let request = self
            .with_body(self.request(Method::PATCH, &self.message_path(handle)), message, None)
            .await?;
        check_status(request.send().await?).await?;
        Ok(())
    }

    async fn delete_message(&self, handle: &MessageHandle) -> DeleteOutcome {
        let result = self
            .request(Method::DELETE, &self.message_path(handle))
            .send()
            .await;
        let response = match result {
            Ok(r) => r,
            Err(e) => return DeleteOutcome::Failed(e.to_string()),
        };
        match check_status(response).await {
            Ok(_) => DeleteOutcome::Deleted,
            Err(TransportError::NotFound) => DeleteOutcome::NotFound,
            Err(TransportError::Forbidden) => DeleteOutcome::Denied,
            Err(e) => DeleteOutcome::Failed(e.to_string()),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{FileUpload, MessagePayload};
    use testing::{Call, RecordingTransport};
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport_for(server: &MockServer) -> RestTransport {
        RestTransport::new(server.uri(), "app".into(), "secret".into(), 2_000).unwrap()
    }

    #[tokio::test]
    async fn test_first_send_responds_then_follows_up() {
        let transport = RecordingTransport::new();
        let ctx = InteractionCtx::new("i1", "tok", "u1");

        let first = send_message(&transport, &ctx, MessagePayload::text("a")).await.unwrap();
        let second = send_message(&transport, &ctx, MessagePayload::text("b")).await.unwrap();

        assert_eq!(first, MessageHandle::original("tok"));
        assert_eq!(second.message_id, "msg-0");
        let calls = transport.calls();
        assert!(matches!(calls[0], Call::Respond { .. }));
        assert!(matches!(calls[1], Call::Followup { .. }));
        assert!(ctx.is_acknowledged());
    }

    #[tokio::test]
    async fn test_failed_initial_response_leaves_interaction_unacknowledged() {
        let transport = RecordingTransport::new();
        transport.push_response_error(TransportError::Status {
            status: 503,
            body: "unavailable".into(),
        });
        let ctx = InteractionCtx::new("i1", "tok", "u1");

        assert!(send_message(&transport, &ctx, MessagePayload::text("card")).await.is_err());
        assert!(!ctx.is_acknowledged());

        // The error notice still goes out as the initial response
        let handle = send_message(&transport, &ctx, MessagePayload::text("notice")).await.unwrap();
        assert_eq!(handle, MessageHandle::original("tok"));
        let calls = transport.calls();
        assert_eq!(calls.len(), 1);
        assert!(matches!(calls[0], Call::Respond { .. }));
        assert!(ctx.is_acknowledged());
    }

    #[tokio::test]
    async fn test_failed_defer_can_be_retried() {
        let transport = RecordingTransport::new();
        transport.push_response_error(TransportError::Forbidden);
        let ctx = InteractionCtx::new("i1", "tok", "u1");

        assert!(defer_update(&transport, &ctx).await.is_err());
        assert!(!ctx.is_acknowledged());
        defer_update(&transport, &ctx).await.unwrap();
        assert!(ctx.is_acknowledged());
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_defer_update_only_acknowledges_once() {
        let transport = RecordingTransport::new();
        let ctx = InteractionCtx::new("i1", "tok", "u1");
        defer_update(&transport, &ctx).await.unwrap();
        defer_update(&transport, &ctx).await.unwrap();
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_rest_delete_maps_status_codes() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/webhooks/app/t1/messages/m1"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/webhooks/app/t1/messages/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/webhooks/app/t1/messages/locked"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/webhooks/app/t1/messages/boom"))
            .respond_with(ResponseTemplate::new(500).set_body_string("oops"))
            .mount(&server)
            .await;

        let transport = transport_for(&server);
        let handle = |id: &str| MessageHandle {
            token: "t1".into(),
            message_id: id.into(),
        };

        assert_eq!(transport.delete_message(&handle("m1")).await, DeleteOutcome::Deleted);
        assert_eq!(transport.delete_message(&handle("gone")).await, DeleteOutcome::NotFound);
        assert_eq!(transport.delete_message(&handle("locked")).await, DeleteOutcome::Denied);
        assert!(matches!(
            transport.delete_message(&handle("boom")).await,
            DeleteOutcome::Failed(_)
        ));
    }

    #[tokio::test]
    async fn test_rest_followup_returns_created_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/webhooks/app/t1"))
            .and(header("Authorization", "Bot secret"))
            .and(body_string_contains("\"flags\":64"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "777"})))
            .mount(&server)
            .await;

        let transport = transport_for(&server);
        let handle = transport
            .create_followup("t1", &MessagePayload::text("hello").ephemeral())
            .await
            .unwrap();
        assert_eq!(handle.message_id, "777");
        assert_eq!(handle.token, "t1");
    }

    #[tokio::test]
    async fn test_rest_callback_posts_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/interactions/i9/t9/callback"))
            .and(body_string_contains("\"type\":6"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let transport = transport_for(&server);
        transport
            .create_response("i9", "t9", &InteractionResponse::deferred_update())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_rest_edit_propagates_forbidden() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let transport = transport_for(&server);
        let err = transport
            .edit_message(&MessageHandle::original("t1"), &MessagePayload::text("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Forbidden));
    }

    #[tokio::test]
    async fn test_rest_attachment_is_sent_as_multipart() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("STORM RAGE.jpg");
        std::fs::write(&image, b"jpeg-bytes").unwrap();

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/webhooks/app/t1"))
            .and(body_string_contains("payload_json"))
            .and(body_string_contains("jpeg-bytes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "1"})))
            .expect(1)
            .mount(&server)
            .await;

        let transport = transport_for(&server);
        let payload = MessagePayload::text("x").with_file(FileUpload {
            path: image,
            filename: "STORM_RAGE.jpg".into(),
        });
        transport.create_followup("t1", &payload).await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_attachment_file_is_an_error() {
        let server = MockServer::start().await;
        let transport = transport_for(&server);
        let payload = MessagePayload::text("x").with_file(FileUpload {
            path: "/definitely/not/here.jpg".into(),
            filename: "here.jpg".into(),
        });
        let err = transport.create_followup("t1", &payload).await.unwrap_err();
        assert!(matches!(err, TransportError::Attachment(_)));
    }
}

//! reqwest を使った RestApi 実装
//!
//! - 全リクエストに `Authorization: Bearer <token>` を付与
//! - レスポンスは `ApiResponse` エンベロープとして解釈
//! - 401 または `"Invalid token."` を受け取ったらトークンを破棄する

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode, Url, multipart};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::{
    domain::{
        ApiError, Conversation, ConversationId, ConversationUpdate, CreateConversationRequest,
        Credentials, Message, MessageId, ProfileUpdate, PushSubscription, RestApi,
        SendMessageRequest, Signal, User, UserId,
    },
    infrastructure::dto::http::{ApiResponse, TokenResponse, VapidKeyResponse},
};

/// Message the backend uses when it no longer accepts a token.
pub const INVALID_TOKEN_MESSAGE: &str = "Invalid token.";

fn request_error(e: reqwest::Error) -> ApiError {
    ApiError::Request(e.to_string())
}

fn is_invalid_token<T>(envelope: &ApiResponse<T>) -> bool {
    envelope.message.as_deref() == Some(INVALID_TOKEN_MESSAGE)
        || envelope.error.as_deref() == Some(INVALID_TOKEN_MESSAGE)
}

/// reqwest を使った RestApi 実装
#[derive(Debug, Clone)]
pub struct HttpRestApi {
    client: reqwest::Client,
    base_url: String,
    token: Signal<Option<String>>,
}

impl HttpRestApi {
    /// `token` は認証状態と共有するセル。無効なトークンを検知するとここが `None` になる。
    pub fn new(base_url: impl Into<String>, token: Signal<Option<String>>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn invalidate_token(&self) {
        if self.token.update_if(|token| token.as_ref().map(|_| None)) {
            tracing::warn!("Session token rejected by server; cleared");
        }
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<ApiResponse<T>, ApiError> {
        let builder = match self.token.get() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        };

        let response = builder.send().await.map_err(request_error)?;
        let status = response.status();
        let body = response.text().await.map_err(request_error)?;

        if !status.is_success() {
            let envelope = serde_json::from_str::<ApiResponse<Value>>(&body).ok();
            if status == StatusCode::UNAUTHORIZED || envelope.as_ref().is_some_and(is_invalid_token)
            {
                self.invalidate_token();
                return Err(ApiError::InvalidToken);
            }
            let message = envelope.map(|e| e.reason()).unwrap_or(body);
            tracing::debug!("HTTP {} from server: {}", status, message);
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let envelope: ApiResponse<T> =
            serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))?;
        if !envelope.success && is_invalid_token(&envelope) {
            self.invalidate_token();
            return Err(ApiError::InvalidToken);
        }
        Ok(envelope)
    }

    async fn data<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ApiError> {
        self.execute::<T>(builder).await?.into_data()
    }

    async fn unit(&self, builder: RequestBuilder) -> Result<(), ApiError> {
        self.execute::<Value>(builder).await?.into_unit()
    }
}

#[async_trait]
impl RestApi for HttpRestApi {
    async fn login(&self, credentials: Credentials) -> Result<String, ApiError> {
        let request = self.client.post(self.url("/auth/login")).json(&credentials);
        let TokenResponse { token } = self.data(request).await?;
        Ok(token)
    }

    async fn logout(&self) -> Result<(), ApiError> {
        self.unit(self.client.delete(self.url("/auth/logout"))).await
    }

    async fn get_profile(&self) -> Result<User, ApiError> {
        self.data(self.client.get(self.url("/auth/profile"))).await
    }

    async fn update_profile(&self, update: ProfileUpdate) -> Result<User, ApiError> {
        let request = self.client.patch(self.url("/users/profile")).json(&update);
        self.data(request).await
    }

    async fn upload_avatar(&self, file_name: String, bytes: Vec<u8>) -> Result<User, ApiError> {
        let part = multipart::Part::bytes(bytes).file_name(file_name);
        let form = multipart::Form::new().part("avatar", part);
        let request = self.client.post(self.url("/users/avatar")).multipart(form);
        self.data(request).await
    }

    async fn get_contacts(&self) -> Result<Vec<User>, ApiError> {
        self.data(self.client.get(self.url("/users/contacts"))).await
    }

    async fn get_conversations(&self) -> Result<Vec<Conversation>, ApiError> {
        self.data(self.client.get(self.url("/conversations"))).await
    }

    async fn get_conversation(&self, id: ConversationId) -> Result<Conversation, ApiError> {
        let request = self.client.get(self.url(&format!("/conversations/{}", id)));
        self.data(request).await
    }

    async fn create_conversation(
        &self,
        request: CreateConversationRequest,
    ) -> Result<Conversation, ApiError> {
        let request = self.client.post(self.url("/conversations")).json(&request);
        self.data(request).await
    }

    async fn update_conversation(
        &self,
        id: ConversationId,
        update: ConversationUpdate,
    ) -> Result<Conversation, ApiError> {
        let request = self
            .client
            .patch(self.url(&format!("/conversations/{}", id)))
            .json(&update);
        self.data(request).await
    }

    async fn delete_conversation(&self, id: ConversationId) -> Result<(), ApiError> {
        let request = self
            .client
            .delete(self.url(&format!("/conversations/{}", id)));
        self.unit(request).await
    }

    async fn search_conversations(&self, query: String) -> Result<Vec<Conversation>, ApiError> {
        let request = self
            .client
            .get(self.url("/conversations/search"))
            .query(&[("q", query)]);
        self.data(request).await
    }

    async fn add_participant(
        &self,
        id: ConversationId,
        user_id: UserId,
    ) -> Result<Conversation, ApiError> {
        let request = self
            .client
            .post(self.url(&format!("/conversations/{}/participants", id)))
            .json(&json!({ "userId": user_id }));
        self.data(request).await
    }

    async fn remove_participant(
        &self,
        id: ConversationId,
        user_id: UserId,
    ) -> Result<Conversation, ApiError> {
        let request = self.client.delete(self.url(&format!(
            "/conversations/{}/participants/{}",
            id, user_id
        )));
        self.data(request).await
    }

    async fn get_messages(
        &self,
        id: ConversationId,
        page: u32,
        limit: u32,
    ) -> Result<Vec<Message>, ApiError> {
        let request = self
            .client
            .get(self.url(&format!("/conversations/{}/messages", id)))
            .query(&[("page", page), ("limit", limit)]);
        self.data(request).await
    }

    async fn send_message(&self, request: SendMessageRequest) -> Result<Message, ApiError> {
        let request = self.client.post(self.url("/messages")).json(&request);
        self.data(request).await
    }

    async fn mark_messages_read(
        &self,
        id: ConversationId,
        message_ids: Vec<MessageId>,
    ) -> Result<(), ApiError> {
        let request = self
            .client
            .patch(self.url(&format!("/conversations/{}/messages/read", id)))
            .json(&json!({ "messageIds": message_ids }));
        self.unit(request).await
    }

    async fn get_vapid_public_key(&self) -> Result<String, ApiError> {
        let request = self.client.get(self.url("/notifications/vapid-public-key"));
        let VapidKeyResponse { public_key } = self.data(request).await?;
        Ok(public_key)
    }

    async fn register_push_subscription(
        &self,
        subscription: PushSubscription,
    ) -> Result<(), ApiError> {
        let request = self
            .client
            .post(self.url("/notifications/push/subscribe"))
            .json(&subscription);
        self.unit(request).await
    }

    async fn unregister_push_subscription(&self, endpoint: String) -> Result<(), ApiError> {
        let mut url = Url::parse(&self.url("/notifications/push/unsubscribe"))
            .map_err(|e| ApiError::Request(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| ApiError::Request("API URL cannot be a base".to_string()))?
            .push(&endpoint);
        self.unit(self.client.delete(url)).await
    }

    async fn send_test_notification(&self) -> Result<(), ApiError> {
        let request = self
            .client
            .post(self.url("/notifications/push/test"))
            .json(&json!({}));
        self.unit(request).await
    }
}

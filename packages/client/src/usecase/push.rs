//! Push notification registration and preferences.
//!
//! The platform push client (service worker, OS notification service) is
//! outside this crate: it takes the VAPID key from [`PushService::vapid_public_key`]
//! and hands the resulting subscription back to [`PushService::subscribe`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    domain::{ApiError, ConversationId, PushSubscription, RestApi, Signal, StorageError},
    infrastructure::storage::{LocalStore, NOTIFICATION_PREFERENCES_KEY},
};

/// Notification toggles kept on this device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationPreferences {
    pub likes_and_comments: bool,
    pub new_followers: bool,
    pub direct_messages: bool,
    pub do_not_disturb: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            likes_and_comments: true,
            new_followers: true,
            direct_messages: true,
            do_not_disturb: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushData {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<ConversationId>,
}

/// Payload delivered through the push service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PushPayload {
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub badge: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub data: Option<PushData>,
}

impl PushPayload {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn is_message(&self) -> bool {
        self.data
            .as_ref()
            .is_some_and(|data| data.kind.as_deref() == Some("message"))
    }

    /// Conversation to open when the notification is clicked.
    pub fn deep_link(&self) -> Option<ConversationId> {
        self.data
            .as_ref()
            .filter(|_| self.is_message())
            .and_then(|data| data.conversation_id.clone())
    }
}

#[derive(Clone)]
pub struct PushService {
    api: Arc<dyn RestApi>,
    storage: Arc<LocalStore>,
    vapid_public_key: Signal<Option<String>>,
    subscription: Signal<Option<PushSubscription>>,
    is_subscribed: Signal<bool>,
    preferences: Signal<NotificationPreferences>,
}

impl PushService {
    pub fn new(api: Arc<dyn RestApi>, storage: Arc<LocalStore>) -> Self {
        let preferences = storage
            .get::<NotificationPreferences>(NOTIFICATION_PREFERENCES_KEY)
            .unwrap_or_default();
        Self {
            api,
            storage,
            vapid_public_key: Signal::default(),
            subscription: Signal::default(),
            is_subscribed: Signal::new(false),
            preferences: Signal::new(preferences),
        }
    }

    pub fn is_subscribed(&self) -> Signal<bool> {
        self.is_subscribed.clone()
    }

    pub fn preferences(&self) -> Signal<NotificationPreferences> {
        self.preferences.clone()
    }

    /// Fetch the server's VAPID key (cached after the first success).
    pub async fn vapid_public_key(&self) -> Result<String, ApiError> {
        if let Some(key) = self.vapid_public_key.get() {
            return Ok(key);
        }
        let key = self.api.get_vapid_public_key().await?;
        self.vapid_public_key.set(Some(key.clone()));
        Ok(key)
    }

    pub async fn subscribe(&self, mut subscription: PushSubscription) -> Result<(), ApiError> {
        if subscription.vapid_public_key.is_none() {
            subscription.vapid_public_key = self.vapid_public_key.get();
        }
        self.api
            .register_push_subscription(subscription.clone())
            .await?;
        tracing::info!("Push subscription registered");
        self.subscription.set(Some(subscription));
        self.is_subscribed.set(true);
        Ok(())
    }

    /// Returns `false` when there was nothing to unsubscribe.
    pub async fn unsubscribe(&self) -> Result<bool, ApiError> {
        let Some(subscription) = self.subscription.get() else {
            return Ok(false);
        };
        self.api
            .unregister_push_subscription(subscription.endpoint)
            .await?;
        tracing::info!("Push subscription removed");
        self.subscription.set(None);
        self.is_subscribed.set(false);
        Ok(true)
    }

    pub async fn send_test_notification(&self) -> Result<(), ApiError> {
        self.api.send_test_notification().await
    }

    pub fn set_preferences(&self, preferences: NotificationPreferences) -> Result<(), StorageError> {
        self.preferences.set(preferences);
        self.storage.set(NOTIFICATION_PREFERENCES_KEY, &preferences)
    }

    /// Whether an arriving payload should be shown under the current preferences.
    pub fn should_notify(&self, payload: &PushPayload) -> bool {
        self.preferences.with(|prefs| {
            !prefs.do_not_disturb && (!payload.is_message() || prefs.direct_messages)
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::{PushKeys, rest::MockRestApi};

    use super::*;

    fn subscription() -> PushSubscription {
        PushSubscription {
            endpoint: "https://push.example/abc".to_string(),
            keys: PushKeys {
                p256dh: "p256".to_string(),
                auth: "auth".to_string(),
            },
            vapid_public_key: None,
        }
    }

    #[tokio::test]
    async fn test_subscribe_then_unsubscribe_round_trip() {
        // テスト項目: 購読登録で VAPID キーが添付され、解除ではエンドポイントが送られる
        // given (前提条件):
        let mut api = MockRestApi::new();
        api.expect_get_vapid_public_key()
            .times(1)
            .returning(|| Ok("vapid-key".to_string()));
        api.expect_register_push_subscription()
            .withf(|s| s.vapid_public_key.as_deref() == Some("vapid-key"))
            .times(1)
            .returning(|_| Ok(()));
        api.expect_unregister_push_subscription()
            .withf(|endpoint| endpoint == "https://push.example/abc")
            .times(1)
            .returning(|_| Ok(()));
        let push = PushService::new(Arc::new(api), Arc::new(LocalStore::in_memory()));

        // when (操作):
        push.vapid_public_key().await.unwrap();
        push.vapid_public_key().await.unwrap();
        push.subscribe(subscription()).await.unwrap();
        let subscribed = push.is_subscribed().get();
        let removed = push.unsubscribe().await.unwrap();
        let removed_again = push.unsubscribe().await.unwrap();

        // then (期待する結果):
        assert!(subscribed);
        assert!(removed);
        assert!(!removed_again);
        assert!(!push.is_subscribed().get());
    }

    #[test]
    fn test_message_payload_deep_links_to_conversation() {
        // テスト項目: type が message のペイロードは会話 ID へのディープリンクを持つ
        // given (前提条件):
        let text = r#"{
            "title": "bob",
            "body": "hi",
            "data": {"type": "message", "conversationId": "c1"}
        }"#;
        let other = r#"{"title": "news", "data": {"type": "follow"}}"#;

        // when (操作):
        let payload = PushPayload::parse(text).unwrap();
        let other = PushPayload::parse(other).unwrap();

        // then (期待する結果):
        assert_eq!(payload.deep_link(), Some(ConversationId::new("c1").unwrap()));
        assert_eq!(payload.icon, None);
        assert_eq!(other.deep_link(), None);
    }

    #[test]
    fn test_preferences_persist_and_gate_notifications() {
        // テスト項目: 通知設定は保存され、おやすみモードでは通知しない
        // given (前提条件):
        let storage = Arc::new(LocalStore::in_memory());
        storage
            .set(NOTIFICATION_PREFERENCES_KEY, &serde_json::json!({"newFollowers": false}))
            .unwrap();
        let push = PushService::new(Arc::new(MockRestApi::new()), Arc::clone(&storage));
        let payload = PushPayload::parse(r#"{"title": "t", "data": {"type": "message"}}"#).unwrap();

        // when (操作):
        let loaded = push.preferences().get();
        let before = push.should_notify(&payload);
        push.set_preferences(NotificationPreferences {
            do_not_disturb: true,
            ..loaded
        })
        .unwrap();

        // then (期待する結果):
        assert!(!loaded.new_followers);
        assert!(loaded.direct_messages);
        assert!(before);
        assert!(!push.should_notify(&payload));
        assert!(
            storage
                .get::<NotificationPreferences>(NOTIFICATION_PREFERENCES_KEY)
                .unwrap()
                .do_not_disturb
        );
    }
}

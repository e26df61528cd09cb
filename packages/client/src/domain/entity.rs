//! Entity
//!
//! バックエンドの REST / イベントストリームが返す形をそのまま表すモデル。
//! フィールド名は wire 形式（camelCase, `_id`）に合わせてある。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::value_object::{ConversationId, MessageId, UserId};

/// ユーザーの状態（プロフィール上の表示用）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Online,
    Offline,
    Away,
    Busy,
}

/// プレゼンスの状態（イベントストリームが運ぶのは online / offline のみ）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Offline,
}

impl From<PresenceStatus> for UserStatus {
    fn from(status: PresenceStatus) -> Self {
        match status {
            PresenceStatus::Online => UserStatus::Online,
            PresenceStatus::Offline => UserStatus::Offline,
        }
    }
}

/// 部分的なユーザー情報（送信者・参加者のスナップショット）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    #[serde(alias = "_id")]
    pub id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<UserStatus>,
}

impl UserSummary {
    /// ID だけが分かっているユーザー
    pub fn from_id(id: UserId) -> Self {
        Self {
            id,
            username: None,
            display_name: None,
            avatar_url: None,
            status: None,
        }
    }

    /// 表示名（display name → username → ID の順で採用）
    pub fn name(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.username.as_deref())
            .unwrap_or(self.id.as_str())
    }
}

/// 自分自身のプロフィール
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(alias = "_id")]
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub avatar_url: String,
    #[serde(default = "default_user_status")]
    pub status: UserStatus,
    #[serde(default)]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

fn default_user_status() -> UserStatus {
    UserStatus::Offline
}

impl User {
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id.clone(),
            username: Some(self.username.clone()),
            display_name: (!self.display_name.is_empty()).then(|| self.display_name.clone()),
            avatar_url: (!self.avatar_url.is_empty()).then(|| self.avatar_url.clone()),
            status: Some(self.status),
        }
    }
}

/// メッセージ種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    Image,
    File,
    Video,
}

/// メッセージ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(rename = "_id", alias = "id")]
    pub id: MessageId,
    pub conversation_id: ConversationId,
    #[serde(rename = "senderId", deserialize_with = "deserialize_user_ref")]
    pub sender: UserSummary,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
    #[serde(default)]
    pub read_by: Vec<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<MessageId>,
}

/// 会話（1 対 1 またはグループ）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    #[serde(rename = "_id", alias = "id")]
    pub id: ConversationId,
    #[serde(default, deserialize_with = "deserialize_user_refs")]
    pub participants: Vec<UserSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub unread_count: u32,
    #[serde(default)]
    pub is_group: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other_participant: Option<UserSummary>,
}

impl Conversation {
    /// 一覧に表示するタイトル
    pub fn title(&self) -> String {
        if let Some(name) = self.display_name.as_deref().filter(|n| !n.is_empty()) {
            return name.to_string();
        }
        if self.is_group {
            return self
                .group_name
                .clone()
                .unwrap_or_else(|| "Group".to_string());
        }
        self.other_participant
            .as_ref()
            .map(|p| p.name().to_string())
            .unwrap_or_else(|| "Conversation".to_string())
    }
}

/// プレゼンス情報
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceEntry {
    pub status: PresenceStatus,
    pub last_seen: DateTime<Utc>,
}

/// The backend sends either a bare user id or a populated user object.
#[derive(Deserialize)]
#[serde(untagged)]
enum UserRef {
    Id(UserId),
    Summary(UserSummary),
}

impl From<UserRef> for UserSummary {
    fn from(user_ref: UserRef) -> Self {
        match user_ref {
            UserRef::Id(id) => UserSummary::from_id(id),
            UserRef::Summary(summary) => summary,
        }
    }
}

pub(crate) fn deserialize_user_ref<'de, D>(deserializer: D) -> Result<UserSummary, D::Error>
where
    D: Deserializer<'de>,
{
    UserRef::deserialize(deserializer).map(UserSummary::from)
}

fn deserialize_user_refs<'de, D>(deserializer: D) -> Result<Vec<UserSummary>, D::Error>
where
    D: Deserializer<'de>,
{
    Vec::<UserRef>::deserialize(deserializer)
        .map(|refs| refs.into_iter().map(UserSummary::from).collect())
}

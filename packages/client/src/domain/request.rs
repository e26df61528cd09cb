//! Request bodies sent to the REST API.

use serde::{Deserialize, Serialize};

use super::{
    entity::MessageKind,
    value_object::{ConversationId, UserId},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Partial profile update; `None` fields are left as they are.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConversationRequest {
    pub participant_ids: Vec<UserId>,
    #[serde(default)]
    pub is_group: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_avatar: Option<String>,
}

impl CreateConversationRequest {
    pub fn direct(other: UserId) -> Self {
        Self {
            participant_ids: vec![other],
            is_group: false,
            group_name: None,
            group_avatar: None,
        }
    }

    pub fn group(name: impl Into<String>, members: Vec<UserId>) -> Self {
        Self {
            participant_ids: members,
            is_group: true,
            group_name: Some(name.into()),
            group_avatar: None,
        }
    }
}

/// Partial conversation update (group name / avatar).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_avatar: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub conversation_id: ConversationId,
    pub content: String,
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

impl SendMessageRequest {
    pub fn text(conversation_id: ConversationId, content: impl Into<String>) -> Self {
        Self {
            conversation_id,
            content: content.into(),
            kind: MessageKind::Text,
            file_url: None,
            file_name: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushKeys {
    pub p256dh: String,
    pub auth: String,
}

/// Subscription produced by the platform push client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushSubscription {
    pub endpoint: String,
    pub keys: PushKeys,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vapid_public_key: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_conversation_request_wire_shape() {
        // テスト項目: 会話作成リクエストが camelCase の JSON になる
        // given (前提条件):
        let request = CreateConversationRequest::group(
            "team",
            vec![UserId::new("u1").unwrap(), UserId::new("u2").unwrap()],
        );

        // when (操作):
        let json = serde_json::to_value(&request).unwrap();

        // then (期待する結果):
        assert_eq!(
            json,
            serde_json::json!({
                "participantIds": ["u1", "u2"],
                "isGroup": true,
                "groupName": "team"
            })
        );
    }

    #[test]
    fn test_profile_update_omits_unset_fields() {
        // テスト項目: 未指定のフィールドはリクエストに含まれない
        // given (前提条件):
        let update = ProfileUpdate {
            bio: Some("hello".to_string()),
            ..Default::default()
        };

        // when (操作):
        let json = serde_json::to_value(&update).unwrap();

        // then (期待する結果):
        assert_eq!(json, serde_json::json!({"bio": "hello"}));
    }
}

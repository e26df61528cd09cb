//! Value Object
//!
//! 識別子は全てバックエンドが払い出す不透明な文字列。
//! 空文字列だけは不正な値として拒否する（受信イベントの防御的パース）。

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Value Object の生成エラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueObjectError {
    #[error("{0} must not be empty")]
    Empty(&'static str),
}

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// 新しい識別子を作成（空文字列はエラー）
            pub fn new(value: impl Into<String>) -> Result<Self, ValueObjectError> {
                let value = value.into();
                if value.trim().is_empty() {
                    return Err(ValueObjectError::Empty($label));
                }
                Ok(Self(value))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValueObjectError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

opaque_id!(
    /// 会話 ID
    ConversationId,
    "ConversationId"
);

opaque_id!(
    /// ユーザー ID
    UserId,
    "UserId"
);

opaque_id!(
    /// メッセージ ID
    MessageId,
    "MessageId"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_rejects_empty_string() {
        // テスト項目: 空文字列や空白のみの ID は生成できない
        // given (前提条件):
        let empty = "";
        let blank = "   ";

        // when (操作):
        let r1 = ConversationId::new(empty);
        let r2 = UserId::new(blank);

        // then (期待する結果):
        assert_eq!(r1, Err(ValueObjectError::Empty("ConversationId")));
        assert_eq!(r2, Err(ValueObjectError::Empty("UserId")));
    }

    #[test]
    fn test_id_deserialize_rejects_empty_string() {
        // テスト項目: JSON から空の ID をデシリアライズするとエラーになる
        // given (前提条件):
        let json = r#""""#;

        // when (操作):
        let result = serde_json::from_str::<MessageId>(json);

        // then (期待する結果):
        assert!(result.is_err());
    }

    #[test]
    fn test_id_serializes_as_plain_string() {
        // テスト項目: ID は素の文字列としてシリアライズされる
        // given (前提条件):
        let id = ConversationId::new("c1").unwrap();

        // when (操作):
        let json = serde_json::to_string(&id).unwrap();

        // then (期待する結果):
        assert_eq!(json, r#""c1""#);
        assert_eq!(id.to_string(), "c1");
    }
}

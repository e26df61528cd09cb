//! Domain logic for the conversation list.
//!
//! This module contains pure functions that implement state transitions
//! without side effects, making them easy to test. Every transition returns
//! a new list; the input is never mutated.

use super::{
    entity::{Conversation, Message, UserStatus},
    value_object::{ConversationId, MessageId, UserId},
};

/// Find a conversation by id.
pub fn find<'a>(conversations: &'a [Conversation], id: &ConversationId) -> Option<&'a Conversation> {
    conversations.iter().find(|c| &c.id == id)
}

/// Sum of every conversation's unread counter.
pub fn total_unread(conversations: &[Conversation]) -> u32 {
    conversations
        .iter()
        .fold(0u32, |total, c| total.saturating_add(c.unread_count))
}

/// Check if a message id is present in a message list.
pub fn contains_message(messages: &[Message], id: &MessageId) -> bool {
    messages.iter().any(|m| &m.id == id)
}

/// Check if `message_id` is already the denormalized last message of the conversation.
pub fn is_last_message(
    conversations: &[Conversation],
    conversation_id: &ConversationId,
    message_id: &MessageId,
) -> bool {
    find(conversations, conversation_id)
        .and_then(|c| c.last_message.as_ref())
        .is_some_and(|m| &m.id == message_id)
}

/// Apply `f` to the conversation matching `id`; other entries are cloned as is.
fn map_matching(
    conversations: &[Conversation],
    id: &ConversationId,
    f: impl Fn(&Conversation) -> Conversation,
) -> Vec<Conversation> {
    conversations
        .iter()
        .map(|c| if &c.id == id { f(c) } else { c.clone() })
        .collect()
}

/// Update the denormalized last message and last-updated time.
pub fn with_last_message(conversations: &[Conversation], message: &Message) -> Vec<Conversation> {
    map_matching(conversations, &message.conversation_id, |c| Conversation {
        last_message: Some(message.clone()),
        last_updated: Some(message.timestamp),
        ..c.clone()
    })
}

/// Increment the unread counter by one.
pub fn with_unread_incremented(
    conversations: &[Conversation],
    id: &ConversationId,
) -> Vec<Conversation> {
    map_matching(conversations, id, |c| Conversation {
        unread_count: c.unread_count.saturating_add(1),
        ..c.clone()
    })
}

/// Reset the unread counter to zero.
pub fn with_unread_cleared(conversations: &[Conversation], id: &ConversationId) -> Vec<Conversation> {
    map_matching(conversations, id, |c| Conversation {
        unread_count: 0,
        ..c.clone()
    })
}

/// Patch a user's status into every conversation that shows that user:
/// the cached other participant of direct conversations and the matching
/// participant entry of group conversations.
///
/// Returns `None` when no conversation references the user.
pub fn with_user_status(
    conversations: &[Conversation],
    user_id: &UserId,
    status: UserStatus,
) -> Option<Vec<Conversation>> {
    let mut touched = false;

    let updated = conversations
        .iter()
        .map(|c| {
            if !c.is_group {
                match &c.other_participant {
                    Some(other) if &other.id == user_id => {
                        touched = true;
                        let mut other = other.clone();
                        other.status = Some(status);
                        Conversation {
                            other_participant: Some(other),
                            ..c.clone()
                        }
                    }
                    _ => c.clone(),
                }
            } else if c.participants.iter().any(|p| &p.id == user_id) {
                touched = true;
                let participants = c
                    .participants
                    .iter()
                    .map(|p| {
                        let mut p = p.clone();
                        if &p.id == user_id {
                            p.status = Some(status);
                        }
                        p
                    })
                    .collect();
                Conversation {
                    participants,
                    ..c.clone()
                }
            } else {
                c.clone()
            }
        })
        .collect();

    touched.then_some(updated)
}

/// Replace a conversation in place by id. Unknown ids leave the list unchanged.
pub fn with_replaced(conversations: &[Conversation], updated: &Conversation) -> Vec<Conversation> {
    map_matching(conversations, &updated.id, |_| updated.clone())
}

/// Put a conversation at the top of the list, dropping any older copy.
pub fn with_prepended(conversations: &[Conversation], conversation: Conversation) -> Vec<Conversation> {
    std::iter::once(conversation.clone())
        .chain(
            conversations
                .iter()
                .filter(|c| c.id != conversation.id)
                .cloned(),
        )
        .collect()
}

/// Remove a conversation by id.
pub fn without(conversations: &[Conversation], id: &ConversationId) -> Vec<Conversation> {
    conversations.iter().filter(|c| &c.id != id).cloned().collect()
}


#[cfg(test)]
mod tests {
    use super::fixtures::{direct, group, message};
    use super::*;

    fn cid(id: &str) -> ConversationId {
        ConversationId::new(id).unwrap()
    }

    #[test]
    fn test_with_last_message_updates_only_matching_conversation() {
        // テスト項目: 最終メッセージは対象の会話にだけ反映される
        // given (前提条件):
        let conversations = vec![direct("c1", "bob"), direct("c2", "carol")];
        let msg = message("m1", "c2", "carol");

        // when (操作):
        let updated = with_last_message(&conversations, &msg);

        // then (期待する結果):
        assert!(updated[0].last_message.is_none());
        assert_eq!(updated[1].last_message.as_ref().unwrap().id, msg.id);
        assert_eq!(updated[1].last_updated, Some(msg.timestamp));
        // 元のリストは変更されない
        assert!(conversations[1].last_message.is_none());
    }

    #[test]
    fn test_unread_increment_and_clear() {
        // テスト項目: 未読数の加算とリセットが対象の会話にだけ作用する
        // given (前提条件):
        let conversations = vec![direct("c1", "bob"), direct("c2", "carol")];

        // when (操作):
        let once = with_unread_incremented(&conversations, &cid("c1"));
        let twice = with_unread_incremented(&once, &cid("c1"));
        let cleared = with_unread_cleared(&twice, &cid("c1"));

        // then (期待する結果):
        assert_eq!(twice[0].unread_count, 2);
        assert_eq!(twice[1].unread_count, 0);
        assert_eq!(total_unread(&twice), 2);
        assert_eq!(cleared[0].unread_count, 0);
    }

    #[test]
    fn test_total_unread_saturates() {
        // テスト項目: 未読数の合計はオーバーフローしない
        // given (前提条件):
        let mut a = direct("c1", "bob");
        a.unread_count = u32::MAX;
        let mut b = direct("c2", "carol");
        b.unread_count = 3;

        // when (操作):
        let total = total_unread(&[a, b]);

        // then (期待する結果):
        assert_eq!(total, u32::MAX);
    }

    #[test]
    fn test_with_user_status_patches_direct_and_group() {
        // テスト項目: プレゼンスが 1 対 1 の相手とグループの参加者の両方に反映される
        // given (前提条件):
        let conversations = vec![
            direct("c1", "bob"),
            group("g1", &["me", "bob", "carol"]),
            direct("c2", "carol"),
        ];
        let bob = UserId::new("bob").unwrap();

        // when (操作):
        let updated = with_user_status(&conversations, &bob, UserStatus::Online).unwrap();

        // then (期待する結果):
        assert_eq!(
            updated[0].other_participant.as_ref().unwrap().status,
            Some(UserStatus::Online)
        );
        let bob_in_group = updated[1].participants.iter().find(|p| p.id == bob).unwrap();
        assert_eq!(bob_in_group.status, Some(UserStatus::Online));
        assert_eq!(updated[2], conversations[2]);
    }

    #[test]
    fn test_with_user_status_unknown_user_returns_none() {
        // テスト項目: どの会話にも登場しないユーザーの場合は None を返す
        // given (前提条件):
        let conversations = vec![direct("c1", "bob")];
        let stranger = UserId::new("zed").unwrap();

        // when (操作):
        let result = with_user_status(&conversations, &stranger, UserStatus::Offline);

        // then (期待する結果):
        assert!(result.is_none());
    }

    #[test]
    fn test_with_prepended_drops_older_copy() {
        // テスト項目: 既存の会話を先頭に追加すると古いコピーが取り除かれる
        // given (前提条件):
        let conversations = vec![direct("c1", "bob"), direct("c2", "carol")];
        let mut fresh = direct("c2", "carol");
        fresh.display_name = Some("Carol".to_string());

        // when (操作):
        let updated = with_prepended(&conversations, fresh);

        // then (期待する結果):
        assert_eq!(updated.len(), 2);
        assert_eq!(updated[0].display_name.as_deref(), Some("Carol"));
        assert_eq!(updated[1].id, cid("c1"));
    }

    #[test]
    fn test_with_replaced_ignores_unknown_id() {
        // テスト項目: 一覧に無い会話での置き換えは何も変えない
        // given (前提条件):
        let conversations = vec![direct("c1", "bob")];
        let other = direct("c9", "zed");

        // when (操作):
        let updated = with_replaced(&conversations, &other);

        // then (期待する結果):
        assert_eq!(updated, conversations);
    }

    #[test]
    fn test_is_last_message() {
        // テスト項目: 最終メッセージの ID と一致するかを判定できる
        // given (前提条件):
        let msg = message("m1", "c1", "bob");
        let conversations = with_last_message(&[direct("c1", "bob")], &msg);

        // when (操作) / then (期待する結果):
        assert!(is_last_message(&conversations, &cid("c1"), &msg.id));
        assert!(!is_last_message(
            &conversations,
            &cid("c1"),
            &MessageId::new("m2").unwrap()
        ));
        assert!(without(&conversations, &cid("c1")).is_empty());
    }
}

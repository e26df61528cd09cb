//! Domain logic for typing indicators.

use std::collections::HashMap;

use super::{
    entity::Conversation,
    value_object::{ConversationId, UserId},
};

/// conversation id → (user id → is typing)
pub type TypingMap = HashMap<ConversationId, HashMap<UserId, bool>>;

/// Set one user's typing flag.
///
/// Returns `None` when the flag already has that value so callers can skip
/// notifying observers.
pub fn with_typing(
    map: &TypingMap,
    conversation_id: &ConversationId,
    user_id: &UserId,
    is_typing: bool,
) -> Option<TypingMap> {
    let current = map
        .get(conversation_id)
        .and_then(|users| users.get(user_id))
        .copied()
        .unwrap_or(false);
    if current == is_typing {
        return None;
    }

    let mut next = map.clone();
    next.entry(conversation_id.clone())
        .or_default()
        .insert(user_id.clone(), is_typing);
    Some(next)
}

/// Users currently flagged as typing in a conversation, sorted for stable output.
pub fn typing_users(map: &TypingMap, conversation_id: &ConversationId) -> Vec<UserId> {
    let mut users: Vec<UserId> = map
        .get(conversation_id)
        .map(|users| {
            users
                .iter()
                .filter(|(_, typing)| **typing)
                .map(|(user, _)| user.clone())
                .collect()
        })
        .unwrap_or_default();
    users.sort();
    users
}

/// Indicator line for a conversation, or `None` when nobody is typing.
///
/// Direct conversations always name the other participant; groups only show
/// a count.
pub fn typing_text(conversation: &Conversation, typing_count: usize) -> Option<String> {
    if typing_count == 0 {
        return None;
    }

    if !conversation.is_group {
        let name = conversation
            .other_participant
            .as_ref()
            .map(|p| p.name().to_string())
            .or_else(|| conversation.display_name.clone())
            .unwrap_or_else(|| "Someone".to_string());
        return Some(format!("{} is typing…", name));
    }

    Some(match typing_count {
        1 => "Someone is typing…".to_string(),
        n => format!("{} people are typing…", n),
    })
}

//! Message formatting utilities for terminal display.

use chrono::{DateTime, Utc};
use tayori_shared::time::{
    format_conversation_time, format_full_date_time, format_message_time, time_ago,
};

use crate::domain::{
    Conversation, ConversationId, Message, PresenceEntry, PresenceStatus, User, UserId,
    event::MessageErrorData,
};

const RULE: &str = "------------------------------------------------------------";
const DOUBLE_RULE: &str = "============================================================";
const PREVIEW_CHARS: usize = 40;

fn preview(content: &str) -> String {
    let mut chars = content.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{}…", head)
    } else {
        head
    }
}

/// Message formatter for terminal display
pub struct MessageFormatter;

impl MessageFormatter {
    /// Format the conversation list, numbered from 1 so `/open <n>` can refer to it.
    ///
    /// # Arguments
    ///
    /// * `conversations` - Conversations in display order
    /// * `selected` - The currently selected conversation, marked with `*`
    /// * `now` - Reference instant for relative times
    pub fn format_conversation_list(
        conversations: &[Conversation],
        selected: Option<&ConversationId>,
        now: DateTime<Utc>,
    ) -> String {
        let mut output = String::new();
        output.push_str(&format!("\n{}\nConversations:\n", DOUBLE_RULE));

        if conversations.is_empty() {
            output.push_str("(No conversations)\n");
        }
        for (index, conversation) in conversations.iter().enumerate() {
            let marker = if selected == Some(&conversation.id) {
                "*"
            } else {
                " "
            };
            let unread = match conversation.unread_count {
                0 => String::new(),
                n => format!(" ({})", n),
            };
            output.push_str(&format!(
                "{} {:>2}. {}{}",
                marker,
                index + 1,
                conversation.title(),
                unread
            ));
            if let Some(last) = &conversation.last_message {
                let at = conversation.last_updated.unwrap_or(last.timestamp);
                output.push_str(&format!(
                    " - {}: {} [{}]",
                    last.sender.name(),
                    preview(&last.content),
                    format_conversation_time(at, now)
                ));
            }
            output.push('\n');
        }

        output.push_str(DOUBLE_RULE);
        output.push('\n');
        output
    }

    /// Format one chat message
    ///
    /// # Arguments
    ///
    /// * `message` - The message to show
    /// * `me` - The current user's id, to mark own messages
    /// * `now` - Reference instant for the relative time
    pub fn format_message(message: &Message, me: Option<&UserId>, now: DateTime<Utc>) -> String {
        let suffix = if me == Some(&message.sender.id) {
            " (me)"
        } else {
            ""
        };
        format!(
            "\n{}\n@{}{}: {}\nsent {}\n{}\n",
            RULE,
            message.sender.name(),
            suffix,
            message.content,
            format_message_time(message.timestamp, now),
            RULE
        )
    }

    /// Format the loaded page of a conversation
    pub fn format_history(
        conversation: &Conversation,
        messages: &[Message],
        me: Option<&UserId>,
        now: DateTime<Utc>,
    ) -> String {
        let mut output = format!("\n{}\n{}\n", DOUBLE_RULE, conversation.title());
        if messages.is_empty() {
            output.push_str("(No messages yet)\n");
        }
        for message in messages {
            output.push_str(&Self::format_message(message, me, now));
        }
        output.push_str(DOUBLE_RULE);
        output.push('\n');
        output
    }

    /// Notification for a message that arrived in a conversation other than the open one
    pub fn format_incoming_elsewhere(conversation: Option<&Conversation>, message: &Message) -> String {
        let place = conversation
            .map(|c| c.title())
            .unwrap_or_else(|| message.conversation_id.to_string());
        format!(
            "\n← [{}] {}: {}\n",
            place,
            message.sender.name(),
            preview(&message.content)
        )
    }

    pub fn format_typing(text: &str) -> String {
        format!("\n… {}\n", text)
    }

    pub fn format_presence(user_id: &UserId, entry: &PresenceEntry, now: DateTime<Utc>) -> String {
        match entry.status {
            PresenceStatus::Online => format!("\n+ {} is online\n", user_id),
            PresenceStatus::Offline => format!(
                "\n- {} went offline (last seen {})\n",
                user_id,
                time_ago(entry.last_seen, now)
            ),
        }
    }

    pub fn format_online_users(users: &[UserId]) -> String {
        if users.is_empty() {
            return "\nNobody else is online\n".to_string();
        }
        let names: Vec<&str> = users.iter().map(|u| u.as_str()).collect();
        format!("\nOnline: {}\n", names.join(", "))
    }

    pub fn format_connection_status(connected: bool) -> String {
        if connected {
            "\n● connected\n".to_string()
        } else {
            "\n○ disconnected\n".to_string()
        }
    }

    pub fn format_message_error(error: &MessageErrorData) -> String {
        match &error.error {
            Some(detail) => format!("\n! {} ({})\n", error.message, detail),
            None => format!("\n! {}\n", error.message),
        }
    }

    pub fn format_profile(user: &User) -> String {
        let mut output = format!("\n@{}", user.username);
        if !user.display_name.is_empty() {
            output.push_str(&format!(" ({})", user.display_name));
        }
        output.push('\n');
        if let Some(bio) = &user.bio {
            output.push_str(&format!("  {}\n", bio));
        }
        if let Some(location) = &user.location {
            output.push_str(&format!("  {}\n", location));
        }
        if let Some(created_at) = user.created_at {
            output.push_str(&format!("  joined {}\n", format_full_date_time(created_at)));
        }
        output
    }

    pub fn format_help() -> String {
        [
            "",
            "Commands:",
            "  /login <username> <password>   sign in",
            "  /logout                        sign out and clear local state",
            "  /list                          show conversations",
            "  /open <n|id>                   open a conversation",
            "  /close                         close the open conversation",
            "  /new <userId>                  start a direct conversation",
            "  /group <name> <userId>...      start a group conversation",
            "  /search <query>                search conversations",
            "  /delete <messageId>            delete a message in the open conversation",
            "  /online                        show who is online",
            "  /status <online|offline>       set your presence",
            "  /profile                       show your profile",
            "  /contacts                      show your contacts",
            "  /help                          show this help",
            "  /quit                          exit",
            "Anything else is sent to the open conversation.",
            "",
        ]
        .join("\n")
    }
}

//! Event stream DTOs.
//!
//! Every frame is a JSON text frame of the form `{"event": "<name>", "data": <payload>}`.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use thiserror::Error;

use crate::domain::event::{InboundEvent, OutboundEvent, names};

/// Malformed or unknown inbound frame. Logged and dropped by the transport.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Unknown event '{0}'")]
    UnknownEvent(String),

    #[error("Invalid payload for '{event}': {source}")]
    InvalidPayload {
        event: String,
        source: serde_json::Error,
    },
}

/// Wire envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

fn payload<T: DeserializeOwned>(event: &str, data: Value) -> Result<T, ProtocolError> {
    serde_json::from_value(data).map_err(|source| ProtocolError::InvalidPayload {
        event: event.to_string(),
        source,
    })
}

/// Decode one text frame into a typed inbound event.
pub fn decode_inbound(text: &str) -> Result<InboundEvent, ProtocolError> {
    let Envelope { event, data } = serde_json::from_str(text)?;
    let name = event.as_str();

    let decoded = match name {
        names::MESSAGE_RECEIVE => InboundEvent::MessageReceive(payload(name, data)?),
        names::MESSAGE_ERROR => InboundEvent::MessageError(payload(name, data)?),
        names::MESSAGE_DELETED => InboundEvent::MessageDeleted(payload(name, data)?),
        names::TYPING_START => InboundEvent::TypingStart(payload(name, data)?),
        names::TYPING_STOP => InboundEvent::TypingStop(payload(name, data)?),
        names::USER_ONLINE => InboundEvent::UserOnline(payload(name, data)?),
        names::USER_OFFLINE => InboundEvent::UserOffline(payload(name, data)?),
        names::USER_STATUS_UPDATE => InboundEvent::UserStatusUpdate(payload(name, data)?),
        names::USERS_ONLINE_LIST => InboundEvent::OnlineUsersList(payload(name, data)?),
        names::MESSAGES_READ => InboundEvent::MessagesRead(payload(name, data)?),
        names::CALL_INCOMING => InboundEvent::CallIncoming(payload(name, data)?),
        names::CALL_ANSWERED => InboundEvent::CallAnswered(payload(name, data)?),
        names::CALL_ENDED => InboundEvent::CallEnded(payload(name, data)?),
        names::WEBRTC_OFFER => InboundEvent::WebrtcOffer(payload(name, data)?),
        names::WEBRTC_ANSWER => InboundEvent::WebrtcAnswer(payload(name, data)?),
        names::WEBRTC_ICE_CANDIDATE => InboundEvent::WebrtcIceCandidate(payload(name, data)?),
        _ => return Err(ProtocolError::UnknownEvent(event)),
    };

    Ok(decoded)
}

/// Encode an outbound event as one text frame.
pub fn encode_outbound(event: &OutboundEvent) -> Result<String, serde_json::Error> {
    let data = match event {
        OutboundEvent::MessageSend(d) => serde_json::to_value(d)?,
        OutboundEvent::MessageDelete(d) => serde_json::to_value(d)?,
        OutboundEvent::ConversationJoin(id) | OutboundEvent::ConversationLeave(id) => {
            serde_json::to_value(id)?
        }
        OutboundEvent::TypingStart(d) => serde_json::to_value(d)?,
        OutboundEvent::TypingStop(d) => serde_json::to_value(d)?,
        OutboundEvent::MessagesMarkRead(d) => serde_json::to_value(d)?,
        OutboundEvent::StatusUpdate(d) => serde_json::to_value(d)?,
        OutboundEvent::UsersGetOnline => Value::Null,
        OutboundEvent::CallInitiate(d) => serde_json::to_value(d)?,
        OutboundEvent::CallAnswer(d) => serde_json::to_value(d)?,
        OutboundEvent::CallEnd(d) => serde_json::to_value(d)?,
        OutboundEvent::WebrtcOffer(d)
        | OutboundEvent::WebrtcAnswer(d)
        | OutboundEvent::WebrtcIceCandidate(d) => serde_json::to_value(d)?,
    };

    serde_json::to_string(&Envelope {
        event: event.name().to_string(),
        data,
    })
}

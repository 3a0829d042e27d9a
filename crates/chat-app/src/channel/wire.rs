use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use snafu::{OptionExt, ResultExt};

use super::error::{
    ChannelResult, EncodeFrameSnafu, FrameResult, MalformedSnafu, MissingDataSnafu,
};
use crate::auth::Identity;

/// Relay route that fans a message out to the room.
pub const SEND_MESSAGE_ACTION: &str = "sendMessage";
/// The relay exposes a single room.
pub const DEFAULT_ROOM_ID: &str = "default";

/// Chat message as sent to the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub user: String,
    pub text: String,
    #[serde(rename = "roomId")]
    pub room_id: String,
    /// Milliseconds since the Unix epoch, taken on the sending client.
    pub timestamp: i64,
}

impl OutboundMessage {
    pub fn new(identity: &Identity, text: impl Into<String>, timestamp: i64) -> Self {
        Self {
            user: identity.display_name().to_string(),
            text: text.into(),
            room_id: DEFAULT_ROOM_ID.to_string(),
            timestamp,
        }
    }
}

#[derive(Serialize)]
struct OutboundEnvelope<'a> {
    action: &'static str,
    data: &'a OutboundMessage,
}

/// Chat message as broadcast by the relay. The relay may add fields; only these
/// three are read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub user: String,
    pub text: String,
    /// Sender's clock in Unix milliseconds. `None` when the relay sent no usable
    /// number; such messages are still shown.
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<i64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireTimestamp {
    Millis(i64),
    Fractional(f64),
    Other(serde::de::IgnoredAny),
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let timestamp = Option::<WireTimestamp>::deserialize(deserializer)?;
    Ok(match timestamp {
        Some(WireTimestamp::Millis(millis)) => Some(millis),
        Some(WireTimestamp::Fractional(millis)) if millis.is_finite() => Some(millis as i64),
        Some(WireTimestamp::Fractional(_) | WireTimestamp::Other(_)) | None => None,
    })
}

#[derive(Deserialize)]
struct InboundEnvelope {
    #[serde(default)]
    data: Option<InboundMessage>,
}

/// Serializes the `{"action":"sendMessage","data":{...}}` frame for `message`.
pub fn encode_outbound(message: &OutboundMessage) -> ChannelResult<String> {
    serde_json::to_string(&OutboundEnvelope {
        action: SEND_MESSAGE_ACTION,
        data: message,
    })
    .context(EncodeFrameSnafu {
        stage: "encode-outbound-frame",
    })
}

pub fn decode_inbound(frame: &str) -> FrameResult<InboundMessage> {
    let envelope: InboundEnvelope = serde_json::from_str(frame).context(MalformedSnafu {
        stage: "decode-inbound-frame",
    })?;
    envelope.data.context(MissingDataSnafu {
        stage: "decode-inbound-frame",
    })
}

pub fn current_unix_timestamp_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| i64::try_from(duration.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::error::FrameError;

    #[test]
    fn outbound_frame_matches_relay_format() {
        let message = OutboundMessage::new(
            &Identity::from_login_id("a@b.com"),
            "hello",
            1_700_000_000_000,
        );

        let frame = encode_outbound(&message).expect("encode outbound");

        assert_eq!(
            frame,
            r#"{"action":"sendMessage","data":{"user":"a@b.com","text":"hello","roomId":"default","timestamp":1700000000000}}"#
        );
    }

    #[test]
    fn outbound_text_is_sent_verbatim() {
        let identity = Identity::from_login_id("a@b.com");
        let message = OutboundMessage::new(&identity, "  hi \"there\"  ", 1);
        let frame = encode_outbound(&message).expect("encode outbound");
        let value: serde_json::Value = serde_json::from_str(&frame).expect("valid json");
        assert_eq!(value["data"]["text"], "  hi \"there\"  ");
    }

    #[test]
    fn relay_echo_decodes_to_same_content() {
        let message = OutboundMessage::new(&Identity::from_login_id("a@b.com"), "hello", 42);
        let echoed = encode_outbound(&message).expect("encode outbound");

        let received = decode_inbound(&echoed).expect("decode echo");

        assert_eq!(
            received,
            InboundMessage {
                user: message.user,
                text: message.text,
                timestamp: Some(message.timestamp),
            }
        );
    }

    #[test]
    fn frames_without_data_are_rejected() {
        assert!(matches!(
            decode_inbound(r#"{"foo":1}"#),
            Err(FrameError::MissingData { .. })
        ));
        assert!(matches!(
            decode_inbound(r#"{"data":null}"#),
            Err(FrameError::MissingData { .. })
        ));
    }

    #[test]
    fn malformed_frames_are_rejected() {
        for frame in [
            "not json",
            r#"{"data":"text"}"#,
            r#"{"data":{"user":"a"}}"#,
            r#"{"data":{"user":"a","text":7,"timestamp":1}}"#,
        ] {
            assert!(
                matches!(decode_inbound(frame), Err(FrameError::Malformed { .. })),
                "frame {frame} should be malformed"
            );
        }
    }

    #[test]
    fn messages_without_a_usable_timestamp_are_kept() {
        let cases = [
            (r#"{"data":{"user":"u1","text":"hi"}}"#, None),
            (r#"{"data":{"user":"u1","text":"hi","timestamp":null}}"#, None),
            (r#"{"data":{"user":"u1","text":"hi","timestamp":"soon"}}"#, None),
            (
                r#"{"data":{"user":"u1","text":"hi","timestamp":1700000000000.0}}"#,
                Some(1_700_000_000_000),
            ),
            (r#"{"data":{"user":"u1","text":"hi","timestamp":12.9}}"#, Some(12)),
        ];
        for (frame, timestamp) in cases {
            let message = decode_inbound(frame).expect("message with data is kept");
            assert_eq!(message.user, "u1");
            assert_eq!(message.text, "hi");
            assert_eq!(message.timestamp, timestamp, "frame {frame}");
        }
    }
}

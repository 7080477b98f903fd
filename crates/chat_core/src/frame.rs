use std::borrow::Cow;

use serde::{de, Deserialize, Serialize};
use thiserror::Error;

/// `type` tag of a frame carrying the full text of the current bot reply.
pub const TEXT_KIND: &str = "text";
/// `type` tag of a frame carrying a fragment of tool analysis output.
pub const TOOL_KIND: &str = "tool";

/// Reasons an inbound frame is rejected, or an outbound frame cannot be built.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame is not valid JSON: {0}")]
    NotJson(#[source] serde_json::Error),
    #[error("frame does not have a string `type` and `response`: {0}")]
    UnexpectedShape(#[source] serde_json::Error),
    #[error("unknown frame type `{0}`")]
    UnknownType(String),
    #[error("`{0}` frame has no `response`")]
    MissingResponse(String),
    #[error("failed to encode outbound frame: {0}")]
    Encode(#[source] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct RawInbound {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    response: Option<String>,
}

/// A decoded inbound event. The payload is kept exactly as received; the
/// reducer unescapes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// Full replacement text for the streaming bot message.
    Text(String),
    /// Fragment appended to the tool buffer.
    Tool(String),
}

impl ServerEvent {
    /// Decode one `{ "type": ..., "response": ... }` frame.
    pub fn decode(raw: &str) -> Result<Self, FrameError> {
        let value: serde_json::Value = serde_json::from_str(raw).map_err(FrameError::NotJson)?;
        if !value.is_object() {
            return Err(FrameError::UnexpectedShape(de::Error::custom(
                "expected a JSON object",
            )));
        }
        let frame: RawInbound =
            serde_json::from_value(value).map_err(FrameError::UnexpectedShape)?;

        match frame.kind.as_str() {
            TEXT_KIND => frame
                .response
                .map(ServerEvent::Text)
                .ok_or(FrameError::MissingResponse(frame.kind)),
            TOOL_KIND => frame
                .response
                .map(ServerEvent::Tool)
                .ok_or(FrameError::MissingResponse(frame.kind)),
            _ => Err(FrameError::UnknownType(frame.kind)),
        }
    }
}

/// The only frame the client ever sends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundFrame {
    pub message: String,
}

impl OutboundFrame {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn to_json(&self) -> Result<String, FrameError> {
        serde_json::to_string(self).map_err(FrameError::Encode)
    }
}

/// Replace every literal backslash-`n` pair with a real line break.
///
/// Producers escape newlines inside `response`; converting them back is the
/// consumer's job. Input without such a pair is returned borrowed and unchanged.
pub fn unescape_newlines(text: &str) -> Cow<'_, str> {
    if text.contains("\\n") {
        Cow::Owned(text.replace("\\n", "\n"))
    } else {
        Cow::Borrowed(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_text_and_tool_frames() {
        let text = ServerEvent::decode(r#"{"type":"text","response":"hello"}"#).unwrap();
        assert_eq!(text, ServerEvent::Text("hello".to_string()));

        let tool = ServerEvent::decode(r#"{"response":"step 1","type":"tool"}"#).unwrap();
        assert_eq!(tool, ServerEvent::Tool("step 1".to_string()));
    }

    #[test]
    fn extra_fields_are_ignored() {
        let event =
            ServerEvent::decode(r#"{"type":"text","response":"hi","id":7,"room":"room1"}"#)
                .unwrap();
        assert_eq!(event, ServerEvent::Text("hi".to_string()));
    }

    #[test]
    fn decode_keeps_escaped_newlines() {
        let event = ServerEvent::decode(r#"{"type":"text","response":"a\\nb"}"#).unwrap();
        assert_eq!(event, ServerEvent::Text("a\\nb".to_string()));
    }

    #[test]
    fn rejects_non_json() {
        let err = ServerEvent::decode("not json").unwrap_err();
        assert!(matches!(err, FrameError::NotJson(_)), "got {err:?}");
    }

    #[test]
    fn rejects_wrong_shape() {
        for raw in [
            r#""text""#,
            r#"["text","hi"]"#,
            r#"{"response":"x"}"#,
            r#"{"type":"text","response":5}"#,
        ] {
            let err = ServerEvent::decode(raw).unwrap_err();
            assert!(
                matches!(err, FrameError::UnexpectedShape(_)),
                "{raw} gave {err:?}"
            );
        }
    }

    #[test]
    fn distinguishes_unknown_type() {
        let err = ServerEvent::decode(r#"{"type":"status","response":"busy"}"#).unwrap_err();
        match err {
            FrameError::UnknownType(kind) => assert_eq!(kind, "status"),
            other => panic!("expected UnknownType, got {other:?}"),
        }
    }

    #[test]
    fn known_type_without_response_is_rejected() {
        let err = ServerEvent::decode(r#"{"type":"tool"}"#).unwrap_err();
        assert!(matches!(err, FrameError::MissingResponse(kind) if kind == "tool"));
    }

    #[test]
    fn outbound_frame_shape() {
        let json = OutboundFrame::new("hi \"there\"").to_json().unwrap();
        assert_eq!(json, r#"{"message":"hi \"there\""}"#);
    }

    #[test]
    fn unescape_converts_every_pair() {
        assert_eq!(unescape_newlines("Hi\\nthere\\n\\n!"), "Hi\nthere\n\n!");
    }

    #[test]
    fn unescape_is_identity_without_pairs() {
        for text in ["", "plain", "back\\slash", "real\nnewline", "trailing\\"] {
            let out = unescape_newlines(text);
            assert!(matches!(out, Cow::Borrowed(_)));
            assert_eq!(out, text);
        }
    }
}

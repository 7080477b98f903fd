use tracing::{debug, trace, warn};

use crate::connection::ConnectionError;
use crate::frame::{unescape_newlines, FrameError, OutboundFrame, ServerEvent};
use crate::transcript::{BotMerge, ToolBuffer, Transcript};

/// Destination for outbound frames.
pub trait FrameSink {
    fn send_frame(&self, frame: &OutboundFrame) -> Result<(), ConnectionError>;
}

/// Effect of one inbound event on the chat state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The streaming bot message at `index` received new text.
    Overwrote { index: usize },
    /// A new streaming bot message was appended at `index`.
    Appended { index: usize },
    /// The tool buffer grew; `len` is its new length in bytes.
    ToolAppended { len: usize },
}

impl Applied {
    /// True when the transcript (rather than the tool buffer) changed.
    pub fn touches_transcript(&self) -> bool {
        !matches!(self, Applied::ToolAppended { .. })
    }
}

impl From<BotMerge> for Applied {
    fn from(merge: BotMerge) -> Self {
        match merge {
            BotMerge::Overwrote(index) => Applied::Overwrote { index },
            BotMerge::Appended(index) => Applied::Appended { index },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The draft was blank; nothing happened.
    Empty,
    /// The message was recorded and handed to the sink.
    Sent,
    /// The message was recorded but the sink refused the frame.
    Undelivered,
}

/// Owns the transcript and tool buffer for one session and applies server
/// events and user sends to them.
#[derive(Debug, Default)]
pub struct ChatReducer {
    transcript: Transcript,
    tool_buffer: ToolBuffer,
}

impl ChatReducer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn tool_buffer(&self) -> &ToolBuffer {
        &self.tool_buffer
    }

    /// Decode a raw inbound frame and apply it.
    ///
    /// Rejected frames leave the state untouched and are logged for the
    /// operator; the caller may ignore the error.
    pub fn apply_frame(&mut self, raw: &str) -> Result<Applied, FrameError> {
        match ServerEvent::decode(raw) {
            Ok(event) => Ok(self.apply_event(event)),
            Err(err) => {
                warn!(error = %err, frame_len = raw.len(), "discarding inbound frame");
                trace!(frame = raw, "discarded frame body");
                Err(err)
            }
        }
    }

    pub fn apply_event(&mut self, event: ServerEvent) -> Applied {
        match event {
            ServerEvent::Text(response) => {
                let text = unescape_newlines(&response).into_owned();
                let applied = Applied::from(self.transcript.merge_bot_text(text));
                trace!(?applied, "bot text merged");
                applied
            }
            ServerEvent::Tool(response) => {
                self.tool_buffer.append(&unescape_newlines(&response));
                Applied::ToolAppended {
                    len: self.tool_buffer.len(),
                }
            }
        }
    }

    /// Record the user's draft and send it as a single outbound frame.
    ///
    /// Blank drafts are ignored. Otherwise the draft is appended verbatim,
    /// sent, and cleared, whether or not the sink accepts the frame.
    pub fn send_message<S>(&mut self, draft: &mut String, sink: &S) -> SendOutcome
    where
        S: FrameSink + ?Sized,
    {
        if draft.trim().is_empty() {
            return SendOutcome::Empty;
        }

        let text = std::mem::take(draft);
        let frame = OutboundFrame::new(text.clone());
        self.transcript.push_user(text);

        match sink.send_frame(&frame) {
            Ok(()) => {
                debug!(len = frame.message.len(), "user message sent");
                SendOutcome::Sent
            }
            Err(err) => {
                warn!(error = %err, "user message was not delivered");
                SendOutcome::Undelivered
            }
        }
    }
}

use derive_more::{Display, IsVariant};

/// Who authored a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IsVariant)]
pub enum Sender {
    #[display("user")]
    User,
    #[display("bot")]
    Bot,
}

/// Whether a message may still be overwritten by incoming text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IsVariant)]
pub enum MessageState {
    Streaming,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub sender: Sender,
    pub text: String,
    pub state: MessageState,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            text: text.into(),
            state: MessageState::Complete,
        }
    }

    pub fn streaming_bot(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::Bot,
            text: text.into(),
            state: MessageState::Streaming,
        }
    }

    /// True once no further text will merge into this message.
    pub fn is_final(&self) -> bool {
        self.state.is_complete()
    }

    fn accepts_bot_text(&self) -> bool {
        self.sender.is_bot() && self.state.is_streaming()
    }
}

/// How a bot text update landed in the transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotMerge {
    /// The streaming tail at `index` had its text replaced.
    Overwrote(usize),
    /// A new streaming bot message was appended at `index`.
    Appended(usize),
}

/// Ordered, append-only list of chat messages.
///
/// At most one message is `Streaming`, and only ever the last one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// The tail message if it is still streaming.
    pub fn streaming_tail(&self) -> Option<&Message> {
        self.messages.last().filter(|message| message.state.is_streaming())
    }

    /// Append a user message. A streaming bot tail is sealed first, so the
    /// next reply starts a new bubble.
    pub fn push_user(&mut self, text: impl Into<String>) -> usize {
        if let Some(tail) = self.messages.last_mut() {
            if tail.accepts_bot_text() {
                tail.state = MessageState::Complete;
            }
        }
        self.messages.push(Message::user(text));
        self.messages.len() - 1
    }

    /// Replace the streaming bot tail with `text`, or start a new one.
    pub fn merge_bot_text(&mut self, text: String) -> BotMerge {
        match self.messages.last_mut() {
            Some(tail) if tail.accepts_bot_text() => {
                tail.text = text;
                BotMerge::Overwrote(self.messages.len() - 1)
            }
            _ => {
                self.messages.push(Message::streaming_bot(text));
                BotMerge::Appended(self.messages.len() - 1)
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn from_messages(messages: Vec<Message>) -> Self {
        Self { messages }
    }
}

impl<'a> IntoIterator for &'a Transcript {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Append-only side channel for tool analysis output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolBuffer {
    content: String,
}

impl ToolBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, fragment: &str) {
        self.content.push_str(fragment);
    }

    pub fn as_str(&self) -> &str {
        &self.content
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

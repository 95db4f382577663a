//! Conversation session state.
//!
//! A session owns the ordered message history sent to the chat model and
//! the evidence set behind the most recent answer. The system prompt is
//! pinned as the first message and survives `reset`; history and evidence
//! do not. Sessions are independent: state never leaks between them.

use uuid::Uuid;

use crate::models::{ChatMessage, RetrievalResult};

#[derive(Debug)]
pub struct ConversationSession {
    id: String,
    system_prompt: String,
    messages: Vec<ChatMessage>,
    last_retrieved: RetrievalResult,
}

impl ConversationSession {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        let system_prompt = system_prompt.into();
        Self {
            id: Uuid::new_v4().to_string(),
            messages: vec![ChatMessage::system(system_prompt.clone())],
            system_prompt,
            last_retrieved: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Full message history, system prompt first.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Evidence set behind the most recent answer.
    pub fn last_retrieved(&self) -> &RetrievalResult {
        &self.last_retrieved
    }

    /// True until the first user turn is appended (or after a reset).
    pub fn is_fresh(&self) -> bool {
        self.messages.len() == 1
    }

    /// Number of user/assistant turns in the history.
    pub fn turn_count(&self) -> usize {
        self.messages.len() - 1
    }

    pub fn append_user_turn(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::user(content));
    }

    /// Record the model's answer and the evidence that produced it. The
    /// previous evidence set is replaced wholesale, never merged.
    pub fn append_assistant_turn(
        &mut self,
        content: impl Into<String>,
        retrieved: RetrievalResult,
    ) {
        self.messages.push(ChatMessage::assistant(content));
        self.last_retrieved = retrieved;
    }

    /// Drop all history and evidence, keeping only the system prompt. The
    /// session id is unchanged.
    pub fn reset(&mut self) {
        self.messages.clear();
        self.messages.push(ChatMessage::system(self.system_prompt.clone()));
        self.last_retrieved.clear();
    }
}

use chrono::Utc;
use log::{ error, warn };

use super::store::{ generate_id, load_conversation, save_conversation, KeyValueStore, StoreError };
use super::transport::RelayTransport;
use crate::models::chat::{ ChatMessage, ChatRole, ConversationHistory };

/// Longest message the widget will send.
pub const MAX_INPUT_CHARS: usize = 2000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Empty or over-long input; nothing was sent or recorded.
    Ignored,
    Replied(String),
    /// The request failed; the apology shown to the user is the payload.
    Failed(String),
}

/// Client-side conversation state: mirrors what the browser widget keeps.
pub struct ChatSession<S, T> {
    store: S,
    transport: T,
    history: ConversationHistory,
}

impl<S: KeyValueStore, T: RelayTransport> ChatSession<S, T> {
    pub fn open(store: S, transport: T, default_model: &str) -> Self {
        let history = load_conversation(&store, default_model);
        Self { store, transport, history }
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn model(&self) -> &str {
        &self.history.model
    }

    /// Takes effect on the next send; persisted with the next save.
    pub fn select_model(&mut self, model: &str) {
        self.history.model = model.to_string();
    }

    /// A reply that arrives is always returned, even if saving it fails.
    pub async fn submit(&mut self, input: &str) -> SubmitOutcome {
        let text = input.trim();
        if text.is_empty() || text.chars().count() > MAX_INPUT_CHARS {
            return SubmitOutcome::Ignored;
        }

        self.push(ChatRole::User, text);

        match self.transport.send(&self.history.messages, &self.history.model).await {
            Ok(reply) => {
                self.push(ChatRole::Assistant, &reply.message);
                if let Err(e) = save_conversation(&self.store, &self.history) {
                    warn!("Error saving conversation history: {}", e);
                }
                SubmitOutcome::Replied(reply.message)
            }
            Err(e) => {
                error!("Chat error: {}", e);
                let apology = format!(
                    "I apologize, but I encountered an error: {}. Please make sure the backend server is running and your API key is configured correctly.",
                    e
                );
                self.push(ChatRole::Assistant, &apology);
                SubmitOutcome::Failed(apology)
            }
        }
    }

    pub fn clear(&mut self) -> Result<(), StoreError> {
        self.history.messages.clear();
        save_conversation(&self.store, &self.history).map_err(|e| {
            warn!("Could not save cleared conversation: {}", e);
            e
        })
    }

    fn push(&mut self, role: ChatRole, content: &str) {
        self.history.messages.push(ChatMessage {
            role,
            content: content.to_string(),
            timestamp: Utc::now(),
            id: generate_id("msg"),
        });
    }
}

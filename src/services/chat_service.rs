use std::sync::Arc;

use async_trait::async_trait;
use log::warn;
use uuid::Uuid;

use crate::errors::{ServiceError, ServiceResult};
use crate::models::ChatMessage;
use crate::services::agent_gateway::{AgentBackend, AgentError, AgentInfo};

pub const HISTORY_LIMIT: i64 = 50;

const CITATION_MARKER: &str = "\n\n*Basado en la documentación del sistema*";
const MODEL_AGENT: &str = "kb-agent";
const MODEL_RETRIEVAL: &str = "kb-retrieval";

/// Per-user ordered message log.
#[async_trait]
pub trait ChatHistoryStore: Send + Sync {
    async fn append(&self, message: &ChatMessage) -> ServiceResult<()>;

    /// Up to `limit` most recent messages, in whatever order the backing
    /// store natively returns them.
    async fn recent(&self, owner_id: Uuid, limit: i64) -> ServiceResult<Vec<ChatMessage>>;

    /// Removes the user's whole history; returns the number of deleted rows.
    async fn clear(&self, owner_id: Uuid) -> ServiceResult<u64>;
}

/// Outcome of one conversation turn. The assistant message is always
/// persisted, even when both agent paths failed.
#[derive(Debug)]
pub struct ChatTurn {
    pub success: bool,
    pub message: ChatMessage,
    pub has_citations: bool,
    pub citations_count: usize,
    pub error: Option<String>,
}

pub struct ChatService {
    store: Arc<dyn ChatHistoryStore>,
    agent: Arc<dyn AgentBackend>,
}

impl ChatService {
    pub fn new(store: Arc<dyn ChatHistoryStore>, agent: Arc<dyn AgentBackend>) -> Self {
        Self { store, agent }
    }

    /// Session key derived from the user identity, stable across calls so
    /// the remote agent keeps conversational context per user.
    pub fn session_key(user_id: Uuid) -> String {
        format!("user-{}", user_id)
    }

    /// One conversation turn: persist the user message, ask the agent
    /// (falling back to direct retrieval), persist the assistant reply.
    /// Agent failures end up as a visible chat message, never an HTTP error.
    pub async fn send_message(&self, user_id: Uuid, text: &str) -> ServiceResult<ChatTurn> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ServiceError::Validation(
                "el mensaje no puede estar vacío".to_string(),
            ));
        }

        let user_message = ChatMessage::user(user_id, text.to_string());
        self.store.append(&user_message).await?;

        let session_id = Self::session_key(user_id);
        let outcome = match self.agent.invoke_agent(text, &session_id).await {
            Ok(reply) => Ok((reply, MODEL_AGENT)),
            Err(primary) => {
                warn!("agent invocation failed for {}: {}", session_id, primary);
                if self.agent.has_knowledge_base() {
                    match self.agent.retrieve_and_generate(text).await {
                        Ok(reply) => Ok((reply, MODEL_RETRIEVAL)),
                        Err(fallback) => {
                            warn!("knowledge base fallback failed: {}", fallback);
                            Err(fallback)
                        }
                    }
                } else {
                    Err(primary)
                }
            }
        };

        let turn = match outcome {
            Ok((reply, model)) => {
                let citations_count = reply.citations.len();
                let has_citations = citations_count > 0;
                let mut content = reply.text;
                if has_citations {
                    content.push_str(CITATION_MARKER);
                }
                let assistant =
                    ChatMessage::assistant(user_id, content, Some(model.to_string()));
                self.store.append(&assistant).await?;
                ChatTurn {
                    success: true,
                    message: assistant,
                    has_citations,
                    citations_count,
                    error: None,
                }
            }
            Err(err) => {
                let content = format!(
                    "⚠️ Lo siento, hubo un error: {}. Por favor, intenta de nuevo.",
                    err
                );
                let assistant = ChatMessage::assistant(user_id, content, None);
                self.store.append(&assistant).await?;
                ChatTurn {
                    success: false,
                    message: assistant,
                    has_citations: false,
                    citations_count: 0,
                    error: Some(err.to_string()),
                }
            }
        };

        Ok(turn)
    }

    /// History in ascending timestamp order, regardless of the backing
    /// store's native ordering.
    pub async fn history(&self, user_id: Uuid) -> ServiceResult<Vec<ChatMessage>> {
        let mut messages = self.store.recent(user_id, HISTORY_LIMIT).await?;
        messages.sort_by_key(|m| m.timestamp);
        Ok(messages)
    }

    pub async fn clear(&self, user_id: Uuid) -> ServiceResult<u64> {
        self.store.clear(user_id).await
    }

    pub async fn agent_info(&self) -> Result<AgentInfo, AgentError> {
        self.agent.agent_info().await
    }
}

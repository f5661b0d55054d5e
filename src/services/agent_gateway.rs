use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Config;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("agent API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("knowledge base not configured")]
    NoKnowledgeBase,
}

/// Reference to a retrieved source passage accompanying a generated answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    #[serde(default)]
    pub generated_response_part: String,
    #[serde(default)]
    pub retrieved_references: Vec<serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct AgentReply {
    pub text: String,
    pub citations: Vec<Citation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentInfo {
    pub agent_name: String,
    pub agent_status: String,
}

/// Client side of the hosted conversational/retrieval service.
#[async_trait]
pub trait AgentBackend: Send + Sync {
    /// Primary path: invoke the agent with conversational context keyed by
    /// `session_id`. The service streams the answer plus citations back.
    async fn invoke_agent(&self, input_text: &str, session_id: &str)
        -> Result<AgentReply, AgentError>;

    /// Fallback path: direct retrieve-and-generate against the knowledge
    /// base, bypassing the agent.
    async fn retrieve_and_generate(&self, input_text: &str) -> Result<AgentReply, AgentError>;

    fn has_knowledge_base(&self) -> bool;

    async fn agent_info(&self) -> Result<AgentInfo, AgentError>;
}

#[derive(Serialize)]
struct InvokeRequest<'a> {
    session_id: &'a str,
    input_text: &'a str,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum AgentStreamEvent {
    #[serde(rename = "chunk")]
    Chunk { text: String },
    #[serde(rename = "citation")]
    Citation {
        #[serde(flatten)]
        citation: Citation,
    },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct RetrieveAndGenerateResponse {
    output: RetrievalOutput,
    #[serde(default)]
    citations: Vec<Citation>,
}

#[derive(Deserialize)]
struct RetrievalOutput {
    text: String,
}

#[derive(Default)]
struct StreamAccumulator {
    text: String,
    citations: Vec<Citation>,
}

impl StreamAccumulator {
    fn apply_line(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        // Malformed lines are skipped; the stream carries best-effort events.
        if let Ok(event) = serde_json::from_str::<AgentStreamEvent>(line) {
            match event {
                AgentStreamEvent::Chunk { text } => self.text.push_str(&text),
                AgentStreamEvent::Citation { citation } => self.citations.push(citation),
                AgentStreamEvent::Other => {}
            }
        }
    }

    fn finish(self) -> AgentReply {
        AgentReply {
            text: self.text.trim().to_string(),
            citations: self.citations,
        }
    }
}

pub struct AgentGateway {
    client: Client,
    endpoint: String,
    agent_id: String,
    agent_alias_id: String,
    api_key: String,
    knowledge_base_id: Option<String>,
}

impl AgentGateway {
    pub fn new(cfg: &Config) -> Self {
        Self {
            client: Client::new(),
            endpoint: cfg.agent_endpoint.trim_end_matches('/').to_string(),
            agent_id: cfg.agent_id.clone(),
            agent_alias_id: cfg.agent_alias_id.clone(),
            api_key: cfg.agent_api_key.clone(),
            knowledge_base_id: cfg.knowledge_base_id.clone(),
        }
    }

    async fn error_for_status(resp: reqwest::Response) -> AgentError {
        let status = resp.status().as_u16();
        let message = resp.text().await.unwrap_or_default();
        AgentError::Api { status, message }
    }
}

#[async_trait]
impl AgentBackend for AgentGateway {
    async fn invoke_agent(
        &self,
        input_text: &str,
        session_id: &str,
    ) -> Result<AgentReply, AgentError> {
        let url = format!(
            "{}/agents/{}/aliases/{}/invoke",
            self.endpoint, self.agent_id, self.agent_alias_id
        );
        let resp = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&InvokeRequest {
                session_id,
                input_text,
            })
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(Self::error_for_status(resp).await);
        }

        // Newline-delimited JSON events: answer chunks interleaved with
        // citation records.
        let mut acc = StreamAccumulator::default();
        let mut buffer = String::new();
        let mut stream = resp.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(pos) = buffer.find('\n') {
                let line = buffer[..pos].to_string();
                buffer = buffer[pos + 1..].to_string();
                acc.apply_line(&line);
            }
        }
        acc.apply_line(&buffer);

        Ok(acc.finish())
    }

    async fn retrieve_and_generate(&self, input_text: &str) -> Result<AgentReply, AgentError> {
        let kb_id = self
            .knowledge_base_id
            .as_deref()
            .ok_or(AgentError::NoKnowledgeBase)?;

        let url = format!(
            "{}/knowledge-bases/{}/retrieve-and-generate",
            self.endpoint, kb_id
        );
        let resp = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "input": { "text": input_text },
                "retrieval_configuration": {
                    "number_of_results": 5,
                    "search_type": "SEMANTIC"
                }
            }))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(Self::error_for_status(resp).await);
        }

        let data: RetrieveAndGenerateResponse = resp.json().await?;
        Ok(AgentReply {
            text: data.output.text.trim().to_string(),
            citations: data.citations,
        })
    }

    fn has_knowledge_base(&self) -> bool {
        self.knowledge_base_id.is_some()
    }

    async fn agent_info(&self) -> Result<AgentInfo, AgentError> {
        let url = format!("{}/agents/{}", self.endpoint, self.agent_id);
        let resp = self
            .client
            .get(url)
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(Self::error_for_status(resp).await);
        }

        let info: AgentInfo = resp.json().await?;
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_chunks_and_citations() {
        let mut acc = StreamAccumulator::default();
        acc.apply_line(r#"{"type":"chunk","text":"Hola, "}"#);
        acc.apply_line(r#"{"type":"chunk","text":"mundo."}"#);
        acc.apply_line(
            r#"{"type":"citation","generated_response_part":"Hola","retrieved_references":[{"uri":"s3://docs/a.pdf"}]}"#,
        );

        let reply = acc.finish();
        assert_eq!(reply.text, "Hola, mundo.");
        assert_eq!(reply.citations.len(), 1);
        assert_eq!(reply.citations[0].generated_response_part, "Hola");
        assert_eq!(reply.citations[0].retrieved_references.len(), 1);
    }

    #[test]
    fn unknown_events_and_noise_are_ignored() {
        let mut acc = StreamAccumulator::default();
        acc.apply_line(r#"{"type":"trace","step":"routing"}"#);
        acc.apply_line("not json at all");
        acc.apply_line("");
        acc.apply_line(r#"{"type":"chunk","text":"ok"}"#);

        let reply = acc.finish();
        assert_eq!(reply.text, "ok");
        assert!(reply.citations.is_empty());
    }

    #[test]
    fn reply_text_is_trimmed() {
        let mut acc = StreamAccumulator::default();
        acc.apply_line(r#"{"type":"chunk","text":"  respuesta \n"}"#);
        assert_eq!(acc.finish().text, "respuesta");
    }

    #[test]
    fn citation_defaults_apply_when_fields_missing() {
        let mut acc = StreamAccumulator::default();
        acc.apply_line(r#"{"type":"citation"}"#);
        let reply = acc.finish();
        assert_eq!(reply.citations.len(), 1);
        assert!(reply.citations[0].generated_response_part.is_empty());
        assert!(reply.citations[0].retrieved_references.is_empty());
    }
}

//! Education handler: retrieval-augmented answers
//!
//! The retrieval service is a collaborator reached over HTTP. It receives
//! `{query, k}` and returns the top documents.

use super::llm::{render_prompt, system_prompt_for};
use super::{Handler, HandlerRequest};
use crate::error::OrchestrationError;
use crate::generation::TextGenerator;
use crate::memory::latest_user_message;
use crate::models::AgentType;
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Knowledge retrieval: query text -> serialized passages
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn query(&self, text: &str) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct RetrievalRequest<'a> {
    query: &'a str,
    k: usize,
}

#[derive(Debug, Deserialize)]
struct RetrievalResponse {
    #[serde(default)]
    documents: Vec<RetrievedDocument>,
}

#[derive(Debug, Deserialize)]
struct RetrievedDocument {
    #[serde(default)]
    source: Option<String>,
    content: String,
}

fn serialize_documents(documents: &[RetrievedDocument]) -> String {
    documents
        .iter()
        .map(|doc| {
            format!(
                "Source: {}\nContent: {}",
                doc.source.as_deref().unwrap_or("unknown"),
                doc.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[derive(Clone)]
pub struct HttpRetriever {
    client: Client,
    url: Option<String>,
    k: usize,
}

impl HttpRetriever {
    pub fn new(url: Option<String>, k: usize) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            url: url.map(|u| u.trim_end_matches('/').to_string()),
            k,
        })
    }
}

#[async_trait]
impl Retriever for HttpRetriever {
    async fn query(&self, text: &str) -> Result<String> {
        let url = self.url.as_ref().ok_or_else(|| {
            OrchestrationError::ConfigurationError("RETRIEVAL_API_URL is not configured".to_string())
        })?;

        let response = self
            .client
            .post(url)
            .json(&RetrievalRequest { query: text, k: self.k })
            .send()
            .await
            .map_err(|e| {
                OrchestrationError::ExternalServiceError(format!("Retrieval request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OrchestrationError::ExternalServiceError(format!(
                "Retrieval service returned {}: {}",
                status, body
            )));
        }

        let body: RetrievalResponse = response.json().await.map_err(|e| {
            OrchestrationError::ExternalServiceError(format!("Invalid retrieval response: {}", e))
        })?;

        debug!(documents = body.documents.len(), "Retrieved documents");
        Ok(serialize_documents(&body.documents))
    }
}

pub struct EducationHandler {
    retriever: Arc<dyn Retriever>,
    generator: Arc<dyn TextGenerator>,
}

impl EducationHandler {
    pub fn new(retriever: Arc<dyn Retriever>, generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            retriever,
            generator,
        }
    }
}

#[async_trait]
impl Handler for EducationHandler {
    async fn invoke(&self, request: HandlerRequest) -> Result<String> {
        let question = latest_user_message(&request.messages).unwrap_or_default();

        let passages = match self.retriever.query(question).await {
            Ok(p) if !p.is_empty() => p,
            Ok(_) => "No reference material found.".to_string(),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(thread_id = %request.thread_id, error = %e, "Retrieval failed, answering without references");
                "Reference material unavailable.".to_string()
            }
        };

        let extra = format!("## Reference Material\n\n{}", passages);
        let prompt = render_prompt(Some(&extra), &request);

        self.generator
            .generate(system_prompt_for(AgentType::Education), &prompt)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::ScriptedGenerator;
    use crate::models::ChatMessage;

    struct FixedRetriever(Result<String>);

    #[async_trait]
    impl Retriever for FixedRetriever {
        async fn query(&self, _text: &str) -> Result<String> {
            match &self.0 {
                Ok(text) => Ok(text.clone()),
                Err(e) if e.is_fatal() => Err(OrchestrationError::ConfigurationError(e.to_string())),
                Err(e) => Err(OrchestrationError::ExternalServiceError(e.to_string())),
            }
        }
    }

    fn request(question: &str) -> HandlerRequest {
        HandlerRequest {
            thread_id: "t".into(),
            messages: vec![ChatMessage::user(question)],
            verbose: false,
        }
    }

    #[tokio::test]
    async fn test_passages_reach_the_prompt() {
        let generator = Arc::new(ScriptedGenerator::repeating("An IRA is..."));
        let retriever = Arc::new(FixedRetriever(Ok("Source: irs.gov\nContent: IRA basics".into())));
        let handler = EducationHandler::new(retriever, generator.clone());

        let reply = handler.invoke(request("What is an IRA?")).await.unwrap();
        assert_eq!(reply, "An IRA is...");

        let prompts = generator.prompts();
        assert!(prompts[0].1.starts_with("## Reference Material\n\nSource: irs.gov"));
        assert!(prompts[0].1.contains("**User**: What is an IRA?"));
    }

    #[tokio::test]
    async fn test_retrieval_outage_still_answers() {
        let generator = Arc::new(ScriptedGenerator::repeating("answer"));
        let retriever = Arc::new(FixedRetriever(Err(OrchestrationError::ExternalServiceError(
            "timeout".into(),
        ))));
        let handler = EducationHandler::new(retriever, generator.clone());

        assert_eq!(handler.invoke(request("q")).await.unwrap(), "answer");
        assert!(generator.prompts()[0].1.contains("Reference material unavailable."));
    }

    #[tokio::test]
    async fn test_missing_retrieval_url_is_fatal() {
        let retriever = HttpRetriever::new(None, 5).unwrap();
        assert!(retriever.query("anything").await.unwrap_err().is_fatal());
    }

    #[test]
    fn test_document_serialization() {
        let body: RetrievalResponse = serde_json::from_str(
            r#"{"documents": [{"source": "a.pdf", "content": "one"}, {"content": "two"}]}"#,
        )
        .unwrap();
        assert_eq!(
            serialize_documents(&body.documents),
            "Source: a.pdf\nContent: one\n\nSource: unknown\nContent: two"
        );
    }
}

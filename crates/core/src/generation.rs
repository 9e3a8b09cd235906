use crate::embeddings::Embedder;
use crate::error::GenerationError;
use crate::models::SourceInfo;
use crate::retrieval::{format_context, format_sources, Retriever};
use crate::traits::VectorStore;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

pub const DEFAULT_LLM_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_LLM_MODEL: &str = "mixtral-8x7b-32768";
pub const DEFAULT_LLM_TEMPERATURE: f32 = 0.0;

pub const NO_DOCUMENTS_ANSWER: &str = "No relevant documents found in the knowledge base.";

const PROMPT_TEMPLATE: &str = "You are a helpful assistant that answers questions based solely on the provided context.

IMPORTANT INSTRUCTIONS:
1. Use ONLY the information from the context below to answer the question
2. If the context does not contain enough information to answer the question, say \"I don't have enough information in the provided documents to answer this question.\"
3. Always cite your sources using the format: [source: filename, type, location]
4. Be specific and accurate in your answers
5. Do not make up information or use external knowledge

CONTEXT:
{context}

QUESTION: {question}

ANSWER:";

/// Produces an answer from retrieved context. The only seam to a language model.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, context: &str, question: &str) -> Result<String, GenerationError>;
}

/// Grounded-answer prompt around formatted context.
pub fn build_prompt(context: &str, question: &str) -> String {
    PROMPT_TEMPLATE
        .replace("{context}", context)
        .replace("{question}", question)
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryAnswer {
    pub answer: String,
    pub sources: Vec<SourceInfo>,
    pub retrieved_docs: usize,
}

/// Chat-completions client for any OpenAI compatible endpoint (Groq by default).
pub struct OpenAiCompatibleGenerator {
    client: Client,
    endpoint: Url,
    api_key: String,
    model: String,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: Option<ChatReply>,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiCompatibleGenerator {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        model: impl Into<String>,
        temperature: f32,
    ) -> Result<Self, GenerationError> {
        let api_key = api_key
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .ok_or(GenerationError::MissingApiKey)?;

        let model = model.into();
        if model.trim().is_empty() {
            return Err(GenerationError::InvalidArgument(
                "model name is empty".to_string(),
            ));
        }
        if !temperature.is_finite() || temperature < 0.0 {
            return Err(GenerationError::InvalidArgument(format!(
                "temperature {temperature} must be a non-negative number"
            )));
        }

        Ok(Self {
            client: Client::new(),
            endpoint: completions_endpoint(base_url)?,
            api_key,
            model,
            temperature,
        })
    }

    /// Replaces the HTTP client, e.g. to set timeouts or proxies.
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

fn completions_endpoint(base_url: &str) -> Result<Url, GenerationError> {
    let mut base = base_url.trim().to_string();
    if !base.ends_with('/') {
        base.push('/');
    }

    let base = Url::parse(&base)?;
    if !matches!(base.scheme(), "http" | "https") {
        return Err(GenerationError::InvalidArgument(format!(
            "unsupported scheme for generation endpoint: {}",
            base.scheme()
        )));
    }

    Ok(base.join("chat/completions")?)
}

#[async_trait]
impl Generator for OpenAiCompatibleGenerator {
    async fn generate(&self, context: &str, question: &str) -> Result<String, GenerationError> {
        let prompt = build_prompt(context, question);
        let request = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            messages: vec![ChatMessage {
                role: "user",
                content: &prompt,
            }],
        };

        debug!(endpoint = %self.endpoint, model = %self.model, "requesting completion");
        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let details = response.text().await.unwrap_or_default();
            return Err(GenerationError::BackendResponse {
                status: status.as_u16(),
                details,
            });
        }

        let payload: ChatResponse = response.json().await?;
        payload
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(GenerationError::EmptyCompletion)
    }
}

/// Retrieves `k` chunks for `question` and asks the generator to answer from them.
///
/// Nothing retrieved means nothing to ground on: the fixed
/// [`NO_DOCUMENTS_ANSWER`] is returned and the generator is not called.
pub async fn answer_question<S, E, G>(
    retriever: &Retriever<'_, S, E>,
    generator: &G,
    question: &str,
    k: usize,
) -> Result<QueryAnswer, GenerationError>
where
    S: VectorStore + Send + Sync,
    E: Embedder + Send + Sync,
    G: Generator + ?Sized,
{
    if question.trim().is_empty() {
        return Err(GenerationError::InvalidArgument(
            "question is empty".to_string(),
        ));
    }

    let chunks = retriever.search(question, k).await?;
    if chunks.is_empty() {
        info!("no documents retrieved, skipping generation");
        return Ok(QueryAnswer {
            answer: NO_DOCUMENTS_ANSWER.to_string(),
            sources: Vec::new(),
            retrieved_docs: 0,
        });
    }

    let context = format_context(&chunks);
    let answer = generator.generate(&context, question).await?;
    info!(retrieved = chunks.len(), "generated answer");

    Ok(QueryAnswer {
        answer,
        sources: format_sources(&chunks),
        retrieved_docs: chunks.len(),
    })
}

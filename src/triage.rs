//! Intent classification for incoming questions.
//!
//! Greetings are detected locally without a remote call. Everything else goes
//! through one constrained classification call; replies the model was not
//! supposed to produce fail open toward the data path rather than blocking
//! the request.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::cache::InMemoryTtlCache;
use crate::config::Config;
use crate::error::{AskdbError, Result};
use crate::llm::{ChatRequest, LlmClient};
use crate::models::QueryRequest;

/// Salutations that short-circuit classification.
const GREETING_KEYWORDS: &[&str] = &[
    "hi",
    "hello",
    "hey",
    "good morning",
    "good afternoon",
    "good evening",
    "greetings",
    "yo",
    "hola",
    "namaste",
];

/// Pipeline branch selected for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// Requires querying data, metrics, analytics, statistics.
    DataQuestion,
    /// About how the system works, definitions, high-level concepts.
    GeneralQuestion,
    /// Salutations.
    Greeting,
    /// Unrelated to the analytics system.
    OutOfScope,
}

impl Intent {
    /// Returns the intent as its wire label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DataQuestion => "DATA_QUESTION",
            Self::GeneralQuestion => "GENERAL_QUESTION",
            Self::Greeting => "GREETING",
            Self::OutOfScope => "OUT_OF_SCOPE",
        }
    }

    /// Parses a normalized wire label.
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "DATA_QUESTION" => Some(Self::DataQuestion),
            "GENERAL_QUESTION" => Some(Self::GeneralQuestion),
            "GREETING" => Some(Self::Greeting),
            "OUT_OF_SCOPE" => Some(Self::OutOfScope),
            _ => None,
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Classifies user intent before the pipeline branches.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Maps a request to one of the fixed intents.
    async fn classify(&self, request: &QueryRequest) -> Result<Intent>;
}

/// Classifier backed by a remote text-classification call with a local
/// greeting shortcut and a TTL cache over remote results.
pub struct TriageService {
    config: Arc<Config>,
    client: Arc<dyn LlmClient>,
    cache: InMemoryTtlCache<Intent>,
}

impl TriageService {
    /// Creates a triage service over the given LLM client.
    pub fn new(config: Arc<Config>, client: Arc<dyn LlmClient>) -> Self {
        let ttl = Duration::from_secs(config.cache_ttl_classification_seconds);
        Self {
            config,
            client,
            cache: InMemoryTtlCache::with_default_ttl(ttl),
        }
    }

    /// Cache key: the lowercased, trimmed question text. Request id and
    /// metadata are deliberately excluded so identical questions share an
    /// entry.
    fn cache_key(request: &QueryRequest) -> String {
        request.user_query.trim().to_lowercase()
    }

    fn classification_prompt(user_query: &str) -> String {
        format!(
            "Classify the user query into one of four categories:\n\
             1. DATA_QUESTION: Questions that require querying data, metrics, analytics, statistics.\n\
             2. GENERAL_QUESTION: Questions about how the system works, definitions, explanations, or high-level concepts.\n\
             3. GREETING: Salutations such as hi, hello, good morning.\n\
             4. OUT_OF_SCOPE: Anything unrelated to the analytics system.\n\n\
             User query: {user_query}\n\n\
             Respond with exactly one label: DATA_QUESTION, GENERAL_QUESTION, GREETING, or OUT_OF_SCOPE."
        )
    }
}

#[async_trait]
impl Classifier for TriageService {
    async fn classify(&self, request: &QueryRequest) -> Result<Intent> {
        let lower_query = request.user_query.to_lowercase();
        if GREETING_KEYWORDS
            .iter()
            .any(|keyword| lower_query.contains(keyword))
        {
            return Ok(Intent::Greeting);
        }

        let key = Self::cache_key(request);
        if let Some(intent) = self.cache.get(&key) {
            debug!(%intent, "classification cache hit");
            return Ok(intent);
        }

        // Deterministic classification: temperature pinned to zero, a short
        // token budget, and a single-label instruction.
        let chat = ChatRequest::new(
            &self.config.deployment_classification,
            "You classify user queries. Reply with exactly one label.",
            Self::classification_prompt(&request.user_query),
        )
        .with_max_tokens(10)
        .with_temperature(0.0);

        let reply = self
            .client
            .complete(&chat)
            .await
            .map_err(|e| AskdbError::classification(e.to_string()))?;

        let label = reply.trim().to_uppercase();
        let intent = match Intent::parse(&label) {
            Some(intent) => intent,
            None => {
                warn!(%label, "unexpected classification label; defaulting to DATA_QUESTION");
                Intent::DataQuestion
            }
        };

        self.cache.set(key, intent, None);
        Ok(intent)
    }
}

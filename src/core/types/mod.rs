use std::collections::BTreeMap;
use std::pin::Pin;

use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::error::InvokeError;

pub const DEFAULT_RERANK_TOP_N: u32 = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RerankRequest {
    pub query: String,
    pub docs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_n: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

impl RerankRequest {
    pub fn new(query: impl Into<String>, docs: Vec<String>) -> Self {
        Self {
            query: query.into(),
            docs,
            score_threshold: None,
            top_n: None,
            user: None,
        }
    }

    pub fn with_score_threshold(mut self, score_threshold: f64) -> Self {
        self.score_threshold = Some(score_threshold);
        self
    }

    pub fn with_top_n(mut self, top_n: u32) -> Self {
        self.top_n = Some(top_n);
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RerankDocument {
    pub index: usize,
    pub text: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RerankResult {
    pub model: String,
    pub docs: Vec<RerankDocument>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingInputType {
    #[default]
    Document,
    Query,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EmbeddingUsage {
    pub tokens: u64,
    pub total_tokens: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingResult {
    pub model: String,
    pub embeddings: Vec<Vec<f32>>,
    pub usage: EmbeddingUsage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptRole {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl PromptMessage {
    pub fn new(role: PromptRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_call_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptMessageTool {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub parameters: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub prompt_messages: Vec<PromptMessage>,
    #[serde(default)]
    pub model_parameters: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<PromptMessageTool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

impl ChatRequest {
    pub fn new(prompt_messages: Vec<PromptMessage>) -> Self {
        Self {
            prompt_messages,
            model_parameters: Map::new(),
            tools: Vec::new(),
            stop: Vec::new(),
            stream: false,
            user: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChatUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResult {
    pub model: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    pub usage: ChatUsage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatChunk {
    pub model: String,
    pub delta: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<ChatUsage>,
}

pub type ChatStream = Pin<Box<dyn Stream<Item = Result<ChatChunk, InvokeError>> + Send>>;

pub enum ChatOutput {
    Complete(ChatResult),
    Stream(ChatStream),
}

impl std::fmt::Debug for ChatOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Complete(result) => f.debug_tuple("Complete").field(result).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct I18nText {
    #[serde(rename = "en_US")]
    pub en_us: String,
    #[serde(rename = "zh_Hans", default, skip_serializing_if = "Option::is_none")]
    pub zh_hans: Option<String>,
}

impl I18nText {
    pub fn en(text: impl Into<String>) -> Self {
        Self {
            en_us: text.into(),
            zh_hans: None,
        }
    }

    pub fn bilingual(en_us: impl Into<String>, zh_hans: impl Into<String>) -> Self {
        Self {
            en_us: en_us.into(),
            zh_hans: Some(zh_hans.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelType {
    Llm,
    TextEmbedding,
    Rerank,
    Speech2text,
    Tts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FetchFrom {
    PredefinedModel,
    CustomizableModel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelPropertyKey {
    Mode,
    ContextSize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelFeature {
    ToolCall,
    MultiToolCall,
    AgentThought,
    Vision,
    StreamToolCall,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterType {
    Float,
    Int,
    String,
    Boolean,
    Text,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterRule {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<I18nText>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<I18nText>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub parameter_type: Option<ParameterType>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

impl ParameterRule {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            use_template: None,
            label: None,
            help: None,
            parameter_type: None,
            required: false,
            default: None,
            min: None,
            max: None,
            options: Vec::new(),
        }
    }

    /// A rule that inherits label, help and bounds from a host template.
    pub fn from_template(name: impl Into<String>) -> Self {
        let name = name.into();
        let mut rule = Self::new(name.clone());
        rule.use_template = Some(name);
        rule
    }
}

/// Descriptive metadata for a user-configured model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSchema {
    pub model: String,
    pub label: I18nText,
    pub model_type: ModelType,
    pub fetch_from: FetchFrom,
    #[serde(default)]
    pub model_properties: BTreeMap<ModelPropertyKey, Value>,
    #[serde(default)]
    pub parameter_rules: Vec<ParameterRule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<ModelFeature>,
}

impl ModelSchema {
    pub fn customizable(model: impl Into<String>, model_type: ModelType) -> Self {
        let model = model.into();
        Self {
            label: I18nText::en(model.clone()),
            model,
            model_type,
            fetch_from: FetchFrom::CustomizableModel,
            model_properties: BTreeMap::new(),
            parameter_rules: Vec::new(),
            features: Vec::new(),
        }
    }

    pub fn has_feature(&self, feature: ModelFeature) -> bool {
        self.features.contains(&feature)
    }
}

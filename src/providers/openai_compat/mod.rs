//! OpenAI-compatible call paths shared by the adapters.
//!
//! [`OpenAiCompatClient`] implements every capability trait directly against
//! `credentials.endpoint_url`, which callers are expected to have normalized
//! to a `/v1` base. Adapters wrap it and only prepare credentials.

use std::io::{Cursor, Read};
use std::time::Duration;

use async_trait::async_trait;
use futures::{StreamExt, future};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::core::credentials::{Credentials, TIMEOUT_KEY};
use crate::core::error::{ConfigError, InvokeError};
use crate::core::traits::{
    AudioFile, LargeLanguageModel, Speech2TextModel, Text2SpeechModel, TextEmbeddingModel,
};
use crate::core::types::{
    ChatChunk, ChatOutput, ChatRequest, ChatResult, ChatUsage, EmbeddingInputType,
    EmbeddingResult, EmbeddingUsage, I18nText, ModelFeature, ModelPropertyKey, ModelSchema,
    ModelType, ParameterRule, ParameterType, PromptMessage, PromptRole, ToolCall,
};
use crate::transport::http::HttpTransport;

pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_LLM_CONTEXT_SIZE: u32 = 4096;
pub const DEFAULT_TTS_VOICE: &str = "alloy";
pub const LLM_MODE_CHAT: &str = "chat";
pub const LLM_MODE_COMPLETION: &str = "completion";

const EMBEDDING_PING: &str = "ping";
const TTS_PING: &str = "Hello Dify!";
const STREAM_DONE: &str = "[DONE]";

#[derive(Debug, Clone)]
pub struct OpenAiCompatClient {
    transport: HttpTransport,
    default_timeout: Duration,
}

impl OpenAiCompatClient {
    pub fn new() -> Result<Self, ConfigError> {
        Ok(Self::with_transport(HttpTransport::new()?))
    }

    pub fn with_transport(transport: HttpTransport) -> Self {
        Self {
            transport,
            default_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    pub fn with_default_timeout(mut self, default_timeout: Duration) -> Self {
        self.default_timeout = default_timeout;
        self
    }

    /// Credentials may pin a timeout; otherwise the client default applies.
    fn request_timeout(&self, credentials: &Credentials) -> Result<Duration, InvokeError> {
        if credentials.get(TIMEOUT_KEY).is_some() {
            credentials.timeout()
        } else {
            Ok(self.default_timeout)
        }
    }

    async fn chat_complete(
        &self,
        url: &str,
        model: &str,
        credentials: &Credentials,
        body: &Value,
        mode: LlmMode,
    ) -> Result<ChatResult, InvokeError> {
        let response: Value = self
            .transport
            .post_json(url, credentials.api_key(), body, self.request_timeout(credentials)?)
            .await?;

        parse_chat_response(&response, model, mode)
    }

    async fn chat_stream(
        &self,
        url: &str,
        model: &str,
        credentials: &Credentials,
        body: &Value,
        mode: LlmMode,
    ) -> Result<ChatOutput, InvokeError> {
        let events = self
            .transport
            .post_json_events(url, credentials.api_key(), body, self.request_timeout(credentials)?)
            .await?;

        let model = model.to_string();
        let chunks = events
            .take_while(|event| {
                future::ready(!matches!(event, Ok(data) if data.trim() == STREAM_DONE))
            })
            .filter_map(move |event| {
                let chunk = match event {
                    Ok(data) if data.trim().is_empty() => None,
                    Ok(data) => Some(parse_chat_chunk(&data, &model, mode)),
                    Err(error) => Some(Err(InvokeError::from(error))),
                };
                future::ready(chunk)
            });

        Ok(ChatOutput::Stream(Box::pin(chunks)))
    }
}

#[async_trait]
impl TextEmbeddingModel for OpenAiCompatClient {
    async fn invoke(
        &self,
        model: &str,
        credentials: &Credentials,
        texts: &[String],
        user: Option<&str>,
        input_type: EmbeddingInputType,
    ) -> Result<EmbeddingResult, InvokeError> {
        if texts.is_empty() {
            return Ok(EmbeddingResult {
                model: model.to_string(),
                embeddings: Vec::new(),
                usage: EmbeddingUsage::default(),
            });
        }

        let url = route(credentials, "embeddings")?;
        tracing::debug!(model, ?input_type, count = texts.len(), "embedding texts");

        let mut body = json!({
            "model": model,
            "input": texts,
            "encoding_format": "float",
        });
        insert_user(&mut body, user);

        let response: EmbeddingsResponse = self
            .transport
            .post_json(&url, credentials.api_key(), &body, self.request_timeout(credentials)?)
            .await?;

        let mut data = response.data;
        if data.len() != texts.len() {
            return Err(InvokeError::ServerUnavailable(format!(
                "embedding response has {} vectors for {} inputs",
                data.len(),
                texts.len()
            )));
        }
        data.sort_by_key(|item| item.index);

        let usage = response.usage.unwrap_or_default();
        Ok(EmbeddingResult {
            model: response.model.unwrap_or_else(|| model.to_string()),
            embeddings: data.into_iter().map(|item| item.embedding).collect(),
            usage: EmbeddingUsage {
                tokens: usage.prompt_tokens,
                total_tokens: usage.total_tokens,
            },
        })
    }

    async fn validate_credentials(
        &self,
        model: &str,
        credentials: &Credentials,
    ) -> Result<(), InvokeError> {
        TextEmbeddingModel::invoke(
            self,
            model,
            credentials,
            &[EMBEDDING_PING.to_string()],
            None,
            EmbeddingInputType::Document,
        )
        .await
        .map(|_| ())
        .map_err(|error| InvokeError::credentials_invalid(&error))
    }

    fn customizable_model_schema(
        &self,
        model: &str,
        credentials: &Credentials,
    ) -> Result<Option<ModelSchema>, InvokeError> {
        let mut schema = ModelSchema::customizable(model, ModelType::TextEmbedding);
        schema.model_properties.insert(
            ModelPropertyKey::ContextSize,
            json!(credentials.context_size()?),
        );
        Ok(Some(schema))
    }
}

#[async_trait]
impl Speech2TextModel for OpenAiCompatClient {
    async fn invoke(
        &self,
        model: &str,
        credentials: &Credentials,
        file: &mut dyn AudioFile,
        _user: Option<&str>,
    ) -> Result<String, InvokeError> {
        let url = route(credentials, "audio/transcriptions")?;

        let mut audio = Vec::new();
        file.read_to_end(&mut audio)
            .map_err(|error| InvokeError::BadRequest(format!("failed to read audio file: {error}")))?;
        let file_name = audio_file_name(&audio);

        let form = Form::new()
            .text("model", model.to_string())
            .part("file", Part::bytes(audio).file_name(file_name));

        let response: TranscriptionResponse = self
            .transport
            .post_multipart(&url, credentials.api_key(), form, self.request_timeout(credentials)?)
            .await?;

        Ok(response.text)
    }

    async fn validate_credentials(
        &self,
        model: &str,
        credentials: &Credentials,
    ) -> Result<(), InvokeError> {
        let mut sample = Cursor::new(silent_wav());
        Speech2TextModel::invoke(self, model, credentials, &mut sample, None)
            .await
            .map(|_| ())
            .map_err(|error| InvokeError::credentials_invalid(&error))
    }
}

#[async_trait]
impl Text2SpeechModel for OpenAiCompatClient {
    async fn invoke(
        &self,
        model: &str,
        tenant_id: &str,
        credentials: &Credentials,
        content_text: &str,
        voice: &str,
        user: Option<&str>,
    ) -> Result<Vec<u8>, InvokeError> {
        let url = route(credentials, "audio/speech")?;
        tracing::debug!(model, tenant_id, voice, "synthesizing speech");

        let mut body = json!({
            "model": model,
            "input": content_text,
            "voice": voice,
            "response_format": "mp3",
        });
        insert_user(&mut body, user);

        let audio = self
            .transport
            .post_json_for_bytes(&url, credentials.api_key(), &body, self.request_timeout(credentials)?)
            .await?;

        if audio.is_empty() {
            return Err(InvokeError::ServerUnavailable(
                "speech synthesis returned an empty body".to_string(),
            ));
        }
        Ok(audio)
    }

    async fn validate_credentials(
        &self,
        model: &str,
        credentials: &Credentials,
    ) -> Result<(), InvokeError> {
        let voice = credentials.get_str("voice").unwrap_or(DEFAULT_TTS_VOICE);
        Text2SpeechModel::invoke(self, model, "", credentials, TTS_PING, voice, None)
            .await
            .map(|_| ())
            .map_err(|error| InvokeError::credentials_invalid(&error))
    }
}

#[async_trait]
impl LargeLanguageModel for OpenAiCompatClient {
    async fn invoke(
        &self,
        model: &str,
        credentials: &Credentials,
        request: ChatRequest,
    ) -> Result<ChatOutput, InvokeError> {
        let mode = LlmMode::from_credentials(credentials)?;
        let url = route(credentials, mode.path())?;
        let body = build_chat_body(model, &request, mode);

        if request.stream {
            self.chat_stream(&url, model, credentials, &body, mode).await
        } else {
            self.chat_complete(&url, model, credentials, &body, mode)
                .await
                .map(ChatOutput::Complete)
        }
    }

    async fn validate_credentials(
        &self,
        model: &str,
        credentials: &Credentials,
    ) -> Result<(), InvokeError> {
        let mut request = ChatRequest::new(vec![PromptMessage::new(PromptRole::User, "ping")]);
        request
            .model_parameters
            .insert("max_tokens".to_string(), json!(5));

        LargeLanguageModel::invoke(self, model, credentials, request)
            .await
            .map(|_| ())
            .map_err(|error| InvokeError::credentials_invalid(&error))
    }

    fn customizable_model_schema(
        &self,
        model: &str,
        credentials: &Credentials,
    ) -> Result<Option<ModelSchema>, InvokeError> {
        let mode = LlmMode::from_credentials(credentials)?;
        let mut schema = ModelSchema::customizable(model, ModelType::Llm);
        schema
            .model_properties
            .insert(ModelPropertyKey::Mode, json!(mode.as_str()));
        schema.model_properties.insert(
            ModelPropertyKey::ContextSize,
            json!(credentials.context_size_or(DEFAULT_LLM_CONTEXT_SIZE)?),
        );

        if matches!(
            credentials.get_str("function_calling_type"),
            Some("function_call" | "tool_call")
        ) {
            schema.features.push(ModelFeature::ToolCall);
        }
        if credentials.get_str("vision_support") == Some("support") {
            schema.features.push(ModelFeature::Vision);
        }

        let max_tokens_ceiling = credentials
            .get("max_tokens_to_sample")
            .and_then(|value| match value {
                Value::Number(number) => number.as_f64(),
                Value::String(text) => text.trim().parse().ok(),
                _ => None,
            })
            .unwrap_or(f64::from(DEFAULT_LLM_CONTEXT_SIZE));

        let mut max_tokens = ParameterRule::from_template("max_tokens");
        max_tokens.label = Some(I18nText::bilingual("Max Tokens", "最大标记"));
        max_tokens.parameter_type = Some(ParameterType::Int);
        max_tokens.default = Some(json!(512));
        max_tokens.min = Some(1.0);
        max_tokens.max = Some(max_tokens_ceiling);

        schema.parameter_rules = vec![
            ParameterRule::from_template("temperature"),
            ParameterRule::from_template("top_p"),
            ParameterRule::from_template("frequency_penalty"),
            ParameterRule::from_template("presence_penalty"),
            max_tokens,
        ];

        Ok(Some(schema))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmMode {
    Chat,
    Completion,
}

impl LlmMode {
    pub fn from_credentials(credentials: &Credentials) -> Result<Self, InvokeError> {
        match credentials.mode() {
            None | Some(LLM_MODE_CHAT) => Ok(Self::Chat),
            Some(LLM_MODE_COMPLETION) => Ok(Self::Completion),
            Some(other) => Err(InvokeError::BadRequest(format!(
                "unsupported completion mode '{other}'; use '{LLM_MODE_CHAT}' or '{LLM_MODE_COMPLETION}'"
            ))),
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            Self::Chat => "chat/completions",
            Self::Completion => "completions",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Chat => LLM_MODE_CHAT,
            Self::Completion => LLM_MODE_COMPLETION,
        }
    }
}

/// Joins a route onto the normalized `/v1` base.
pub fn route(credentials: &Credentials, path: &str) -> Result<String, InvokeError> {
    let base = credentials.endpoint_url()?.trim_end_matches('/');
    Ok(format!("{base}/{path}"))
}

fn insert_user(body: &mut Value, user: Option<&str>) {
    if let (Some(object), Some(user)) = (body.as_object_mut(), user) {
        object.insert("user".to_string(), json!(user));
    }
}

fn build_chat_body(model: &str, request: &ChatRequest, mode: LlmMode) -> Value {
    let mut body = Map::new();
    body.insert("model".to_string(), json!(model));
    body.insert("stream".to_string(), json!(request.stream));

    for (key, value) in &request.model_parameters {
        body.insert(key.clone(), value.clone());
    }

    match mode {
        LlmMode::Chat => {
            let messages: Vec<Value> = request
                .prompt_messages
                .iter()
                .map(|message| {
                    let mut rendered = json!({
                        "role": message.role,
                        "content": message.content,
                    });
                    if let (Some(object), Some(tool_call_id)) =
                        (rendered.as_object_mut(), &message.tool_call_id)
                    {
                        object.insert("tool_call_id".to_string(), json!(tool_call_id));
                    }
                    rendered
                })
                .collect();
            body.insert("messages".to_string(), Value::Array(messages));

            if !request.tools.is_empty() {
                let tools: Vec<Value> = request
                    .tools
                    .iter()
                    .map(|tool| {
                        json!({
                            "type": "function",
                            "function": {
                                "name": tool.name,
                                "description": tool.description,
                                "parameters": tool.parameters,
                            }
                        })
                    })
                    .collect();
                body.insert("tools".to_string(), Value::Array(tools));
            }
        }
        LlmMode::Completion => {
            let prompt = request
                .prompt_messages
                .iter()
                .map(|message| message.content.as_str())
                .collect::<Vec<_>>()
                .join("\n");
            body.insert("prompt".to_string(), json!(prompt));
        }
    }

    if request.stream {
        body.insert(
            "stream_options".to_string(),
            json!({"include_usage": true}),
        );
    }
    if !request.stop.is_empty() {
        body.insert("stop".to_string(), json!(request.stop));
    }
    if let Some(user) = &request.user {
        body.insert("user".to_string(), json!(user));
    }

    Value::Object(body)
}

fn parse_chat_response(response: &Value, model: &str, mode: LlmMode) -> Result<ChatResult, InvokeError> {
    let choice = response
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .ok_or_else(|| malformed("chat response has no choices"))?;

    let (content, tool_calls) = match mode {
        LlmMode::Chat => {
            let message = choice
                .get("message")
                .ok_or_else(|| malformed("chat choice has no message"))?;
            let content = message
                .get("content")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            (content, parse_tool_calls(message))
        }
        LlmMode::Completion => {
            let text = choice
                .get("text")
                .and_then(Value::as_str)
                .ok_or_else(|| malformed("completion choice has no text"))?;
            (text.to_string(), Vec::new())
        }
    };

    Ok(ChatResult {
        model: response
            .get("model")
            .and_then(Value::as_str)
            .unwrap_or(model)
            .to_string(),
        content,
        tool_calls,
        usage: parse_usage(response).unwrap_or_default(),
        finish_reason: choice
            .get("finish_reason")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

fn parse_chat_chunk(data: &str, model: &str, mode: LlmMode) -> Result<ChatChunk, InvokeError> {
    let chunk: Value = serde_json::from_str(data)
        .map_err(|error| malformed(&format!("invalid stream chunk: {error}")))?;

    let choice = chunk
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first());

    let delta = choice
        .and_then(|choice| match mode {
            LlmMode::Chat => choice.get("delta").and_then(|delta| delta.get("content")),
            LlmMode::Completion => choice.get("text"),
        })
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Ok(ChatChunk {
        model: chunk
            .get("model")
            .and_then(Value::as_str)
            .unwrap_or(model)
            .to_string(),
        delta,
        finish_reason: choice
            .and_then(|choice| choice.get("finish_reason"))
            .and_then(Value::as_str)
            .map(str::to_string),
        usage: parse_usage(&chunk),
    })
}

fn parse_tool_calls(message: &Value) -> Vec<ToolCall> {
    message
        .get("tool_calls")
        .and_then(Value::as_array)
        .map(|calls| {
            calls
                .iter()
                .filter_map(|call| {
                    let function = call.get("function")?;
                    Some(ToolCall {
                        id: call.get("id").and_then(Value::as_str)?.to_string(),
                        name: function.get("name").and_then(Value::as_str)?.to_string(),
                        arguments: function
                            .get("arguments")
                            .and_then(Value::as_str)
                            .unwrap_or("{}")
                            .to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

fn parse_usage(value: &Value) -> Option<ChatUsage> {
    let usage = value.get("usage").filter(|usage| usage.is_object())?;
    let field = |name: &str| usage.get(name).and_then(Value::as_u64).unwrap_or(0);
    Some(ChatUsage {
        prompt_tokens: field("prompt_tokens"),
        completion_tokens: field("completion_tokens"),
        total_tokens: field("total_tokens"),
    })
}

fn malformed(message: &str) -> InvokeError {
    InvokeError::ServerUnavailable(message.to_string())
}

fn audio_file_name(audio: &[u8]) -> &'static str {
    if audio.starts_with(b"RIFF") {
        "audio.wav"
    } else if audio.starts_with(b"OggS") {
        "audio.ogg"
    } else if audio.starts_with(b"fLaC") {
        "audio.flac"
    } else if audio.get(4..8) == Some(b"ftyp".as_slice()) {
        "audio.m4a"
    } else {
        "audio.mp3"
    }
}

/// 100 ms of 16 kHz mono 16-bit PCM silence, used as a transcription ping.
pub fn silent_wav() -> Vec<u8> {
    const SAMPLE_RATE: u32 = 16_000;
    const DATA_LEN: u32 = SAMPLE_RATE / 10 * 2;

    let mut wav = Vec::with_capacity(44 + DATA_LEN as usize);
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + DATA_LEN).to_le_bytes());
    wav.extend_from_slice(b"WAVE");
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16_u32.to_le_bytes());
    wav.extend_from_slice(&1_u16.to_le_bytes());
    wav.extend_from_slice(&1_u16.to_le_bytes());
    wav.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
    wav.extend_from_slice(&(SAMPLE_RATE * 2).to_le_bytes());
    wav.extend_from_slice(&2_u16.to_le_bytes());
    wav.extend_from_slice(&16_u16.to_le_bytes());
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&DATA_LEN.to_le_bytes());
    wav.resize(44 + DATA_LEN as usize, 0);
    wav
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Option<EmbeddingsUsage>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct EmbeddingsUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    total_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

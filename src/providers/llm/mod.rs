use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use crate::core::credentials::Credentials;
use crate::core::error::{ConfigError, InvokeError};
use crate::core::traits::LargeLanguageModel;
use crate::core::types::{
    ChatOutput, ChatRequest, I18nText, ModelFeature, ModelSchema, ParameterRule, ParameterType,
};
use crate::endpoint::openai_compat_credentials;
use crate::providers::openai_compat::{DEFAULT_READ_TIMEOUT, LlmMode, OpenAiCompatClient, route};
use crate::transport::http::HttpTransport;

pub const ENABLE_THINKING_PARAM: &str = "enable_thinking";
pub const CHAT_TEMPLATE_KWARGS_PARAM: &str = "chat_template_kwargs";
pub const VALIDATION_MAX_TOKENS: u32 = 70;
pub const RESPONSE_FORMAT_OPTIONS: [&str; 3] = ["text", "json_object", "json_schema"];

const SUPPORTED: &str = "supported";
const VALIDATION_PROMPT: &str = "ping";

/// Chat/completion adapter. Invocation goes through the shared chat path;
/// credential validation sends its own ping so that servers answering with
/// non-JSON or stream-only bodies still pass on a 200.
pub struct InsigmaLlmAdapter {
    inner: Arc<dyn LargeLanguageModel>,
    transport: HttpTransport,
}

impl InsigmaLlmAdapter {
    pub fn new() -> Result<Self, ConfigError> {
        let transport = HttpTransport::new()?;
        Ok(Self::with_parts(
            Arc::new(OpenAiCompatClient::with_transport(transport.clone())),
            transport,
        ))
    }

    pub fn with_parts(inner: Arc<dyn LargeLanguageModel>, transport: HttpTransport) -> Self {
        Self { inner, transport }
    }

    async fn ping(&self, model: &str, credentials: &Credentials) -> Result<(), InvokeError> {
        let compatible = openai_compat_credentials(credentials)?;
        let mode = LlmMode::from_credentials(&compatible)?;
        let url = route(&compatible, mode.path())?;

        let mut body = json!({ "model": model, "max_tokens": VALIDATION_MAX_TOKENS });
        match mode {
            LlmMode::Chat => {
                body["messages"] = json!([{ "role": "user", "content": VALIDATION_PROMPT }]);
            }
            LlmMode::Completion => {
                body["prompt"] = json!(VALIDATION_PROMPT);
            }
        }

        let status = self
            .transport
            .post_json_for_status(&url, compatible.api_key(), &body, DEFAULT_READ_TIMEOUT)
            .await?;

        if status != 200 {
            return Err(InvokeError::BadRequest(format!(
                "validation ping returned status {status}"
            )));
        }
        Ok(())
    }
}

/// Moves `enable_thinking` into `chat_template_kwargs`. A null flag is
/// dropped; other values are coerced to a boolean by truthiness.
pub fn apply_thinking_switch(parameters: &mut Map<String, Value>) {
    let Some(flag) = parameters.remove(ENABLE_THINKING_PARAM) else {
        return;
    };
    if flag.is_null() {
        return;
    }
    parameters.insert(
        CHAT_TEMPLATE_KWARGS_PARAM.to_string(),
        json!({ ENABLE_THINKING_PARAM: is_truthy(&flag) }),
    );
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
    }
}

fn response_format_rule() -> ParameterRule {
    let mut rule = ParameterRule::new("response_format");
    rule.label = Some(I18nText::bilingual("Response Format", "回复格式"));
    rule.help = Some(I18nText::bilingual(
        "Specifying the format that the model must output.",
        "指定模型必须输出的格式。",
    ));
    rule.parameter_type = Some(ParameterType::String);
    rule.options = RESPONSE_FORMAT_OPTIONS.iter().map(|o| o.to_string()).collect();
    rule
}

fn enable_thinking_rule() -> ParameterRule {
    let mut rule = ParameterRule::new(ENABLE_THINKING_PARAM);
    rule.label = Some(I18nText::bilingual("Thinking mode", "思考模式"));
    rule.help = Some(I18nText::bilingual(
        "Whether to enable thinking mode, applicable to various thinking mode models deployed on reasoning frameworks such as vLLM and SGLang, for example Qwen3.",
        "是否开启思考模式，适用于vLLM和SGLang等推理框架部署的多种思考模式模型，例如Qwen3。",
    ));
    rule.parameter_type = Some(ParameterType::Boolean);
    rule
}

#[async_trait]
impl LargeLanguageModel for InsigmaLlmAdapter {
    async fn invoke(
        &self,
        model: &str,
        credentials: &Credentials,
        mut request: ChatRequest,
    ) -> Result<ChatOutput, InvokeError> {
        let model = model.trim();
        let compatible = openai_compat_credentials(credentials)?;
        apply_thinking_switch(&mut request.model_parameters);

        self.inner.invoke(model, &compatible, request).await
    }

    async fn validate_credentials(
        &self,
        model: &str,
        credentials: &Credentials,
    ) -> Result<(), InvokeError> {
        self.ping(model, credentials).await.map_err(|error| {
            tracing::debug!(model, err = %error, "llm credential ping failed");
            InvokeError::credentials_invalid(&error)
        })
    }

    fn customizable_model_schema(
        &self,
        model: &str,
        credentials: &Credentials,
    ) -> Result<Option<ModelSchema>, InvokeError> {
        let Some(mut schema) = self.inner.customizable_model_schema(model, credentials)? else {
            return Ok(None);
        };

        if credentials.get_str("agent_thought_support") == Some(SUPPORTED)
            && !schema.has_feature(ModelFeature::AgentThought)
        {
            schema.features.push(ModelFeature::AgentThought);
        }

        if credentials.get_str("structured_output_support") == Some(SUPPORTED) {
            schema.parameter_rules.push(response_format_rule());
            schema
                .parameter_rules
                .push(ParameterRule::from_template("json_schema"));
        }

        schema.parameter_rules.push(enable_thinking_rule());
        Ok(Some(schema))
    }
}

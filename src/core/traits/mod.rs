use std::io::{Read, Seek};

use async_trait::async_trait;

use crate::core::credentials::Credentials;
use crate::core::error::InvokeError;
use crate::core::types::{
    ChatOutput, ChatRequest, EmbeddingInputType, EmbeddingResult, ModelSchema, RerankRequest,
    RerankResult,
};

/// Host contract for rerank models.
#[async_trait]
pub trait RerankModel: Send + Sync {
    async fn invoke(
        &self,
        model: &str,
        credentials: &Credentials,
        request: &RerankRequest,
    ) -> Result<RerankResult, InvokeError>;

    async fn validate_credentials(
        &self,
        model: &str,
        credentials: &Credentials,
    ) -> Result<(), InvokeError>;

    fn customizable_model_schema(
        &self,
        _model: &str,
        _credentials: &Credentials,
    ) -> Result<Option<ModelSchema>, InvokeError> {
        Ok(None)
    }
}

/// Host contract for text embedding models.
///
/// Adapters implement it and also hold another implementor as their inner
/// call path, which is how the OpenAI-compatible request logic is shared.
#[async_trait]
pub trait TextEmbeddingModel: Send + Sync {
    async fn invoke(
        &self,
        model: &str,
        credentials: &Credentials,
        texts: &[String],
        user: Option<&str>,
        input_type: EmbeddingInputType,
    ) -> Result<EmbeddingResult, InvokeError>;

    async fn validate_credentials(
        &self,
        model: &str,
        credentials: &Credentials,
    ) -> Result<(), InvokeError>;

    fn customizable_model_schema(
        &self,
        _model: &str,
        _credentials: &Credentials,
    ) -> Result<Option<ModelSchema>, InvokeError> {
        Ok(None)
    }
}

/// Readable, rewindable audio payload handed over by the host.
pub trait AudioFile: Read + Seek + Send {}

impl<T> AudioFile for T where T: Read + Seek + Send {}

#[async_trait]
pub trait Speech2TextModel: Send + Sync {
    async fn invoke(
        &self,
        model: &str,
        credentials: &Credentials,
        file: &mut dyn AudioFile,
        user: Option<&str>,
    ) -> Result<String, InvokeError>;

    async fn validate_credentials(
        &self,
        model: &str,
        credentials: &Credentials,
    ) -> Result<(), InvokeError>;

    fn customizable_model_schema(
        &self,
        _model: &str,
        _credentials: &Credentials,
    ) -> Result<Option<ModelSchema>, InvokeError> {
        Ok(None)
    }
}

#[async_trait]
pub trait Text2SpeechModel: Send + Sync {
    async fn invoke(
        &self,
        model: &str,
        tenant_id: &str,
        credentials: &Credentials,
        content_text: &str,
        voice: &str,
        user: Option<&str>,
    ) -> Result<Vec<u8>, InvokeError>;

    async fn validate_credentials(
        &self,
        model: &str,
        credentials: &Credentials,
    ) -> Result<(), InvokeError>;

    fn customizable_model_schema(
        &self,
        _model: &str,
        _credentials: &Credentials,
    ) -> Result<Option<ModelSchema>, InvokeError> {
        Ok(None)
    }
}

#[async_trait]
pub trait LargeLanguageModel: Send + Sync {
    async fn invoke(
        &self,
        model: &str,
        credentials: &Credentials,
        request: ChatRequest,
    ) -> Result<ChatOutput, InvokeError>;

    async fn validate_credentials(
        &self,
        model: &str,
        credentials: &Credentials,
    ) -> Result<(), InvokeError>;

    fn customizable_model_schema(
        &self,
        _model: &str,
        _credentials: &Credentials,
    ) -> Result<Option<ModelSchema>, InvokeError> {
        Ok(None)
    }
}

/// Lifecycle event describing one adapter call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationEvent<'a> {
    pub operation: &'a str,
    pub model: &'a str,
    pub user: Option<&'a str>,
    pub endpoint: Option<&'a str>,
    pub detail: Option<String>,
}

impl InvocationEvent<'_> {
    pub fn user_or_unknown(&self) -> &str {
        self.user.unwrap_or("unknown")
    }
}

/// Observer notified around adapter calls. Implementations must not fail
/// the call they observe.
pub trait InvocationObserver: Send + Sync {
    fn on_start(&self, event: &InvocationEvent<'_>);

    fn on_success(&self, event: &InvocationEvent<'_>);

    fn on_failure(&self, event: &InvocationEvent<'_>, error: &InvokeError);
}

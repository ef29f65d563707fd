use std::sync::Arc;

use async_trait::async_trait;

use crate::core::credentials::Credentials;
use crate::core::error::{ConfigError, InvokeError};
use crate::core::traits::Text2SpeechModel;
use crate::core::types::ModelSchema;
use crate::endpoint::openai_compat_credentials;
use crate::providers::openai_compat::OpenAiCompatClient;

pub struct InsigmaText2SpeechAdapter {
    inner: Arc<dyn Text2SpeechModel>,
}

impl InsigmaText2SpeechAdapter {
    pub fn new() -> Result<Self, ConfigError> {
        Ok(Self::with_inner(Arc::new(OpenAiCompatClient::new()?)))
    }

    pub fn with_inner(inner: Arc<dyn Text2SpeechModel>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl Text2SpeechModel for InsigmaText2SpeechAdapter {
    async fn invoke(
        &self,
        model: &str,
        tenant_id: &str,
        credentials: &Credentials,
        content_text: &str,
        voice: &str,
        user: Option<&str>,
    ) -> Result<Vec<u8>, InvokeError> {
        let compatible = openai_compat_credentials(credentials)?;
        self.inner
            .invoke(
                model.trim(),
                tenant_id,
                &compatible,
                content_text,
                voice,
                user,
            )
            .await
    }

    async fn validate_credentials(
        &self,
        model: &str,
        credentials: &Credentials,
    ) -> Result<(), InvokeError> {
        let compatible = openai_compat_credentials(credentials)?;
        self.inner.validate_credentials(model, &compatible).await
    }

    fn customizable_model_schema(
        &self,
        model: &str,
        credentials: &Credentials,
    ) -> Result<Option<ModelSchema>, InvokeError> {
        self.inner.customizable_model_schema(model, credentials)
    }
}

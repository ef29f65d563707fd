use std::io::SeekFrom;
use std::sync::Arc;

use async_trait::async_trait;

use crate::core::credentials::Credentials;
use crate::core::error::{ConfigError, InvokeError};
use crate::core::traits::{AudioFile, InvocationEvent, InvocationObserver, Speech2TextModel};
use crate::core::types::{ModelSchema, ModelType};
use crate::endpoint::openai_compat_credentials;
use crate::observer::TracingObserver;
use crate::providers::openai_compat::OpenAiCompatClient;

const INVOKE_OPERATION: &str = "speech2text.invoke";
const VALIDATE_OPERATION: &str = "speech2text.validate_credentials";

/// Transcription adapter. Every call is reported to the observer, and the
/// inner error is handed back untouched after the failure report.
pub struct InsigmaSpeech2TextAdapter {
    inner: Arc<dyn Speech2TextModel>,
    observer: Arc<dyn InvocationObserver>,
}

impl InsigmaSpeech2TextAdapter {
    pub fn new() -> Result<Self, ConfigError> {
        Ok(Self::with_parts(
            Arc::new(OpenAiCompatClient::new()?),
            Arc::new(TracingObserver),
        ))
    }

    pub fn with_parts(
        inner: Arc<dyn Speech2TextModel>,
        observer: Arc<dyn InvocationObserver>,
    ) -> Self {
        Self { inner, observer }
    }

    fn report<T>(
        &self,
        event: &InvocationEvent<'_>,
        result: &Result<T, InvokeError>,
        success_detail: impl FnOnce(&T) -> Option<String>,
    ) {
        match result {
            Ok(value) => {
                let event = InvocationEvent {
                    detail: success_detail(value),
                    ..event.clone()
                };
                self.observer.on_success(&event);
            }
            Err(error) => self.observer.on_failure(event, error),
        }
    }
}

/// Rewinds the audio stream and returns its length in bytes.
fn rewind(file: &mut dyn AudioFile) -> Result<u64, InvokeError> {
    let seek_error =
        |error: std::io::Error| InvokeError::BadRequest(format!("failed to rewind audio file: {error}"));
    let size = file.seek(SeekFrom::End(0)).map_err(seek_error)?;
    file.seek(SeekFrom::Start(0)).map_err(seek_error)?;
    Ok(size)
}

#[async_trait]
impl Speech2TextModel for InsigmaSpeech2TextAdapter {
    async fn invoke(
        &self,
        model: &str,
        credentials: &Credentials,
        file: &mut dyn AudioFile,
        user: Option<&str>,
    ) -> Result<String, InvokeError> {
        let model = model.trim();
        let compatible = openai_compat_credentials(credentials);
        let mut event = InvocationEvent {
            operation: INVOKE_OPERATION,
            model,
            user,
            endpoint: compatible.as_ref().ok().and_then(|c| c.endpoint_url().ok()),
            detail: None,
        };

        let size = rewind(file);
        if let Ok(size) = &size {
            event.detail = Some(format!("audio stream of {size} bytes"));
        }
        self.observer.on_start(&event);

        let result = match (size.as_ref(), compatible.as_ref()) {
            (Ok(_), Ok(compatible)) => self.inner.invoke(model, compatible, file, user).await,
            (Err(error), _) | (_, Err(error)) => Err(error.clone()),
        };

        self.report(&event, &result, |text| {
            Some(format!("text length {}", text.chars().count()))
        });
        result
    }

    async fn validate_credentials(
        &self,
        model: &str,
        credentials: &Credentials,
    ) -> Result<(), InvokeError> {
        let compatible = openai_compat_credentials(credentials);
        let event = InvocationEvent {
            operation: VALIDATE_OPERATION,
            model,
            user: None,
            endpoint: compatible.as_ref().ok().and_then(|c| c.endpoint_url().ok()),
            detail: None,
        };
        self.observer.on_start(&event);

        let result = match &compatible {
            Ok(compatible) => self.inner.validate_credentials(model, compatible).await,
            Err(error) => Err(error.clone()),
        };

        self.report(&event, &result, |_| None);
        result
    }

    fn customizable_model_schema(
        &self,
        model: &str,
        _credentials: &Credentials,
    ) -> Result<Option<ModelSchema>, InvokeError> {
        tracing::debug!(model, "building speech2text schema");
        Ok(Some(ModelSchema::customizable(model, ModelType::Speech2text)))
    }
}

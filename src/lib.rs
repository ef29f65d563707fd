pub mod core;
pub mod endpoint;
pub mod observer;
pub mod providers;
pub mod transport;

#[cfg(test)]
mod testing;

pub use core::credentials::Credentials;
pub use core::error::{ConfigError, InvokeError, InvokeErrorKind, TransportError};
pub use core::traits::*;
pub use core::types::*;
pub use providers::{
    InsigmaLlmAdapter, InsigmaRerankAdapter, InsigmaSpeech2TextAdapter,
    InsigmaText2SpeechAdapter, InsigmaTextEmbeddingAdapter, OpenAiCompatClient,
};

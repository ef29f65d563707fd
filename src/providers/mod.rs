pub mod llm;
pub mod openai_compat;
pub mod rerank;
pub mod speech2text;
pub mod text_embedding;
pub mod tts;

pub use llm::InsigmaLlmAdapter;
pub use openai_compat::OpenAiCompatClient;
pub use rerank::InsigmaRerankAdapter;
pub use speech2text::InsigmaSpeech2TextAdapter;
pub use text_embedding::InsigmaTextEmbeddingAdapter;
pub use tts::InsigmaText2SpeechAdapter;

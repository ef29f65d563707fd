use std::fs::File;
use std::io::{self, Write};

use futures::StreamExt;
use insigma_adapters::providers::{
    InsigmaLlmAdapter, InsigmaRerankAdapter, InsigmaSpeech2TextAdapter, InsigmaText2SpeechAdapter,
    InsigmaTextEmbeddingAdapter,
};
use insigma_adapters::{
    ChatOutput, ChatRequest, Credentials, EmbeddingInputType, LargeLanguageModel, PromptMessage,
    PromptRole, RerankModel, RerankRequest, Speech2TextModel, Text2SpeechModel,
    TextEmbeddingModel,
};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "insigma_adapters=debug,insigma_cli=info";

#[derive(Clone, Copy)]
enum Capability {
    Llm,
    Rerank,
    Embedding,
    Stt,
    Tts,
}

impl Capability {
    fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "llm" => Some(Self::Llm),
            "rerank" => Some(Self::Rerank),
            "embedding" | "embed" => Some(Self::Embedding),
            "stt" | "speech2text" => Some(Self::Stt),
            "tts" => Some(Self::Tts),
            _ => None,
        }
    }

    fn model_env(self) -> &'static str {
        match self {
            Self::Llm => "INSIGMA_LLM_MODEL",
            Self::Rerank => "INSIGMA_RERANK_MODEL",
            Self::Embedding => "INSIGMA_EMBEDDING_MODEL",
            Self::Stt => "INSIGMA_STT_MODEL",
            Self::Tts => "INSIGMA_TTS_MODEL",
        }
    }
}

enum Command {
    Validate(Capability),
    Rerank { query: String, docs: Vec<String> },
    Embed { texts: Vec<String> },
    Chat { prompt: String, stream: bool },
    Transcribe { path: String },
    Speak { text: String, voice: String, out: String },
}

struct CliConfig {
    credentials: Credentials,
    model_override: Option<String>,
    command: Command,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(io::stderr)
        .init();

    let config = parse_config(std::env::args().skip(1).collect())?;
    let credentials = &config.credentials;

    match config.command {
        Command::Validate(capability) => {
            let model = resolve_model(capability, config.model_override.as_deref())?;
            let result = match capability {
                Capability::Llm => {
                    InsigmaLlmAdapter::new()?
                        .validate_credentials(&model, credentials)
                        .await
                }
                Capability::Rerank => {
                    InsigmaRerankAdapter::new()?
                        .validate_credentials(&model, credentials)
                        .await
                }
                Capability::Embedding => {
                    InsigmaTextEmbeddingAdapter::new()?
                        .validate_credentials(&model, credentials)
                        .await
                }
                Capability::Stt => {
                    InsigmaSpeech2TextAdapter::new()?
                        .validate_credentials(&model, credentials)
                        .await
                }
                Capability::Tts => {
                    InsigmaText2SpeechAdapter::new()?
                        .validate_credentials(&model, credentials)
                        .await
                }
            };
            result?;
            println!("credentials ok: model={model}");
        }
        Command::Rerank { query, docs } => {
            let model = resolve_model(Capability::Rerank, config.model_override.as_deref())?;
            let result = InsigmaRerankAdapter::new()?
                .invoke(&model, credentials, &RerankRequest::new(query, docs))
                .await?;
            for doc in result.docs {
                println!("{:>3}  {:.4}  {}", doc.index, doc.score, doc.text);
            }
        }
        Command::Embed { texts } => {
            let model = resolve_model(Capability::Embedding, config.model_override.as_deref())?;
            let result = InsigmaTextEmbeddingAdapter::new()?
                .invoke(&model, credentials, &texts, None, EmbeddingInputType::Document)
                .await?;
            for (text, embedding) in texts.iter().zip(&result.embeddings) {
                println!("dims={} text={text}", embedding.len());
            }
            println!("total_tokens={}", result.usage.total_tokens);
        }
        Command::Chat { prompt, stream } => {
            let model = resolve_model(Capability::Llm, config.model_override.as_deref())?;
            let mut request = ChatRequest::new(vec![PromptMessage::new(PromptRole::User, prompt)]);
            request.stream = stream;

            match InsigmaLlmAdapter::new()?
                .invoke(&model, credentials, request)
                .await?
            {
                ChatOutput::Complete(result) => println!("{}", result.content),
                ChatOutput::Stream(mut chunks) => {
                    while let Some(chunk) = chunks.next().await {
                        print!("{}", chunk?.delta);
                        io::stdout().flush()?;
                    }
                    println!();
                }
            }
        }
        Command::Transcribe { path } => {
            let model = resolve_model(Capability::Stt, config.model_override.as_deref())?;
            let mut file = File::open(&path)?;
            let text = InsigmaSpeech2TextAdapter::new()?
                .invoke(&model, credentials, &mut file, None)
                .await?;
            println!("{text}");
        }
        Command::Speak { text, voice, out } => {
            let model = resolve_model(Capability::Tts, config.model_override.as_deref())?;
            let audio = InsigmaText2SpeechAdapter::new()?
                .invoke(&model, "cli", credentials, &text, &voice, None)
                .await?;
            std::fs::write(&out, &audio)?;
            println!("wrote {} bytes to {out}", audio.len());
        }
    }

    Ok(())
}

fn resolve_model(
    capability: Capability,
    model_override: Option<&str>,
) -> Result<String, Box<dyn std::error::Error>> {
    if let Some(model) = model_override {
        return Ok(model.to_string());
    }
    std::env::var(capability.model_env())
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| format!("set {} or pass --model", capability.model_env()).into())
}

fn parse_config(args: Vec<String>) -> Result<CliConfig, Box<dyn std::error::Error>> {
    let mut endpoint_url = std::env::var("INSIGMA_ENDPOINT_URL")
        .ok()
        .filter(|value| !value.trim().is_empty());
    let api_key = std::env::var("INSIGMA_API_KEY")
        .ok()
        .filter(|value| !value.trim().is_empty());
    let mut model_override = None;
    let mut stream = false;
    let mut voice = "alloy".to_string();
    let mut out = "speech.mp3".to_string();
    let mut positional = Vec::new();

    let mut i = 0usize;
    while i < args.len() {
        match args[i].as_str() {
            "--endpoint" => {
                let value = args.get(i + 1).ok_or("missing value for --endpoint")?;
                endpoint_url = Some(value.trim().to_string());
                i += 2;
            }
            "--model" => {
                let value = args
                    .get(i + 1)
                    .ok_or("missing value for --model")?
                    .trim()
                    .to_string();
                if value.is_empty() {
                    return Err("--model must be non-empty".into());
                }
                model_override = Some(value);
                i += 2;
            }
            "--voice" => {
                voice = args.get(i + 1).ok_or("missing value for --voice")?.clone();
                i += 2;
            }
            "--out" => {
                out = args.get(i + 1).ok_or("missing value for --out")?.clone();
                i += 2;
            }
            "--stream" => {
                stream = true;
                i += 1;
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            other => {
                positional.push(other.to_string());
                i += 1;
            }
        }
    }

    let endpoint_url = endpoint_url.ok_or("set INSIGMA_ENDPOINT_URL or pass --endpoint")?;
    let mut credentials = Credentials::new().with("endpoint_url", endpoint_url);
    if let Some(api_key) = api_key {
        credentials = credentials.with("api_key", api_key);
    }

    let mut positional = positional.into_iter();
    let command = match positional.next().as_deref() {
        Some("validate") => {
            let capability = positional
                .next()
                .and_then(|value| Capability::from_str(&value))
                .ok_or("validate expects llm|rerank|embedding|stt|tts")?;
            Command::Validate(capability)
        }
        Some("rerank") => {
            let query = positional.next().ok_or("rerank expects QUERY DOC...")?;
            let docs: Vec<String> = positional.collect();
            Command::Rerank { query, docs }
        }
        Some("embed") => {
            let texts: Vec<String> = positional.collect();
            if texts.is_empty() {
                return Err("embed expects at least one TEXT".into());
            }
            Command::Embed { texts }
        }
        Some("chat") => {
            let prompt = positional.collect::<Vec<_>>().join(" ");
            if prompt.trim().is_empty() {
                return Err("chat expects a PROMPT".into());
            }
            Command::Chat { prompt, stream }
        }
        Some("transcribe") => Command::Transcribe {
            path: positional.next().ok_or("transcribe expects a FILE")?,
        },
        Some("speak") => {
            let text = positional.collect::<Vec<_>>().join(" ");
            if text.trim().is_empty() {
                return Err("speak expects TEXT".into());
            }
            Command::Speak { text, voice, out }
        }
        Some(other) => return Err(format!("unknown command: {other}").into()),
        None => {
            print_help();
            std::process::exit(2);
        }
    };

    Ok(CliConfig {
        credentials,
        model_override,
        command,
    })
}

fn print_help() {
    println!(
        "Usage:\n  insigma-cli [--endpoint URL] [--model MODEL] COMMAND ...\n\nCommands:\n  validate llm|rerank|embedding|stt|tts\n  rerank QUERY DOC...\n  embed TEXT...\n  chat [--stream] PROMPT\n  transcribe FILE\n  speak [--voice VOICE] [--out PATH] TEXT\n\nEnv:\n  INSIGMA_ENDPOINT_URL / INSIGMA_API_KEY\n  INSIGMA_LLM_MODEL / INSIGMA_RERANK_MODEL / INSIGMA_EMBEDDING_MODEL\n  INSIGMA_STT_MODEL / INSIGMA_TTS_MODEL\n  RUST_LOG (default {DEFAULT_LOG_FILTER})"
    );
}

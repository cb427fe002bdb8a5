//! CLI binary for smartstudy-ai.
//!
//! A thin shim over the library crate: `serve` runs the HTTP API,
//! `generate` runs one request from the terminal, `extract` runs the
//! response extractor on a saved model reply (no API key needed).

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use smartstudy_ai::pipeline::input::SourceFile;
use smartstudy_ai::{
    extract, render_plain, run_server, GenerationRequest, StorageBackend, StudyConfig,
    StudyService, TaskKind,
};
use std::io::{self, Read};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Run the API on port 8080 with notes kept in ./data
  smartstudy serve --data-dir ./data

  # Flashcards from a text file
  smartstudy generate --task flashcard notes.txt

  # Summary of a scanned page, as JSON
  smartstudy generate --task ocr_summary --json scan.pdf

  # Check what the extractor makes of a saved model reply
  smartstudy extract --task mcq reply.txt

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (default provider)
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (gemini, openai, anthropic, ollama)
  EDGEQUAKE_MODEL         Override model ID
  SMARTSTUDY_DATA_DIR     Keep notes and uploads on disk instead of in memory
  PORT                    Port for `serve`
  RUST_LOG                Log filter, e.g. smartstudy_ai=debug
"#;

/// Generate summaries, flashcards and quizzes from study material.
#[derive(Parser, Debug)]
#[command(
    name = "smartstudy",
    version,
    about = "Generate summaries, flashcards and quizzes from study material",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "SMARTSTUDY_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "SMARTSTUDY_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API.
    Serve {
        #[command(flatten)]
        service: ServiceArgs,

        /// Address to bind.
        #[arg(long, env = "SMARTSTUDY_BIND", default_value = "0.0.0.0:8080")]
        bind: SocketAddr,

        /// Port override (keeps the bind host).
        #[arg(long, env = "PORT")]
        port: Option<u16>,
    },

    /// Generate study material once and print it.
    Generate {
        #[command(flatten)]
        service: ServiceArgs,

        /// Task: summary, mcq, flashcard, ocr_summary.
        #[arg(short, long, default_value = "summary")]
        task: TaskKind,

        /// Text or PDF/image file with the study material.
        input: Option<PathBuf>,

        /// Study material given inline instead of a file.
        #[arg(long, conflicts_with = "input")]
        text: Option<String>,

        /// User the note is stored for.
        #[arg(long, env = "SMARTSTUDY_USER", default_value = "cli")]
        user: String,

        /// Note title.
        #[arg(long)]
        title: Option<String>,

        /// Print the full outcome as JSON instead of a study sheet.
        #[arg(long)]
        json: bool,
    },

    /// Run the response extractor on a raw model reply (file or stdin).
    Extract {
        /// Task the reply answers: summary, mcq, flashcard, ocr_summary.
        #[arg(short, long, default_value = "summary")]
        task: TaskKind,

        /// File with the reply; reads stdin when omitted.
        input: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct ServiceArgs {
    /// LLM model ID (e.g. gemini-2.5-flash, gpt-4.1-mini).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: gemini, openai, anthropic, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Keep notes and uploads under this directory (default: in memory).
    #[arg(long, env = "SMARTSTUDY_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "SMARTSTUDY_TEMPERATURE", default_value_t = 0.3)]
    temperature: f32,

    /// Max LLM output tokens per call (default depends on the task).
    #[arg(long, env = "SMARTSTUDY_MAX_TOKENS")]
    max_tokens: Option<usize>,

    /// Retries on a failed or timed-out model call.
    #[arg(long, env = "SMARTSTUDY_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// Extra model calls when a reply cannot be parsed.
    #[arg(long, env = "SMARTSTUDY_FALLBACK_RETRIES", default_value_t = 1)]
    fallback_retries: u32,

    /// Per-call model timeout in seconds.
    #[arg(long, env = "SMARTSTUDY_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "SMARTSTUDY_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // `generate` shows a spinner, so library INFO logs stay quiet there.
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || matches!(cli.command, Command::Generate { .. } | Command::Extract { .. }) {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Serve {
            service,
            bind,
            port,
        } => {
            let mut addr = bind;
            if let Some(port) = port {
                addr.set_port(port);
            }
            let config = build_config(&service, Some(addr)).await?;
            let service = StudyService::from_config(config).context("Failed to start service")?;
            run_server(service).await.context("HTTP server failed")?;
        }

        Command::Generate {
            service,
            task,
            input,
            text,
            user,
            title,
            json,
        } => {
            let config = build_config(&service, None).await?;
            let service = StudyService::from_config(config).context("Failed to start service")?;

            let mut request = match (input, text) {
                (Some(path), _) => {
                    let bytes = tokio::fs::read(&path)
                        .await
                        .with_context(|| format!("Failed to read {}", path.display()))?;
                    let file = SourceFile {
                        bytes,
                        content_type: None,
                        filename: path.file_name().map(|n| n.to_string_lossy().into_owned()),
                    };
                    GenerationRequest::file(user, task, file)
                }
                (None, Some(text)) => GenerationRequest::text(user, task, text),
                (None, None) => anyhow::bail!("Provide an input file or --text"),
            };
            request.title = title;

            let spinner = (!cli.quiet && !json).then(|| spinner(task));
            let result = service.generate(request).await;
            if let Some(bar) = spinner {
                bar.finish_and_clear();
            }
            let outcome = result.context("Generation failed")?;

            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&outcome).context("Failed to serialise output")?
                );
            } else {
                println!("{}", render_plain(&outcome.note.result));
            }

            if !cli.quiet {
                let mark = match outcome.fallback {
                    None => green("✔"),
                    Some(ref reason) => yellow(&format!("⚠ fallback: {reason}")),
                };
                eprintln!(
                    "{}  note {}  {}",
                    mark,
                    outcome.note.id,
                    dim(&format!(
                        "{} tokens in / {} tokens out  —  {}ms",
                        outcome.stats.input_tokens,
                        outcome.stats.output_tokens,
                        outcome.stats.total_duration_ms
                    )),
                );
            }
        }

        Command::Extract { task, input } => {
            let raw = match input {
                Some(path) => tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                None => {
                    let mut buf = String::new();
                    io::stdin()
                        .read_to_string(&mut buf)
                        .context("Failed to read stdin")?;
                    buf
                }
            };

            let extraction = extract(&raw, task);
            println!(
                "{}",
                serde_json::to_string_pretty(extraction.result())
                    .context("Failed to serialise result")?
            );
            if let Some(reason) = extraction.fallback_reason() {
                if !cli.quiet {
                    eprintln!("{}", yellow(&format!("⚠ fallback: {reason}")));
                }
            }
        }
    }

    Ok(())
}

fn spinner(task: TaskKind) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  ⏱ {elapsed}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
    );
    bar.set_prefix("Generating");
    bar.set_message(task.to_string());
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

/// Map CLI args to `StudyConfig`.
async fn build_config(args: &ServiceArgs, bind: Option<SocketAddr>) -> Result<StudyConfig> {
    let system_prompt = if let Some(ref path) = args.system_prompt {
        Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read system prompt from {:?}", path))?,
        )
    } else {
        None
    };

    let mut builder = StudyConfig::builder()
        .temperature(args.temperature)
        .max_retries(args.max_retries)
        .fallback_retries(args.fallback_retries)
        .api_timeout_secs(args.api_timeout);

    if let Some(ref model) = args.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = args.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(n) = args.max_tokens {
        builder = builder.max_tokens(n);
    }
    if let Some(prompt) = system_prompt {
        builder = builder.system_prompt(prompt);
    }
    if let Some(ref dir) = args.data_dir {
        builder = builder.storage(StorageBackend::Filesystem(dir.clone()));
    }
    if let Some(addr) = bind {
        builder = builder.bind_addr(addr);
    }

    builder.build().context("Invalid configuration")
}

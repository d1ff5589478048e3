//! CLI for tryon - virtual try-on image generation.

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tryon::image::{decode_base64_lenient, ImageFormat, ImagePayload, Instruction};
use tryon::server::{AppState, ServerConfig, DEFAULT_ADDR, DEFAULT_BODY_LIMIT};
use tryon::{GeminiModel, GeminiProvider, GenerateClient, TryOnError, TryOnProvider};

#[derive(Parser)]
#[command(name = "tryon")]
#[command(about = "Composite a product onto a model photo via Gemini image generation")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the /api/generate proxy server
    Serve(ServeArgs),

    /// Send two images to a running proxy and save the result
    Generate(GenerateArgs),

    /// Call Gemini directly, without a proxy
    Compose(ComposeArgs),
}

#[derive(Args)]
struct ProviderArgs {
    /// Gemini API key
    #[arg(long, env = "API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Gemini image model
    #[arg(long, value_enum, default_value = "nano-banana")]
    gemini_model: GeminiModelArg,

    /// Instruction sent with the two images
    #[arg(long, value_enum, default_value = "compose")]
    instruction: InstructionArg,
}

#[derive(Args)]
struct ServeArgs {
    /// Address to listen on
    #[arg(long, env = "TRYON_ADDR", default_value = DEFAULT_ADDR)]
    addr: SocketAddr,

    /// Maximum request body size in bytes
    #[arg(long, env = "TRYON_BODY_LIMIT", default_value_t = DEFAULT_BODY_LIMIT)]
    body_limit: usize,

    /// Allow cross-origin requests from any origin
    #[arg(long)]
    cors: bool,

    /// Verify the API key against Gemini before serving
    #[arg(long)]
    check: bool,

    #[command(flatten)]
    provider: ProviderArgs,
}

#[derive(Args)]
struct ImageArgs {
    /// Product (garment) image
    #[arg(short, long)]
    product: PathBuf,

    /// Model photo
    #[arg(short, long)]
    model: PathBuf,

    /// Output file path
    #[arg(short, long)]
    output: PathBuf,
}

#[derive(Args)]
struct GenerateArgs {
    #[command(flatten)]
    images: ImageArgs,

    /// Base URL of the proxy
    #[arg(long, env = "TRYON_ENDPOINT", default_value = "http://127.0.0.1:3000")]
    endpoint: String,
}

#[derive(Args)]
struct ComposeArgs {
    #[command(flatten)]
    images: ImageArgs,

    #[command(flatten)]
    provider: ProviderArgs,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum GeminiModelArg {
    NanoBanana,
    NanoBananaPro,
}

impl From<GeminiModelArg> for GeminiModel {
    fn from(arg: GeminiModelArg) -> Self {
        match arg {
            GeminiModelArg::NanoBanana => GeminiModel::NanoBanana,
            GeminiModelArg::NanoBananaPro => GeminiModel::NanoBananaPro,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum InstructionArg {
    Compose,
    Editorial,
}

impl From<InstructionArg> for Instruction {
    fn from(arg: InstructionArg) -> Self {
        match arg {
            InstructionArg::Compose => Instruction::Compose,
            InstructionArg::Editorial => Instruction::Editorial,
        }
    }
}

/// Exit code for failures detected before any request was sent.
const EXIT_INPUT: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        // stdout is reserved for results
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve(args) => serve(args).await,
        Commands::Generate(args) => generate(args, cli.json).await,
        Commands::Compose(args) => compose(args, cli.json).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(exit_status(&e))
        }
    }
}

/// Bad inputs exit with 2, everything else (network, API, I/O) with 1.
fn exit_status(err: &anyhow::Error) -> u8 {
    let local = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<TryOnError>())
        .is_some_and(TryOnError::is_local);
    if local {
        EXIT_INPUT
    } else {
        1
    }
}

fn build_provider(args: &ProviderArgs) -> tryon::Result<GeminiProvider> {
    let mut builder = GeminiProvider::builder()
        .model(args.gemini_model.into())
        .instruction(args.instruction.into());
    if let Some(ref key) = args.api_key {
        builder = builder.api_key(key);
    }
    builder.build()
}

async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    let state = match build_provider(&args.provider) {
        Ok(provider) => {
            if args.check {
                provider.health_check().await?;
                tracing::info!(model = provider.model().as_str(), "API key verified");
            }
            AppState::new(Arc::new(provider))
        }
        // Still serve, so callers get a JSON error per request
        Err(TryOnError::Auth(msg)) => {
            tracing::warn!("{msg}; requests will fail until API_KEY is set");
            AppState::without_provider()
        }
        Err(e) => return Err(e.into()),
    };

    let config = ServerConfig {
        addr: args.addr,
        body_limit: args.body_limit,
        permissive_cors: args.cors,
    };
    tryon::server::serve(config, state).await?;
    Ok(())
}

/// Encodes one input, reporting a failure without aborting the other.
fn encode(label: &str, path: &Path) -> Option<ImagePayload> {
    match ImagePayload::from_file(path) {
        Ok(payload) => Some(payload),
        Err(e) => {
            let cause = match &e {
                TryOnError::FileRead(io) => io.to_string(),
                other => other.to_string(),
            };
            tracing::error!(path = %path.display(), "{label} image: {e} ({cause})");
            None
        }
    }
}

async fn generate(args: GenerateArgs, json_output: bool) -> anyhow::Result<()> {
    let product = encode("product", &args.images.product);
    let model = encode("model", &args.images.model);

    let client = GenerateClient::new(&args.endpoint);
    let generated = client
        .generate(product.as_ref(), model.as_ref())
        .await
        .context("Image generation failed")?;

    let data =
        decode_base64_lenient(&generated).map_err(|e| TryOnError::Decode(e.to_string()))?;
    report(&args.images.output, &data, client.endpoint(), json_output)
}

async fn compose(args: ComposeArgs, json_output: bool) -> anyhow::Result<()> {
    let product = encode("product", &args.images.product);
    let model = encode("model", &args.images.model);
    let (Some(product), Some(model)) = (product, model) else {
        return Err(TryOnError::MissingInput.into());
    };

    let provider = build_provider(&args.provider)?;
    let image = provider
        .compose(&product, &model)
        .await
        .context("Image generation failed")?;

    let data = image.decode()?;
    report(&args.images.output, &data, provider.name(), json_output)
}

fn report(output: &Path, data: &[u8], via: &str, json_output: bool) -> anyhow::Result<()> {
    std::fs::write(output, data)?;

    let format = ImageFormat::from_magic_bytes(data);
    let expected = output
        .extension()
        .and_then(|e| e.to_str())
        .and_then(ImageFormat::from_extension);
    if let (Some(actual), Some(expected)) = (format, expected) {
        if actual != expected {
            tracing::warn!(
                "{} has a .{} extension but contains {} data",
                output.display(),
                expected.extension(),
                actual
            );
        }
    }

    if json_output {
        let result = serde_json::json!({
            "type": "image",
            "success": true,
            "output": output.display().to_string(),
            "size_bytes": data.len(),
            "format": format.map(|f| f.extension()),
            "via": via,
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!(
            "Generated image: {} ({} bytes) via {}",
            output.display(),
            data.len(),
            via
        );
    }

    Ok(())
}

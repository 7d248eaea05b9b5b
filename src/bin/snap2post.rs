//! CLI binary for snap2post.
//!
//! A thin shim over the library crate: `analyze` prints the extraction for
//! a screenshot, `capture` analyzes and saves it as a content record, and
//! `serve` runs the extraction proxy (requires the `proxy` feature).

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use snap2post::{
    store::supabase::SupabaseStore, store::ObjectStore, IngestConfig, Ingestor, UploadSession,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}

#[derive(Parser)]
#[command(
    name = "snap2post",
    version,
    about = "Capture Instagram posts from screenshots using vision models"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Vision model identifier.
    #[arg(long, global = true, default_value = "gpt-4o")]
    model: String,

    /// Per-call API timeout in seconds.
    #[arg(long, global = true, default_value_t = 60)]
    api_timeout: u64,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze a screenshot and print the extracted fields as JSON.
    Analyze {
        /// Path to the screenshot (png/jpeg/webp/gif).
        image: PathBuf,
    },
    /// Analyze a screenshot and save it as a content record.
    ///
    /// Requires SUPABASE_URL and SUPABASE_SERVICE_KEY in the environment.
    Capture {
        /// Path to the screenshot.
        image: PathBuf,
        /// Link back to the original post.
        #[arg(long)]
        post_url: Option<String>,
        /// Storage bucket for the uploaded image.
        #[arg(long, default_value = snap2post::DEFAULT_BUCKET)]
        bucket: String,
    },
    /// Run the extraction proxy (feature "proxy").
    #[cfg(feature = "proxy")]
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = IngestConfig::builder()
        .model(&cli.model)
        .api_timeout_secs(cli.api_timeout);

    match cli.command {
        Command::Analyze { image } => {
            let config = config.build()?;
            let extraction = analyze_file(&image, config.clone()).await?;
            println!("{}", serde_json::to_string_pretty(&extraction)?);
            let tags: Vec<String> = extraction
                .hashtags
                .iter()
                .map(|t| snap2post::display_hashtag(t))
                .collect();
            eprintln!(
                "{} {}",
                green("✓"),
                dim(&format!(
                    "{} likes, {} comments  {}",
                    extraction.likes,
                    extraction.comments,
                    tags.join(" ")
                ))
            );
        }

        Command::Capture {
            image,
            post_url,
            bucket,
        } => {
            let config = config.bucket(bucket).build()?;
            let store = Arc::new(SupabaseStore::from_env()?);
            let ingestor = Ingestor::from_config(config, store.clone(), store)?;

            let mut session = stage_file(&image).await?;
            let extraction = ingestor
                .analyze(&mut session)
                .await
                .map_err(print_analysis_error)
                .map_err(|e| anyhow::anyhow!(e))?;
            eprintln!("{} analyzed: {}", green("✓"), extraction.caption);

            let record = ingestor.save(&mut session, post_url).await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
            eprintln!("{} saved as '{}'", green("✓"), record.title);
        }

        #[cfg(feature = "proxy")]
        Command::Serve => {
            let proxy_config = snap2post::proxy::ProxyConfig::from_env()?;
            snap2post::proxy::serve(proxy_config).await?;
        }
    }

    Ok(())
}

async fn stage_file(path: &PathBuf) -> Result<UploadSession> {
    let staged = snap2post::pipeline::encode::read_image_file(path)
        .await
        .with_context(|| format!("could not stage {}", path.display()))?;
    let mut session = UploadSession::new();
    session.accept(snap2post::FileUpload {
        filename: staged.filename.clone(),
        mime: staged.mime.clone(),
        bytes: staged.bytes,
    })?;
    Ok(session)
}

async fn analyze_file(
    path: &PathBuf,
    config: IngestConfig,
) -> Result<snap2post::ExtractionResult> {
    // Analyze-only runs need no storage; a memory store satisfies the
    // ingestor without touching the network.
    let store = Arc::new(snap2post::store::memory::MemoryStore::new());
    let objects: Arc<dyn ObjectStore> = store.clone();
    let ingestor = Ingestor::from_config(config, objects, store)?;
    let mut session = stage_file(path).await?;
    ingestor
        .analyze(&mut session)
        .await
        .map_err(print_analysis_error)
        .map_err(|e| anyhow::anyhow!(e))
}

/// Surface the raw completion on unparsable extractions before the error
/// propagates — on the CLI that diagnostic would otherwise be lost.
fn print_analysis_error(e: snap2post::IngestError) -> snap2post::IngestError {
    if let Some(raw) = e.raw_completion() {
        eprintln!("{} model response was not JSON:\n{}", red("✗"), dim(raw));
    }
    e
}

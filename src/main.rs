use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shopfront_media::ai::ProductCopy;
use shopfront_media::app::{App, ProductDraft};
use shopfront_media::compression::{
    format_file_size, BatchRunner, BatchSummary, Compressor, NativeCodec, Profile,
};
use shopfront_media::models::{CompressionResult, Config, ImageAsset};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "shopfront-media")]
#[command(about = "Compress and publish shopfront product images")]
struct CliArgs {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Compress local images without touching any backend.
    Compress {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(long, default_value = "general", value_parser = parse_profile_arg)]
        profile: Profile,
        #[arg(long, default_value = "compressed")]
        out_dir: PathBuf,
        #[arg(long, default_value_t = 4)]
        concurrency: usize,
    },
    #[command(flatten)]
    Backend(BackendCommand),
}

/// Commands that talk to storage and the catalog.
#[derive(Debug, Subcommand)]
enum BackendCommand {
    /// Compress, upload and create a product from the given images.
    Publish {
        #[arg(long)]
        name: String,
        #[arg(long)]
        category: String,
        #[arg(long)]
        price: f64,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long = "type", default_value = "")]
        kind: String,
        #[arg(long)]
        featured: bool,
        /// Rewrite the name and description with the copy model first.
        #[arg(long)]
        enhance: bool,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Suggest a storefront title and description.
    Enhance {
        #[arg(long, default_value = "")]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Delete a product and its stored images.
    DeleteProduct { id: String },
    /// Delete stored product images no product references.
    CleanupOrphans,
    Categories,
    AddCategory { name: String },
    DeleteCategory { id: String },
}

fn parse_profile_arg(input: &str) -> std::result::Result<Profile, String> {
    input.parse::<Profile>().map_err(|e| e.to_string())
}

/// MIME type for a local file, judged by extension the way a browser would.
fn mime_for_path(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "application/octet-stream",
    }
}

/// Read and validate every file before any compression starts.
fn load_assets(files: &[PathBuf]) -> Result<Vec<ImageAsset>> {
    files
        .iter()
        .map(|path| {
            let bytes =
                std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
            let file_name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            ImageAsset::from_upload(file_name, mime_for_path(path), bytes)
                .with_context(|| format!("rejecting {}", path.display()))
        })
        .collect()
}

fn print_report(results: &[CompressionResult], summary: &BatchSummary) {
    for result in results {
        let status = match &result.degraded {
            Some(degraded) => format!(" [kept original: {}]", degraded),
            None => String::new(),
        };
        println!(
            "{}: {} -> {} ({:.1}% saved, {} -> {}){}",
            result.output.file_name,
            format_file_size(result.original_byte_size),
            format_file_size(result.output_byte_size),
            result.savings_percent,
            result.original_format.extension(),
            result.output_format.extension(),
            status
        );
    }
    println!(
        "{} file(s): {} -> {} ({:.1}% saved, {} converted, {} degraded)",
        summary.files,
        format_file_size(summary.total_original_bytes),
        format_file_size(summary.total_output_bytes),
        summary.savings_percent,
        summary.converted,
        summary.degraded
    );
}

async fn compress_local(
    files: &[PathBuf],
    profile: Profile,
    out_dir: &Path,
    concurrency: usize,
) -> Result<()> {
    let assets = load_assets(files)?;
    let runner = BatchRunner::new(Compressor::new(Arc::new(NativeCodec::new())), concurrency);
    let results = runner.compress_with_profile(&assets, profile).await;

    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("creating {}", out_dir.display()))?;
    for result in &results {
        let path = out_dir.join(&result.output.file_name);
        std::fs::write(&path, &result.output.bytes)
            .with_context(|| format!("writing {}", path.display()))?;
    }

    print_report(&results, &BatchSummary::from_results(&results));
    Ok(())
}

async fn sign_in_admin(app: &App, config: &Config) -> Result<()> {
    let email = config
        .admin_email
        .as_deref()
        .context("ADMIN_EMAIL not set")?;
    let password = config
        .admin_password
        .as_deref()
        .context("ADMIN_PASSWORD not set")?;
    app.sign_in(email, password).await?;
    info!("Signed in as {}", email);
    Ok(())
}

async fn run(command: Command) -> Result<()> {
    match command {
        Command::Compress {
            files,
            profile,
            out_dir,
            concurrency,
        } => compress_local(&files, profile, &out_dir, concurrency).await,
        Command::Backend(command) => run_backend(command).await,
    }
}

async fn run_backend(command: BackendCommand) -> Result<()> {
    let config = Config::from_env()?;
    let app = App::new(&config).await?;

    match command {
        BackendCommand::Publish {
            name,
            category,
            price,
            description,
            kind,
            featured,
            enhance,
            files,
        } => {
            let assets = load_assets(&files)?;
            sign_in_admin(&app, &config).await?;
            let mut draft = ProductDraft {
                name,
                kind,
                description,
                price,
                category,
                featured,
            };
            if enhance {
                draft = app.enhance_draft(draft).await?;
                info!("Using enhanced name '{}'", draft.name);
            }
            let published = app.publish_product(draft, assets).await?;
            print_report(&published.results, &published.summary);
            println!("Created product {}", published.product.id);
        }
        BackendCommand::Enhance { title, description } => {
            let copy = app
                .enhance_copy(&ProductCopy::new(title, description))
                .await?;
            println!("{}", serde_json::to_string_pretty(&copy)?);
        }
        BackendCommand::DeleteProduct { id } => {
            sign_in_admin(&app, &config).await?;
            let released = app.delete_product(&id).await?;
            println!("Deleted product {} ({} image(s) released)", id, released);
        }
        BackendCommand::CleanupOrphans => {
            sign_in_admin(&app, &config).await?;
            let deleted = app.cleanup_orphaned_images().await?;
            for key in &deleted {
                println!("{}", key);
            }
            println!("Removed {} orphaned image(s)", deleted.len());
        }
        BackendCommand::Categories => {
            for category in app.catalog().list_categories().await? {
                println!("{}\t{}\t{}", category.id, category.slug, category.name);
            }
        }
        BackendCommand::AddCategory { name } => {
            sign_in_admin(&app, &config).await?;
            let category = app.catalog().create_category(&name).await?;
            println!("Created category {} ({})", category.name, category.id);
        }
        BackendCommand::DeleteCategory { id } => {
            sign_in_admin(&app, &config).await?;
            app.catalog().delete_category(&id).await?;
            println!("Deleted category {}", id);
        }
    }

    app.sign_out().await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shopfront_media=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = CliArgs::parse();

    if let Err(e) = run(args.command).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
    Ok(())
}

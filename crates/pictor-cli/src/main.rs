//! Pictor - multi-provider AI image generation broker
//!
//! A demo caller for the broker library: generate images from the command
//! line against any configured model, inspect models and styles, and switch
//! the command-scope model within a session.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use pictor_core::broker::GenerationIntent;
use pictor_core::request::GenerationMode;
use pictor_core::transport::HttpTransport;
use pictor_core::{Broker, ImageResult, PictorConfig};

/// Pictor - AI image generation broker
#[derive(Parser)]
#[command(name = "pictor")]
#[command(about = "Multi-provider AI image generation broker", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an image from a prompt
    Generate {
        /// Image description
        prompt: String,

        /// Model id from the configuration (defaults to the configured default)
        #[arg(short, long)]
        model: Option<String>,

        /// Style id or alias to apply
        #[arg(short, long)]
        style: Option<String>,

        /// Target size, e.g. 1024x1024
        #[arg(long)]
        size: Option<String>,

        /// Negative prompt
        #[arg(long)]
        negative: Option<String>,

        /// Source image for image-to-image
        #[arg(short, long)]
        image: Option<PathBuf>,

        /// Image-to-image strength, 0.1..=1.0
        #[arg(long)]
        strength: Option<f64>,

        /// Where to write inline image bytes
        #[arg(short, long, default_value = "out.png")]
        output: PathBuf,
    },
    /// Inspect or switch models
    Models {
        #[command(subcommand)]
        command: ModelCommands,
    },
    /// Inspect styles
    Styles {
        #[command(subcommand)]
        command: StyleCommands,
    },
    /// Show the current broker configuration
    Config,
}

#[derive(Subcommand)]
enum ModelCommands {
    /// List configured models
    List,
    /// Switch the command-scope model for this session
    Use { id: String },
    /// Reset the command-scope model back to the default
    Reset,
}

#[derive(Subcommand)]
enum StyleCommands {
    /// List configured styles
    List,
    /// Show one style and its aliases
    Show { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = PictorConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    if !config.plugin.enabled {
        bail!("pictor is disabled in {} (plugin.enabled = false)", cli.config.display());
    }
    let broker = Broker::from_config(&config, Arc::new(HttpTransport::new()))?;

    match cli.command {
        Commands::Generate {
            prompt,
            model,
            style,
            size,
            negative,
            image,
            strength,
            output,
        } => {
            let source_image = image
                .map(|path| {
                    std::fs::read(&path)
                        .map(bytes::Bytes::from)
                        .with_context(|| format!("reading {}", path.display()))
                })
                .transpose()?;
            let intent = GenerationIntent {
                mode: if source_image.is_some() {
                    GenerationMode::ImageToImage
                } else {
                    GenerationMode::TextToImage
                },
                prompt,
                negative_prompt: negative,
                size,
                source_image,
                model_id: model,
                style,
                strength,
            };
            match broker.generate(intent).await? {
                ImageResult::Reference(url) => println!("{}", url),
                ImageResult::Inline(data) => {
                    std::fs::write(&output, &data)
                        .with_context(|| format!("writing {}", output.display()))?;
                    println!("wrote {} bytes to {}", data.len(), output.display());
                }
            }
        }
        Commands::Models { command } => match command {
            ModelCommands::List => {
                let status = broker.current_config();
                for profile in broker.list_models() {
                    let mut tags = vec![profile.format.to_string()];
                    if profile.support_img2img {
                        tags.push("img2img".to_string());
                    }
                    if profile.id == status.default_model {
                        tags.push("default".to_string());
                    }
                    if profile.id == status.command_model {
                        tags.push("command".to_string());
                    }
                    println!(
                        "{:<12} {:<24} [{}]",
                        profile.id,
                        profile.display_name,
                        tags.join(", ")
                    );
                }
            }
            ModelCommands::Use { id } => {
                broker.set_model(&id)?;
                println!("command-scope model is now {}", id);
            }
            ModelCommands::Reset => {
                broker.reset_config();
                println!(
                    "command-scope model reset to {}",
                    broker.current_config().default_model
                );
            }
        },
        Commands::Styles { command } => match command {
            StyleCommands::List => {
                for style in broker.list_styles() {
                    println!("{:<12} {}", style.id, style.prompt);
                }
            }
            StyleCommands::Show { id } => {
                let style = broker.describe_style(&id)?;
                println!("id:      {}", style.id);
                println!("prompt:  {}", style.prompt);
                if !style.aliases.is_empty() {
                    println!("aliases: {}", style.aliases.join(", "));
                }
            }
        },
        Commands::Config => {
            let status = broker.current_config();
            println!("default model:  {}", status.default_model);
            println!("command model:  {}", status.command_model);
            println!(
                "cache:          {} ({} outcomes)",
                if status.cache_enabled { "enabled" } else { "disabled" },
                status.cached_outcomes
            );
            println!(
                "debug logging:  {}",
                if status.debug { "enabled" } else { "disabled" }
            );
        }
    }

    Ok(())
}

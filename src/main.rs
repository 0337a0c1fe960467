//! CLI entry point for spacetraveling

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use spacetraveling::config::preview_secret;
use spacetraveling::generator::Generator;
use spacetraveling::server::{AppState, PreviewSession};
use spacetraveling::Blog;

#[derive(Parser)]
#[command(name = "spacetraveling")]
#[command(version)]
#[command(about = "A blog frontend rendered from a headless CMS", long_about = None)]
struct Cli {
    /// Set the base directory (defaults to current directory)
    #[arg(short, long, global = true)]
    cwd: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the site into the public folder
    #[command(alias = "g")]
    Generate {
        /// Read posts from a JSON fixture file instead of the content API
        #[arg(short, long)]
        fixtures: Option<PathBuf>,
    },

    /// Start the blog server
    #[command(alias = "s")]
    Server {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// IP address to bind to
        #[arg(short, long, default_value = "localhost")]
        ip: String,

        /// Read posts from a JSON fixture file instead of the content API
        #[arg(short, long)]
        fixtures: Option<PathBuf>,
    },

    /// Clean the public folder
    Clean,

    /// List every published post
    List {
        /// Read posts from a JSON fixture file instead of the content API
        #[arg(short, long)]
        fixtures: Option<PathBuf>,
    },

    /// Display version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // A missing .env file is fine
    dotenvy::dotenv().ok();

    // Initialize logging
    let filter = if cli.debug {
        "spacetraveling=debug,info"
    } else {
        "spacetraveling=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine base directory
    let base_dir = match cli.cwd {
        Some(dir) => dir,
        None => std::env::current_dir().context("cannot read the current directory")?,
    };

    match cli.command {
        Commands::Generate { fixtures } => {
            let blog = Blog::new(&base_dir)?;
            tracing::info!("Generating static files...");
            let count = blog.generate(fixtures.as_deref()).await?;
            println!("Generated {} posts successfully!", count);
        }

        Commands::Server { port, ip, fixtures } => {
            let blog = Blog::new(&base_dir)?;
            let source = blog.open_source(fixtures.as_deref())?;
            let generator = Generator::new(&blog.config, source)?;
            let secret = preview_secret();
            let session = PreviewSession::new(secret.as_deref(), &blog.config.preview.cookie_name);

            let state = AppState::new(generator, session, blog.public_dir.clone());
            tracing::info!("Starting server at http://{}:{}", ip, port);
            spacetraveling::server::start(state, &ip, port).await?;
        }

        Commands::Clean => {
            let blog = Blog::new(&base_dir)?;
            tracing::info!("Cleaning public folder...");
            blog.clean()?;
            println!("Cleaned successfully!");
        }

        Commands::List { fixtures } => {
            let blog = Blog::new(&base_dir)?;
            spacetraveling::commands::list::run(&blog, fixtures.as_deref()).await?;
        }

        Commands::Version => {
            println!("spacetraveling version {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

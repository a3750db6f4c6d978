//! # namecard CLI
//!
//! Command-line interface for personalized invitation cards.
//!
//! ## Usage
//!
//! ```bash
//! # Run the card editor
//! namecard serve --listen 0.0.0.0:8080 --font-dir ./fonts
//!
//! # Render one card from a share link's query string
//! namecard render --image party.jpg --out card.png \
//!     --query 'name=Jane%20Doe&fontSize=30&coordinates=%5B0.5%2C0.1%5D' \
//!     --font-dir ./fonts
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use namecard::{
    CardError,
    fonts::{FontReadinessDetector, FontRegistry, HttpFetcher, LoadOutcome, PollConfig},
    render::{self, SourceImage},
    server::{self, ServerConfig},
    settings::query,
    sync::SyncConfig,
};

/// namecard - Personalized invitation cards
#[derive(Parser, Debug)]
#[command(name = "namecard")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the card editor web server
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:8080")]
        listen: String,

        /// Directory of .ttf/.otf fonts available from the start
        #[arg(long, value_name = "DIR")]
        font_dir: Option<PathBuf>,

        /// Quiet period before re-rendering and re-persisting, in ms
        #[arg(long, default_value = "1000")]
        debounce_ms: u64,

        /// Font readiness poll interval, in ms
        #[arg(long, default_value = "500", value_parser = clap::value_parser!(u64).range(1..))]
        poll_interval_ms: u64,

        /// Unchanged polls before fonts count as loaded
        #[arg(long, default_value = "5")]
        poll_lives: u32,
    },

    /// Render a single card to a PNG file
    Render {
        /// Source image
        #[arg(long, value_name = "FILE")]
        image: PathBuf,

        /// Output PNG
        #[arg(long, value_name = "FILE")]
        out: PathBuf,

        /// Settings as a share-link query string (name=...&fontSize=...)
        #[arg(long, default_value = "")]
        query: String,

        /// Directory of .ttf/.otf fonts
        #[arg(long, value_name = "DIR")]
        font_dir: Option<PathBuf>,
    },
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), CardError> {
    let cli = Cli::parse();
    let runtime = tokio::runtime::Runtime::new()?;

    match cli.command {
        Commands::Serve {
            listen,
            font_dir,
            debounce_ms,
            poll_interval_ms,
            poll_lives,
        } => {
            let config = ServerConfig {
                listen_addr: listen,
                font_dir,
                sync: SyncConfig {
                    quiet_period: Duration::from_millis(debounce_ms),
                },
                poll: PollConfig {
                    interval: Duration::from_millis(poll_interval_ms),
                    lives: poll_lives,
                },
            };
            runtime.block_on(server::serve(config))
        }
        Commands::Render {
            image,
            out,
            query,
            font_dir,
        } => runtime.block_on(render_file(&image, &out, &query, font_dir.as_deref())),
    }
}

/// Render one card: load fonts, composite, write PNG.
async fn render_file(
    image: &std::path::Path,
    out: &std::path::Path,
    query_string: &str,
    font_dir: Option<&std::path::Path>,
) -> Result<(), CardError> {
    let settings = query::decode(query_string);

    let fonts = Arc::new(FontRegistry::new());
    if let Some(dir) = font_dir {
        let loaded = fonts.load_dir(dir)?;
        println!("Loaded {} fonts from {}", loaded, dir.display());
    }

    // Only touch the network when the link carries font markup
    if query::has_font_code(query_string) {
        let detector = FontReadinessDetector::new(
            fonts.clone(),
            Arc::new(HttpFetcher::new()?),
            PollConfig::default(),
        );
        println!("Loading web fonts...");
        if let LoadOutcome::Loaded { fonts: families, .. } =
            detector.load(&settings.font_stylesheet_markup).await?
        {
            println!("Available fonts: {}", families.join(", "));
        }
    }

    let filename = image
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let source = SourceImage::decode(std::fs::read(image)?, &filename)?;

    let size = render::effective_font_size(settings.size_pt, source.height);
    println!(
        "Rendering '{}' ({}) onto {}x{} image...",
        settings.display_name,
        render::font_descriptor(&settings, size),
        source.width,
        source.height
    );

    let card = render::render_card(&source, &settings, &fonts)?;
    std::fs::write(out, &card.png)?;
    println!("Saved to {}", out.display());
    Ok(())
}

//! Operator CLI for deck trees stored in PostgreSQL.
//!
//! Every command prints its result as JSON on stdout.

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use deckhub_core::model::VariantRef;
use deckhub_core::types::{DbId, RevisionId};
use deckhub_db::config::DatabaseConfig;
use deckhub_db::pg::PgStore;
use deckhub_engine::copy::{self, CopyOptions, SlidePolicy};
use deckhub_engine::history::{self, HistoryOptions};
use deckhub_engine::{resolver, translate};

#[derive(Parser)]
#[command(name = "deckhub")]
#[command(about = "Inspect and restructure revisioned deck trees", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Slides {
    /// Reference the source slides from the copies
    Share,
    /// Give every copy its own slides
    Duplicate,
}

impl From<Slides> for CopyOptions {
    fn from(slides: Slides) -> Self {
        let slides = match slides {
            Slides::Share => SlidePolicy::ShareUsage,
            Slides::Duplicate => SlidePolicy::Duplicate,
        };
        CopyOptions { slides }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending schema migrations
    Migrate,

    /// Resolve a deck into its nested tree
    Tree {
        deck_id: DbId,

        /// Preferred slide language
        #[arg(short, long)]
        language: Option<String>,
    },

    /// List a deck tree in pre-order
    Flatten {
        deck_id: DbId,

        #[arg(short, long)]
        language: Option<String>,

        /// Include slide content
        #[arg(long)]
        content: bool,
    },

    /// Show the first slide reachable from a deck
    FirstSlide {
        deck_id: DbId,

        #[arg(short, long)]
        language: Option<String>,
    },

    /// Show the history of a deck and everything under it
    DeckHistory {
        deck_id: DbId,

        #[arg(short, long)]
        language: Option<String>,

        /// Render one summary line per change
        #[arg(short, long)]
        simplify: bool,
    },

    /// Show the history of a slide
    SlideHistory {
        slide_id: DbId,

        #[arg(short, long)]
        language: Option<String>,

        #[arg(short, long)]
        simplify: bool,
    },

    /// Fork a deck tree into a new root
    Fork {
        deck_id: DbId,

        /// Acting user
        #[arg(short, long)]
        user: DbId,

        #[arg(long, value_enum, default_value = "share")]
        slides: Slides,
    },

    /// Copy a deck tree into another deck
    Attach {
        source_id: DbId,
        target_id: DbId,

        /// Root of the tree the target belongs to
        #[arg(long)]
        root: DbId,

        /// 1-based insert position; appends when omitted
        #[arg(short, long)]
        position: Option<usize>,

        #[arg(short, long)]
        user: DbId,

        #[arg(long, value_enum, default_value = "share")]
        slides: Slides,
    },

    /// Register a slide translation inside a deck tree
    Translate {
        root_id: DbId,
        slide_id: DbId,

        /// Slide holding the translation
        #[arg(long)]
        variant: DbId,

        #[arg(long, default_value = "1")]
        variant_revision: RevisionId,

        #[arg(long)]
        variant_language: String,

        #[arg(short, long)]
        user: DbId,
    },
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "deckhub_cli=info,deckhub_engine=info,deckhub_db=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn print<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn history_options(language: Option<String>, simplify: bool) -> HistoryOptions {
    HistoryOptions { language, simplify }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let config = DatabaseConfig::from_env()?;
    let pool = deckhub_db::create_pool(&config)
        .await
        .context("Failed to connect to database")?;
    deckhub_db::health_check(&pool)
        .await
        .context("Database health check failed")?;
    tracing::debug!("Database connection pool created");

    if let Commands::Migrate = cli.command {
        deckhub_db::run_migrations(&pool)
            .await
            .context("Failed to run database migrations")?;
        tracing::info!("Database migrations applied");
        return Ok(());
    }

    let store = PgStore::new(pool);
    match cli.command {
        Commands::Migrate => {}
        Commands::Tree { deck_id, language } => {
            let tree = resolver::resolve_tree(&store, deck_id, language.as_deref()).await?;
            print(&tree)?;
        }
        Commands::Flatten {
            deck_id,
            language,
            content,
        } => {
            let nodes = resolver::flatten(&store, deck_id, language.as_deref(), content).await?;
            print(&nodes)?;
        }
        Commands::FirstSlide { deck_id, language } => {
            let slide = resolver::first_slide(&store, deck_id, language.as_deref()).await?;
            print(&slide)?;
        }
        Commands::DeckHistory {
            deck_id,
            language,
            simplify,
        } => {
            let options = history_options(language, simplify);
            print(&history::deck_history(&store, deck_id, &options).await?)?;
        }
        Commands::SlideHistory {
            slide_id,
            language,
            simplify,
        } => {
            let options = history_options(language, simplify);
            print(&history::slide_history(&store, slide_id, &options).await?)?;
        }
        Commands::Fork {
            deck_id,
            user,
            slides,
        } => {
            let forked = copy::fork_deck(&store, deck_id, user, slides.into())
                .await?
                .with_context(|| format!("deck {deck_id} not found"))?;
            print(&forked)?;
        }
        Commands::Attach {
            source_id,
            target_id,
            root,
            position,
            user,
            slides,
        } => {
            let attached = copy::attach_deck_tree(
                &store,
                source_id,
                target_id,
                position,
                root,
                user,
                slides.into(),
            )
            .await?
            .with_context(|| format!("deck {source_id} or {target_id} not found"))?;
            print(&attached)?;
        }
        Commands::Translate {
            root_id,
            slide_id,
            variant,
            variant_revision,
            variant_language,
            user,
        } => {
            let variant = VariantRef {
                id: variant,
                revision: variant_revision,
                language: variant_language,
            };
            let record = translate::add_slide_translation(&store, root_id, slide_id, variant, user)
                .await?
                .with_context(|| format!("slide {slide_id} is not part of deck {root_id}"))?;
            print(&record)?;
        }
    }
    Ok(())
}

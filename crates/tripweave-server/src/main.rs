mod api;
mod config;
mod serve_cmd;

use clap::{Parser, Subcommand};

use tripweave_db::config::DbConfig;
use tripweave_db::pool;

use config::TripweaveConfig;

#[derive(Parser)]
#[command(name = "tripweave", about = "Conversational trip planning backend")]
struct Cli {
    /// Database URL (overrides TRIPWEAVE_DATABASE_URL env var)
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a tripweave config file (no database required)
    Init {
        /// PostgreSQL connection URL
        #[arg(long, default_value = DbConfig::DEFAULT_URL)]
        db_url: String,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Create and migrate the tripweave database
    DbInit,
    /// Run the HTTP API
    Serve {
        /// Address to bind (default from config, else 127.0.0.1)
        #[arg(long)]
        bind: Option<String>,
        /// Port to listen on (default from config, else 8080)
        #[arg(long)]
        port: Option<u16>,
        /// Keep trips in memory instead of PostgreSQL
        #[arg(long)]
        memory_store: bool,
    },
}

/// Execute the `tripweave init` command: write config file.
fn cmd_init(db_url: &str, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let cfg = config::ConfigFile {
        database: config::DatabaseSection {
            url: db_url.to_string(),
        },
        reasoner: config::ReasonerSection {
            base_url: Some(tripweave_core::reasoner::http::DEFAULT_BASE_URL.to_string()),
            model: Some(tripweave_core::reasoner::http::DEFAULT_MODEL.to_string()),
            api_key: None,
            timeout_secs: Some(tripweave_core::reasoner::http::DEFAULT_TIMEOUT.as_secs()),
        },
        server: config::ServerSection::default(),
    };

    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  database.url = {db_url}");
    println!("  reasoner.model = {}", tripweave_core::reasoner::http::DEFAULT_MODEL);
    println!();
    println!("Set reasoner.api_key in the file or export TRIPWEAVE_REASONER_API_KEY.");
    println!("Next: run `tripweave db-init` to create and migrate the database.");

    Ok(())
}

async fn cmd_db_init(cli_db_url: Option<&str>) -> anyhow::Result<()> {
    let resolved = TripweaveConfig::resolve(cli_db_url)?;

    println!("Initializing tripweave database...");

    pool::ensure_database_exists(&resolved.db_config).await?;
    let db_pool = pool::create_pool(&resolved.db_config).await?;
    pool::run_migrations(&db_pool).await?;

    let counts = pool::table_counts(&db_pool).await?;
    println!("Database ready. Tables:");
    for (table, count) in &counts {
        println!("  {table}: {count} rows");
    }

    db_pool.close().await;

    println!("tripweave db-init complete.");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { db_url, force } => {
            cmd_init(&db_url, force)?;
        }
        Commands::DbInit => {
            cmd_db_init(cli.database_url.as_deref()).await?;
        }
        Commands::Serve {
            bind,
            port,
            memory_store,
        } => {
            let resolved = TripweaveConfig::resolve(cli.database_url.as_deref())?;
            let mut server = resolved.server.clone();
            if let Some(bind) = bind {
                server.bind = bind;
            }
            if let Some(port) = port {
                server.port = port;
            }
            serve_cmd::run_serve(&resolved, &server, memory_store).await?;
        }
    }

    Ok(())
}

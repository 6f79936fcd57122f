use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "sw")]
#[command(about = "Stream mirror operator CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> env -> override)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Fetch and classify the current live streams, one JSON line each
    Fetch {
        /// Layered config paths in merge order
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,
    },

    /// Rebuild tracked state from a channel and print it
    Inspect {
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        /// Channel id to read
        #[arg(long)]
        channel: String,
    },

    /// Post one live card for the most-watched stream
    Post {
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        /// Channel id to post into
        #[arg(long)]
        channel: String,

        /// Post a fixed placeholder stream instead of fetching
        #[arg(long, default_value_t = false)]
        stub: bool,
    },

    /// Look up a category by id or name
    Game {
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        #[arg(long, conflicts_with = "name", required_unless_present = "name")]
        id: Option<String>,

        #[arg(long)]
        name: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Silent if the file does not exist.
    let _ = dotenvy::from_filename(".env.local");
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::ConfigHash { paths } => {
            let loaded = commands::load(&paths)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Fetch { config_paths } => commands::feed::fetch(&config_paths).await?,

        Commands::Inspect {
            config_paths,
            channel,
        } => commands::channel::inspect(&config_paths, &channel).await?,

        Commands::Post {
            config_paths,
            channel,
            stub,
        } => commands::channel::post(&config_paths, &channel, stub).await?,

        Commands::Game {
            config_paths,
            id,
            name,
        } => {
            let query = match (id, name) {
                (Some(id), _) => sw_feed::GameQuery::Id(id),
                (None, Some(name)) => sw_feed::GameQuery::Name(name),
                (None, None) => anyhow::bail!("one of --id or --name is required"),
            };
            commands::feed::game(&config_paths, &query).await?;
        }
    }

    Ok(())
}

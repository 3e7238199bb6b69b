use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use mastodon_to_bluesky::bluesky::client::BlueskyClient;
use mastodon_to_bluesky::bluesky::traits::DestinationClient;
use mastodon_to_bluesky::config::{self, FileConfig, Overrides};
use mastodon_to_bluesky::error::FatalError;
use mastodon_to_bluesky::mastodon::client::MastodonClient;
use mastodon_to_bluesky::mastodon::traits::{FetchOptions, SourceClient};
use mastodon_to_bluesky::models::TimeWindow;
use mastodon_to_bluesky::output::terminal;
use mastodon_to_bluesky::pipeline::state::StateStore;
use mastodon_to_bluesky::pipeline::transfer::{Transfer, TransferOptions};
use mastodon_to_bluesky::status;

/// Transfer posts from Mastodon to Bluesky.
///
/// Long posts become threads, images come along, and a state file makes
/// repeated runs pick up where the last one stopped.
#[derive(Parser)]
#[command(name = "mastodon-to-bluesky", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Transfer posts from Mastodon to Bluesky
    Transfer(TransferArgs),

    /// Test the Mastodon connection and list recent posts
    TestMastodon {
        /// Mastodon instance URL (e.g. https://mastodon.social)
        #[arg(long)]
        instance: String,

        /// Mastodon access token
        #[arg(long)]
        token: String,

        /// Maximum number of posts to fetch
        #[arg(long, default_value = "10")]
        limit: usize,

        /// Include replies in the output
        #[arg(long)]
        include_replies: bool,

        /// Include boosts/reblogs in the output
        #[arg(long)]
        include_boosts: bool,
    },

    /// Show what the state file says has been transferred
    Status {
        /// File the transfer state is stored in
        #[arg(long, default_value = config::DEFAULT_STATE_FILE)]
        state_file: PathBuf,
    },
}

#[derive(Args)]
struct TransferArgs {
    /// Mastodon instance URL [env: MASTODON_INSTANCE]
    #[arg(long)]
    mastodon_instance: Option<String>,

    /// Mastodon access token [env: MASTODON_TOKEN]
    #[arg(long)]
    mastodon_token: Option<String>,

    /// Bluesky handle, e.g. user.bsky.social [env: BLUESKY_HANDLE]
    #[arg(long)]
    bluesky_handle: Option<String>,

    /// Bluesky app password [env: BLUESKY_PASSWORD]
    #[arg(long)]
    bluesky_password: Option<String>,

    /// Maximum number of posts to transfer (the newest ones)
    #[arg(long)]
    limit: Option<usize>,

    /// Only transfer posts from this date on (YYYY-MM-DD, UTC)
    #[arg(long)]
    since: Option<NaiveDate>,

    /// Only transfer posts up to and including this date (YYYY-MM-DD, UTC)
    #[arg(long)]
    until: Option<NaiveDate>,

    /// Preview what would be transferred without doing it
    #[arg(long)]
    dry_run: bool,

    /// Transfer posts again even if the state file says they were sent
    #[arg(long)]
    no_skip_existing: bool,

    /// Include replies in the transfer
    #[arg(long)]
    include_replies: bool,

    /// Include boosts/reblogs in the transfer
    #[arg(long)]
    include_boosts: bool,

    /// File to store transfer state in
    #[arg(long, default_value = config::DEFAULT_STATE_FILE)]
    state_file: PathBuf,

    /// Config file (defaults to ~/.config/mastodon-to-bluesky/config.json)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    // Logs go to stderr so they don't interleave with the progress bar
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("mastodon_to_bluesky=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // State is persisted after every committed post, so dropping the run
    // future on Ctrl-C leaves a consistent state file behind.
    let result = tokio::select! {
        result = run(cli) => result,
        _ = tokio::signal::ctrl_c() => Err(FatalError::Interrupted),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(FatalError::Interrupted) => {
            eprintln!("\n{}", "Transfer interrupted by user".yellow());
            ExitCode::from(FatalError::Interrupted.exit_code())
        }
        Err(e) => {
            eprintln!("\n{} {e:#}", "Error:".red());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(cli: Cli) -> Result<(), FatalError> {
    match cli.command {
        Commands::Transfer(args) => transfer(args).await,

        Commands::TestMastodon {
            instance,
            token,
            limit,
            include_replies,
            include_boosts,
        } => test_mastodon(&instance, &token, limit, include_replies, include_boosts).await,

        Commands::Status { state_file } => {
            let store = StateStore::load(state_file, true);
            status::show(&store);
            Ok(())
        }
    }
}

async fn transfer(args: TransferArgs) -> Result<(), FatalError> {
    let config_path = args.config.clone().unwrap_or_else(config::default_config_path);
    let file_config = FileConfig::load(&config_path)?;
    let env: HashMap<String, String> = std::env::vars().collect();

    let credentials = config::resolve_config(file_config, &env)
        .with_overrides(Overrides {
            mastodon_instance: args.mastodon_instance,
            mastodon_token: args.mastodon_token,
            bluesky_handle: args.bluesky_handle,
            bluesky_password: args.bluesky_password,
        })
        .require_credentials()?;

    println!(
        "{} {}",
        "Connecting to Mastodon instance:".bold(),
        credentials.mastodon_instance
    );
    let mastodon = MastodonClient::new(&credentials.mastodon_instance, &credentials.mastodon_token)?;

    println!(
        "{} {}",
        "Connecting to Bluesky as:".bold(),
        credentials.bluesky_handle
    );
    let bluesky = BlueskyClient::new(
        &credentials.bluesky_service,
        &credentials.bluesky_handle,
        &credentials.bluesky_password,
    )?;

    let account = mastodon
        .authenticate()
        .await
        .map_err(|source| FatalError::Auth {
            service: "Mastodon",
            source,
        })?;
    println!("  Authenticated with Mastodon as @{}", account.acct);

    let session = bluesky
        .authenticate()
        .await
        .map_err(|source| FatalError::Auth {
            service: "Bluesky",
            source,
        })?;
    println!("  Authenticated with Bluesky as @{}", session.handle);

    let mut store = StateStore::load(args.state_file, args.dry_run);
    if let Some(warning) = store.load_warning() {
        println!("{} {}", "Warning:".yellow(), warning);
    }
    info!(
        path = %store.path().display(),
        already_transferred = store.state().transferred_ids.len(),
        "Transfer state loaded"
    );

    let options = TransferOptions {
        limit: args.limit,
        window: day_window(args.since, args.until),
        skip_existing: !args.no_skip_existing,
        include_replies: args.include_replies,
        include_boosts: args.include_boosts,
        dry_run: args.dry_run,
        show_progress: true,
    };

    println!("\n{}", "Fetching posts from Mastodon...".bold());
    let stats = Transfer::new(&mastodon, &bluesky, &mut store)
        .run(&options)
        .await?;

    if stats.processed == 0 {
        println!("{}", "No posts found matching criteria".yellow());
    }
    terminal::display_summary(&stats, args.dry_run);
    Ok(())
}

async fn test_mastodon(
    instance: &str,
    token: &str,
    limit: usize,
    include_replies: bool,
    include_boosts: bool,
) -> Result<(), FatalError> {
    println!("{}", "Testing Mastodon API connection...".bold());
    println!("Instance: {instance}");

    let client = MastodonClient::new(instance, token)?;
    let account = client
        .authenticate()
        .await
        .map_err(|source| FatalError::Auth {
            service: "Mastodon",
            source,
        })?;
    println!("Authenticated as @{}", account.username);

    println!("\n{}", format!("Fetching up to {limit} posts...").bold());
    let posts = client
        .fetch_posts(&FetchOptions {
            limit: Some(limit),
            window: TimeWindow::default(),
            include_replies,
            include_boosts,
        })
        .await?;

    if posts.is_empty() {
        println!("{}", "No posts found".yellow());
        return Ok(());
    }

    println!("{}\n", format!("Found {} posts", posts.len()).green());
    terminal::display_posts_table(&posts);
    Ok(())
}

/// Whole-day window: `since` from the start of its day, `until` through the
/// end of its day, both UTC.
fn day_window(since: Option<NaiveDate>, until: Option<NaiveDate>) -> TimeWindow {
    TimeWindow {
        since: since
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc()),
        until: until
            .and_then(|d| d.and_hms_nano_opt(23, 59, 59, 999_999_999))
            .map(|dt| dt.and_utc()),
    }
}

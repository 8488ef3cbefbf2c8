//! Kraken CLI
//!
//! Terminal front end for Kraken:
//! - Connect a wallet and sign in
//! - Browse and send messages, follow a conversation live
//! - Watch the market overview and price charts
//! - View, edit and search profiles

use chrono::Utc;
use clap::{Parser, Subcommand};
use kraken::app::{App, AppError, AppResult};
use kraken::attachments::FileUpload;
use kraken::config::{generate_default_config, Config, LoggingConfig};
use kraken::market::{Timeframe, DEFAULT_ASSET};
use kraken::messaging::{filter_by_participant, other_participant_label, Draft};
use kraken::profiles::ProfileEdit;
use kraken::views::{self, home, login, messages, profile, search, wallet, Route};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "kraken")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Secure decentralized messaging, powered by your wallet")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: {config_dir}/kraken/config.toml, then ./kraken.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Connect a wallet and sign in
    Login {
        /// Use this address instead of asking the wallet
        #[arg(long)]
        address: Option<String>,
    },

    /// Sign out and forget the connected wallet
    Logout,

    /// Show connection status
    Status,

    /// Show the home feed
    Home,

    /// List conversations
    Messages {
        /// Only conversations with a participant containing this text
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Show a conversation
    Open {
        conversation_id: String,
        /// Keep running and print new messages as they arrive
        #[arg(short, long)]
        follow: bool,
    },

    /// Start (or reopen) a direct conversation
    New {
        /// Recipient wallet address
        address: String,
    },

    /// Send a message
    Send {
        conversation_id: String,
        /// Message text
        text: Option<String>,
        /// Attach a file
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Market overview and price chart
    Wallet {
        /// Asset id for the chart
        #[arg(short, long, default_value = DEFAULT_ASSET)]
        asset: String,
        /// Chart timeframe (24h, 7d, 30d, 1y)
        #[arg(short, long, default_value = "24h")]
        timeframe: Timeframe,
        /// Re-render on every market poll
        #[arg(short, long)]
        watch: bool,
    },

    /// Show or edit your profile
    Profile {
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        bio: Option<String>,
        /// Image file for the avatar
        #[arg(long)]
        avatar: Option<PathBuf>,
    },

    /// Find profiles by address or username
    Search { query: String },

    /// Print a default config file
    Config {
        /// Write to this path instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

impl Commands {
    /// Page a command renders, if it is guarded
    fn route(&self) -> Option<Route> {
        match self {
            Commands::Login { .. } => Some(Route::Login),
            Commands::Home => Some(Route::Home),
            Commands::Messages { .. }
            | Commands::Open { .. }
            | Commands::New { .. }
            | Commands::Send { .. } => Some(Route::Messages),
            Commands::Wallet { .. } => Some(Route::Wallet),
            Commands::Profile { .. } => Some(Route::Profile),
            Commands::Search { .. } => Some(Route::Search),
            Commands::Logout | Commands::Status | Commands::Config { .. } => None,
        }
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("kraken={}", logging.level)));
    let registry = tracing_subscriber::registry().with(filter);

    // stdout carries the pages
    if logging.format.eq_ignore_ascii_case("json") {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    init_tracing(&config.logging);

    if let Commands::Config { output } = &cli.command {
        let content = generate_default_config();
        match output {
            Some(path) => {
                std::fs::write(path, content)?;
                println!("Wrote default config to {}", path.display());
            }
            None => print!("{}", content),
        }
        return Ok(());
    }

    if let Err(e) = run(cli.command, config).await {
        tracing::error!("{}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
    Ok(())
}

async fn run(command: Commands, config: Config) -> AppResult<()> {
    let mut app = App::from_config(config).await?;

    if let Some(requested) = command.route() {
        if requested != Route::Login && app.route(requested) == Route::Login {
            print!("{}", login::render_login());
            return Err(AppError::NotSignedIn);
        }
    }

    let result = dispatch(&mut app, command).await;
    app.sync_auth()?;
    result
}

async fn dispatch(app: &mut App, command: Commands) -> AppResult<()> {
    match command {
        Commands::Login { address } => cmd_login(app, address).await,
        Commands::Logout => {
            app.logout().await?;
            println!("Logged out");
            Ok(())
        }
        Commands::Status => cmd_status(app),
        Commands::Home => {
            let me = app.identity()?;
            print!("{}", views::nav_bar(Route::Home, &me.address));
            print!("{}", home::render_home(&me.address));
            Ok(())
        }
        Commands::Messages { search } => cmd_messages(app, search.as_deref()).await,
        Commands::Open {
            conversation_id,
            follow,
        } => cmd_open(app, &conversation_id, follow).await,
        Commands::New { address } => cmd_new(app, &address).await,
        Commands::Send {
            conversation_id,
            text,
            file,
        } => cmd_send(app, &conversation_id, text, file).await,
        Commands::Wallet {
            asset,
            timeframe,
            watch,
        } => cmd_wallet(app, &asset, timeframe, watch).await,
        Commands::Profile {
            username,
            bio,
            avatar,
        } => cmd_profile(app, username, bio, avatar).await,
        Commands::Search { query } => cmd_search(app, &query).await,
        // Handled before the app is built
        Commands::Config { .. } => Ok(()),
    }
}

async fn cmd_login(app: &mut App, address: Option<String>) -> AppResult<()> {
    if app.route(Route::Login) == Route::Home {
        let me = app.identity()?;
        println!("Already connected as {}", me.address);
        print!("{}", views::nav_bar(Route::Home, &me.address));
        print!("{}", home::render_home(&me.address));
        return Ok(());
    }

    print!("{}", login::render_login());
    match app.login(address.as_deref()).await {
        Ok(identity) => {
            println!("\nConnected as {}", identity.address);
            print!("{}", views::nav_bar(Route::Home, &identity.address));
            print!("{}", home::render_home(&identity.address));
            Ok(())
        }
        Err(e) => {
            eprint!("{}", login::render_login_error(&e.to_string()));
            Err(e)
        }
    }
}

fn cmd_status(app: &App) -> AppResult<()> {
    match app.auth().identity() {
        Some(identity) => {
            println!("Connected as {} ({})", identity.address, identity.address.short());
            println!("Backend user: {}", identity.session.user.id);
        }
        None => println!("Not connected"),
    }
    println!("Backend: {}", app.backend().config().url);
    println!("Price API: {}", app.config().market.url);
    println!("Data directory: {}", app.config().storage.data_dir);
    Ok(())
}

async fn cmd_messages(app: &App, search: Option<&str>) -> AppResult<()> {
    let me = app.identity()?.address.clone();
    let conversations = app.conversations().list_for(&me).await?;
    let visible = filter_by_participant(&conversations, search.unwrap_or(""));

    print!("{}", views::nav_bar(Route::Messages, &me));
    print!("{}", messages::render_conversation_list(&visible, &me, Utc::now()));
    Ok(())
}

async fn cmd_open(app: &mut App, conversation_id: &str, follow: bool) -> AppResult<()> {
    let me = app.identity()?.address.clone();
    let conversation = app
        .conversations()
        .list_for(&me)
        .await?
        .into_iter()
        .find(|c| c.id == conversation_id)
        .ok_or_else(|| AppError::UnknownConversation(conversation_id.to_string()))?;

    print!("{}", views::nav_bar(Route::Messages, &me));
    if !follow {
        let thread = app.messages().list_messages(conversation_id).await?;
        print!(
            "{}",
            messages::render_thread(&conversation, &thread, &me, app.messages().attachments(), Utc::now())
        );
        return Ok(());
    }

    let mut live = app.live_conversation(conversation_id).await?;
    print!(
        "{}",
        messages::render_thread(&conversation, &live.snapshot(), &me, app.messages().attachments(), Utc::now())
    );
    println!("(following, Ctrl-C to stop)");

    loop {
        tokio::select! {
            update = live.changed() => {
                let Some(thread) = update else { break };
                println!("{}", "─".repeat(60));
                print!(
                    "{}",
                    messages::render_thread(&conversation, &thread, &me, app.messages().attachments(), Utc::now())
                );
                app.sync_auth()?;
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}

async fn cmd_new(app: &App, address: &str) -> AppResult<()> {
    let me = app.identity()?.address.clone();
    let conversation = app
        .conversations()
        .find_or_create_direct(&me, address)
        .await?;
    println!(
        "Conversation with {}: {}",
        other_participant_label(&conversation, &me),
        conversation.id
    );
    println!("Send a message with `kraken send {} <text>`", conversation.id);
    Ok(())
}

async fn cmd_send(
    app: &App,
    conversation_id: &str,
    text: Option<String>,
    file: Option<PathBuf>,
) -> AppResult<()> {
    let me = app.identity()?.address.clone();
    let mut draft = Draft::text(text.unwrap_or_default());
    if let Some(path) = file {
        draft = draft.with_file(FileUpload::from_path(&path).await?);
    }

    let sent = app
        .messages()
        .send_message(conversation_id, &me, draft)
        .await?;
    println!("Sent: {}", sent.content);
    Ok(())
}

async fn cmd_wallet(app: &App, asset: &str, timeframe: Timeframe, watch: bool) -> AppResult<()> {
    let me = app.identity()?.address.clone();
    let mut watcher = app.market_watcher();
    let mut chart = app.price_chart();
    let chart_result = chart.select(asset, timeframe).await;

    let wait = Duration::from_secs(app.config().market.request_timeout_secs + 1);
    let _ = tokio::time::timeout(wait, watcher.changed()).await;

    let render = |assets: &[kraken::market::Asset], chart: &kraken::market::PriceChart| {
        let mut page = views::nav_bar(Route::Wallet, &me);
        page.push_str(&wallet::render_market_table(assets));
        page.push('\n');
        page.push_str(&wallet::render_chart(chart.asset(), chart.timeframe(), chart.series()));
        page
    };
    print!("{}", render(&watcher.latest()[..], &chart));

    if !watch {
        return chart_result.map_err(AppError::from);
    }
    if let Err(e) = chart_result {
        eprintln!("Chart unavailable: {}", e);
    }

    loop {
        tokio::select! {
            update = watcher.changed() => {
                let Some(assets) = update else { break };
                println!();
                print!("{}", render(&assets[..], &chart));
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}

async fn cmd_profile(
    app: &App,
    username: Option<String>,
    bio: Option<String>,
    avatar: Option<PathBuf>,
) -> AppResult<()> {
    let me = app.identity()?.address.clone();
    let mut current = app.profiles().load_or_create(&me).await?;

    if username.is_some() || bio.is_some() || avatar.is_some() {
        let mut edit = ProfileEdit::from(&current);
        if let Some(username) = username {
            edit.username = username;
        }
        if let Some(bio) = bio {
            edit.bio = bio;
        }
        let avatar = match avatar {
            Some(path) => Some(FileUpload::from_path(&path).await?),
            None => None,
        };
        current = app.profiles().save(&me, edit, avatar.as_ref()).await?;
        println!("Profile saved");
    }

    print!("{}", views::nav_bar(Route::Profile, &me));
    print!("{}", profile::render_profile(&current));
    Ok(())
}

async fn cmd_search(app: &App, query: &str) -> AppResult<()> {
    let me = app.identity()?.address.clone();
    let results = app.profiles().search(query).await?;
    print!("{}", views::nav_bar(Route::Search, &me));
    print!("{}", search::render_search_results(query, &results));
    Ok(())
}

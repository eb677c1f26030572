mod api;
mod bridge;
mod browse;
mod commands;
mod mpv;
mod notify;
mod player;
mod search;
mod theme;
mod widgets;

use clap::{Parser, Subcommand};
use rt_proto::config::Config;
use rt_proto::state::FileStore;

use crate::api::ApiClient;
use crate::mpv::MpvBridge;
use crate::notify::{Launch, Notifier, Severity, TerminalNotifier};
use crate::player::Player;

#[derive(Parser, Debug)]
#[command(name = "rt", version, about = "Browse Radio-T episodes and control playback")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Pause when playing, resume otherwise
    Toggle {
        /// Invoked by a hotkey or script rather than by hand
        #[arg(long)]
        background: bool,
    },
    /// Stop playback and forget the current stream
    Stop {
        #[arg(long)]
        background: bool,
    },
    /// Join the live show if it is on air
    Live,
    /// Interactive episode browser
    Browse,
    /// Show playback and live status
    Status,
    /// Print the latest episodes, or those matching QUERY
    Episodes {
        query: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
    },
}

fn init_logging() -> anyhow::Result<()> {
    let data_dir = rt_proto::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(data_dir.join("rt.log"))?;

    // RUST_LOG wins; HTTP client internals are noisy at debug
    let log_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "info,rt=debug,rt_proto=debug,hyper_util=warn,reqwest=warn,hyper=warn".to_string());
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(log_filter.as_str())
        .with_ansi(false)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging()?;
    tracing::info!("rt {:?}", cli.command);

    let config = Config::load().unwrap_or_else(|e| {
        tracing::warn!("config unreadable, using defaults: {:#}", e);
        Config::default()
    });
    let api = ApiClient::new(&config.api)?;
    let now = chrono::Utc::now();

    let player = |launch: Launch| {
        Player::new(
            MpvBridge::new(config.mpv.default_volume),
            FileStore::open(config.daemon.state_file.clone()),
            TerminalNotifier,
            launch,
            config.live.stream_url.clone(),
        )
    };

    match cli.command {
        Command::Toggle { background } => {
            commands::toggle(&player(Launch::from_background_flag(background))).await;
        }
        Command::Stop { background } => {
            commands::stop(&player(Launch::from_background_flag(background))).await;
        }
        Command::Live => {
            commands::live(&player(Launch::UserInitiated), &api, &config.live, now).await;
        }
        Command::Browse => {
            let bridge = MpvBridge::new(config.mpv.default_volume);
            let store = FileStore::open(config.daemon.state_file.clone());
            browse::run(bridge, store, api, config.live.stream_url.clone()).await?;
        }
        Command::Status => {
            let p = player(Launch::UserInitiated);
            commands::status(&p, &api, &config.live, now, &mut std::io::stdout()).await?;
        }
        Command::Episodes { query, limit } => {
            let notifier = TerminalNotifier;
            let result = commands::episodes(&api, &notifier, query.as_deref(), limit, &mut std::io::stdout()).await;
            if let Err(e) = result {
                notifier.toast(&format!("Failed to print episodes: {}", e), Severity::Failure);
            }
        }
    }
    Ok(())
}

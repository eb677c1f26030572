//! One-shot command entry points.  Each loads the persisted state, runs to
//! completion and turns every failure into a notification.

use std::io::Write;

use chrono::{DateTime, Utc};
use rt_proto::config::LiveConfig;
use rt_proto::live::{format_show_time, next_show_after, LiveStatus};
use rt_proto::state::Storage;
use tracing::{info, warn};

use crate::api::ApiClient;
use crate::bridge::{Bridge, BridgeError};
use crate::notify::{Notifier, Severity};
use crate::player::Player;
use crate::search::{EpisodeRow, EPISODE_LIMIT};

pub const LIVE_STARTED: &str = "Now streaming Radio-T live";
pub const LIVE_FAILED: &str = "Failed to start live stream";
pub const LIVE_CHECK_FAILED: &str = "Error: failed to check show status";

pub async fn toggle<B: Bridge, S: Storage, N: Notifier>(player: &Player<B, S, N>) -> bool {
    let mut state = player.load_state();
    player.toggle(&mut state).await
}

pub async fn stop<B: Bridge, S: Storage, N: Notifier>(player: &Player<B, S, N>) {
    let mut state = player.load_state();
    let had_stream = state.stream_id.is_some();
    player.stop(&mut state).await;
    if had_stream && player.launch().is_user() {
        player.notifier().toast("Stopped playing", Severity::Success);
    }
}

async fn fetch_live_status(api: &ApiClient, live: &LiveConfig, now: DateTime<Utc>) -> anyhow::Result<LiveStatus> {
    let show = api.show_start().await?;
    Ok(LiveStatus::from_show_start(&show, now, live.window_minutes)?)
}

fn not_live_message(live: &LiveConfig, now: DateTime<Utc>) -> String {
    let next = next_show_after(now, live.schedule());
    format!("Radio-T is not live. Next show: {}", format_show_time(next))
}

/// Check the show status and join the live stream when it is on air.
pub async fn live<B: Bridge, S: Storage, N: Notifier>(
    player: &Player<B, S, N>,
    api: &ApiClient,
    live: &LiveConfig,
    now: DateTime<Utc>,
) {
    let status = match fetch_live_status(api, live, now).await {
        Ok(status) => status,
        Err(e) => {
            warn!("live: show status unavailable: {:#}", e);
            player.notifier().hud(LIVE_CHECK_FAILED);
            return;
        }
    };
    info!(
        "live: started {} ({:.1} min ago), live={}",
        status.started_at, status.minutes_since_start, status.is_live
    );

    if !status.is_live {
        player.notifier().hud(&not_live_message(live, now));
        return;
    }

    let mut state = player.load_state();
    match player.join_live(&mut state).await {
        Ok(_) => {
            player.play(&mut state).await;
            player.notifier().hud(LIVE_STARTED);
        }
        Err(BridgeError::Unavailable(e)) => {
            warn!("live: {}", e);
            player.notifier().hud("Error: media player not found");
        }
        Err(e) => {
            warn!("live: {}", e);
            player.notifier().hud(LIVE_FAILED);
        }
    }
}

/// Print playback and show status.  News is only fetched while live.
pub async fn status<B: Bridge, S: Storage, N: Notifier>(
    player: &Player<B, S, N>,
    api: &ApiClient,
    live: &LiveConfig,
    now: DateTime<Utc>,
    out: &mut impl Write,
) -> std::io::Result<()> {
    let mut state = player.load_state();
    player.reconcile(&mut state).await;
    writeln!(out, "{}", state.describe())?;

    let status = match fetch_live_status(api, live, now).await {
        Ok(status) => status,
        Err(e) => {
            warn!("status: show status unavailable: {:#}", e);
            writeln!(out, "Show status unavailable")?;
            return Ok(());
        }
    };
    if !status.is_live {
        writeln!(out, "{}", not_live_message(live, now))?;
        return Ok(());
    }

    writeln!(
        out,
        "Radio-T is live, started {:.0} min ago",
        status.minutes_since_start
    )?;
    match api.active_news().await {
        Ok(Some(article)) if !article.title.is_empty() => {
            writeln!(out, "Discussing: {}", article.title)?;
            if !article.link.is_empty() {
                writeln!(out, "  {}", article.link)?;
            }
        }
        Ok(_) => {}
        Err(e) => warn!("status: active news unavailable: {}", e),
    }
    Ok(())
}

/// Print the latest or matching episodes with their topic offsets.
pub async fn episodes(
    api: &ApiClient,
    notifier: &impl Notifier,
    query: Option<&str>,
    limit: Option<usize>,
    out: &mut impl Write,
) -> std::io::Result<()> {
    let limit = limit.unwrap_or(EPISODE_LIMIT);
    let query = query.map(str::trim).unwrap_or_default();
    let result = if query.is_empty() {
        api.latest_episodes(limit).await
    } else {
        api.search_episodes(query, limit).await
    };
    let episodes = match result {
        Ok(episodes) => episodes,
        Err(e) => {
            warn!("episodes: {}", e);
            notifier.toast(&format!("Failed to load episodes: {}", e), Severity::Failure);
            return Ok(());
        }
    };
    if episodes.is_empty() {
        writeln!(out, "No episodes found")?;
        return Ok(());
    }
    for episode in &episodes {
        let row = EpisodeRow::from(episode);
        writeln!(out, "{}  {}", row.title, row.date)?;
        for topic in &row.topics {
            writeln!(out, "  {}  {}", topic.offset, topic.title)?;
        }
    }
    Ok(())
}

//! eplace: terminal client for a collaborative pixel canvas.
//!
//! Loads a room over HTTP, follows its canvas and chat streams over a
//! WebSocket, and optionally places one pixel or sends one chat message.
//! Configuration comes from `.env`, the environment and flags, in that
//! order of increasing precedence.

use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use log::{debug, info, warn};

use eplace_collab::config::{API_URL_ENV, ROOM_ENV, WS_URL_ENV};
use eplace_collab::{
    ClientConfig, ClientUpdate, EnvAuth, HttpRoomLoader, RoomLoader, RoomSession,
};
use eplace_core::Damage;

const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(30);

#[derive(Parser, Debug)]
#[command(name = "eplace")]
#[command(about = "Follow and paint an eplace room from the terminal")]
struct Cli {
    /// REST API base URL
    #[arg(long, env = "EPLACE_API_URL")]
    api_url: Option<String>,

    /// WebSocket URL (defaults to the API URL with a ws scheme)
    #[arg(long, env = "EPLACE_WS_URL")]
    ws_url: Option<String>,

    /// Room slug
    #[arg(short, long, env = "EPLACE_ROOM")]
    room: Option<String>,

    /// Place one pixel: X Y COLOR (needs EPLACE_TOKEN)
    #[arg(long, num_args = 3, value_names = ["X", "Y", "COLOR"], allow_negative_numbers = true)]
    place: Option<Vec<i64>>,

    /// Send one chat message (needs EPLACE_TOKEN)
    #[arg(long)]
    chat: Option<String>,

    /// Exit after the placement or message is sent instead of following
    /// the room
    #[arg(long)]
    once: bool,
}

impl Cli {
    fn client_config(&self) -> anyhow::Result<ClientConfig> {
        let config = ClientConfig::from_lookup(|key| match key {
            API_URL_ENV => self.api_url.clone(),
            WS_URL_ENV => self.ws_url.clone(),
            ROOM_ENV => self.room.clone(),
            _ => None,
        })?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional; a missing file is not an error.
    let _ = dotenvy::dotenv();
    env_logger::init();

    let cli = Cli::parse();
    let config = cli.client_config()?;
    info!("Starting eplace for room '{}' at {}", config.room_slug, config.api_url);

    let loader = HttpRoomLoader::new(config.api_url.clone());
    let snapshot = loader
        .load(&config.room_slug)
        .await
        .with_context(|| format!("loading room '{}'", config.room_slug))?;

    let mut session = RoomSession::from_config(&config, EnvAuth::default(), (1280.0, 720.0));
    session
        .connect()
        .await
        .with_context(|| format!("connecting to {}", config.ws_url))?;
    let report = session.enter_room(snapshot)?;
    info!(
        "Room '{}' ready: {} cells",
        session.room_name().unwrap_or(&config.room_slug),
        report.cells
    );

    if let Some(args) = cli.place.as_deref() {
        let [x, y, color] = args else {
            anyhow::bail!("--place takes exactly three numbers");
        };
        session.select(*x, *y);
        if session.viewport().target().is_none() {
            anyhow::bail!("({x}, {y}) is outside the canvas");
        }
        let placed = session.place(*color)?;
        info!("Placement sent: ({}, {}) = {}", placed.pos_x, placed.pos_y, placed.color);
    }
    if let Some(message) = cli.chat.as_deref() {
        session.send_chat(message)?;
        info!("Chat message sent");
    }
    if cli.once {
        return Ok(());
    }

    follow(&mut session).await
}

async fn follow<C, A>(session: &mut RoomSession<C, A>) -> anyhow::Result<()>
where
    C: eplace_collab::Connector,
    A: eplace_collab::AuthProvider,
{
    let mut delay = Duration::from_secs(1);
    loop {
        let next = tokio::select! {
            next = session.next_update() => Some(next),
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(next) = next else {
            info!("Interrupted; leaving room");
            session.leave_room();
            session.disconnect();
            return Ok(());
        };

        let Some(updates) = next else {
            // Capped exponential backoff.
            tokio::time::sleep(delay).await;
            match session.connect().await {
                Ok(()) => {
                    info!("Reconnected");
                    delay = Duration::from_secs(1);
                }
                Err(e) => {
                    warn!("Reconnect failed: {e}; retrying in {delay:?}");
                    delay = (delay * 2).min(MAX_RECONNECT_DELAY);
                }
            }
            continue;
        };

        for update in updates {
            match update {
                ClientUpdate::CellChanged { pos, color, .. } => {
                    info!("({}, {}) -> {color}", pos.x, pos.y)
                }
                ClientUpdate::Chat(msg) => info!(
                    "[{}] {}",
                    msg.author_uid.as_deref().unwrap_or("anonymous"),
                    msg.content
                ),
                ClientUpdate::SubscriptionFailed { topic, error } => {
                    warn!("{topic} failed: {error}")
                }
                ClientUpdate::Disconnected { reason } => {
                    warn!("Disconnected ({})", reason.as_deref().unwrap_or("no reason"))
                }
                ClientUpdate::Tooltip(_) => {}
            }
        }
        // No renderer; report and discard damage.
        match session.take_damage() {
            Damage::None => {}
            Damage::Full => debug!("Full redraw pending"),
            Damage::Cells(cells) => debug!("{} cells repainted", cells.len()),
        }
    }
}

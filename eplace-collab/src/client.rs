//! Room session: one room's canvas, viewport and live streams.
//!
//! Provides:
//! - Room entry/exit with subscription setup and teardown
//! - Inbound pixel updates applied to the grid, with live tooltip refresh
//! - Gesture entry points that keep the tooltip consistent with the view
//! - Pixel placement gated by the auth collaborator
//!
//! Placement never writes the grid locally. The canvas stream echo is the
//! only path by which a placement reaches the local buffer, including the
//! placing client's own.

use std::fmt;

use thiserror::Error;
use tokio::sync::mpsc;

use eplace_core::{
    CellPos, Clock, ColorIndex, Damage, GridError, GridStore, LoadReport, PaletteError,
    ScreenPoint, SystemClock, ViewportController, ViewportEvent,
};

use crate::auth::AuthProvider;
use crate::config::ClientConfig;
use crate::loader::{LoaderError, RoomSnapshot};
use crate::protocol::{ChatMessage, OutboundFrame, PixelUpdate, RemoteError, SubscriptionId, Topic};
use crate::registry::{Delivery, DispatchOutcome, SubscriptionRegistry};
use crate::transport::{
    ConnectionState, Connector, SessionEvent, TransportError, TransportSession, WsConnector,
};

#[derive(Error, Debug)]
pub enum RoomError {
    #[error(transparent)]
    Snapshot(#[from] LoaderError),
    #[error("Invalid room palette: {0}")]
    Palette(#[from] PaletteError),
    #[error(transparent)]
    Grid(#[from] GridError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaceError {
    #[error("No room is open")]
    NoRoom,
    #[error("No cell is selected")]
    NoTarget,
    #[error("Color {index} is not in the palette ({len} colors)")]
    InvalidColor { index: i64, len: usize },
    #[error("Sign in to place pixels")]
    AuthRequired,
    #[error("Not connected to the room authority")]
    NotConnected,
}

/// Tooltip content for the selected cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inspection {
    pub pos: CellPos,
    pub color: ColorIndex,
    /// Palette string as the room declared it.
    pub hex: String,
}

impl fmt::Display for Inspection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}) color {} {}",
            self.pos.x, self.pos.y, self.color, self.hex
        )
    }
}

/// What a placement would send for the current selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacementData {
    pub color: ColorIndex,
    pub pos_x: u32,
    pub pos_y: u32,
}

/// UI-facing consequences of input and inbound traffic.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientUpdate {
    CellChanged {
        pos: CellPos,
        color: ColorIndex,
        previous: ColorIndex,
    },
    /// `Some` shows or refreshes the tooltip; `None` hides it.
    Tooltip(Option<Inspection>),
    Chat(ChatMessage),
    SubscriptionFailed { topic: Topic, error: RemoteError },
    Disconnected { reason: Option<String> },
}

/// Decoded stream payloads, queued by subscription handlers.
#[derive(Debug)]
enum StreamEvent {
    Pixel(PixelUpdate),
    Chat(ChatMessage),
    Failed { topic: Topic, error: RemoteError },
}

#[derive(Debug)]
struct ActiveRoom {
    slug: String,
    name: String,
    subscriptions: Vec<SubscriptionId>,
}

pub struct RoomSession<C, A, K = SystemClock>
where
    C: Connector,
    A: AuthProvider,
    K: Clock,
{
    transport: TransportSession<C>,
    registry: SubscriptionRegistry,
    grid: GridStore,
    viewport: ViewportController<K>,
    auth: A,
    room: Option<ActiveRoom>,
    tooltip_open: bool,
    selected_color: ColorIndex,
    stream_tx: mpsc::UnboundedSender<StreamEvent>,
    stream_rx: mpsc::UnboundedReceiver<StreamEvent>,
}

impl<A: AuthProvider> RoomSession<WsConnector, A, SystemClock> {
    /// Session over a WebSocket to `config.ws_url`.
    pub fn from_config(config: &ClientConfig, auth: A, surface: (f64, f64)) -> Self {
        let transport = TransportSession::with_timeout(
            WsConnector::new(config.ws_url.clone()),
            config.connect_timeout,
        );
        Self::new(transport, auth, ViewportController::new(surface.0, surface.1))
    }
}

impl<C, A, K> RoomSession<C, A, K>
where
    C: Connector,
    A: AuthProvider,
    K: Clock,
{
    pub fn new(transport: TransportSession<C>, auth: A, viewport: ViewportController<K>) -> Self {
        let (stream_tx, stream_rx) = mpsc::unbounded_channel();
        Self {
            transport,
            registry: SubscriptionRegistry::new(),
            grid: GridStore::new(),
            viewport,
            auth,
            room: None,
            tooltip_open: false,
            selected_color: 0,
            stream_tx,
            stream_rx,
        }
    }

    // ── Accessors ─────────────────────────────────────

    pub fn connection_state(&self) -> ConnectionState {
        self.transport.state()
    }

    pub fn grid(&self) -> &GridStore {
        &self.grid
    }

    pub fn viewport(&self) -> &ViewportController<K> {
        &self.viewport
    }

    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    pub fn auth(&self) -> &A {
        &self.auth
    }

    pub fn room_slug(&self) -> Option<&str> {
        self.room.as_ref().map(|r| r.slug.as_str())
    }

    pub fn room_name(&self) -> Option<&str> {
        self.room.as_ref().map(|r| r.name.as_str())
    }

    pub fn is_tooltip_open(&self) -> bool {
        self.tooltip_open
    }

    /// Raster regions changed since the last call.
    pub fn take_damage(&mut self) -> Damage {
        self.grid.take_damage()
    }

    pub fn resize(&mut self, surface_width: f64, surface_height: f64) {
        self.viewport.resize(surface_width, surface_height);
    }

    // ── Connection ────────────────────────────────────

    /// Connect and replay every registered subscription before the session
    /// accepts new sends.
    pub async fn connect(&mut self) -> Result<(), TransportError> {
        let registry = &mut self.registry;
        self.transport
            .connect(|sink| {
                registry.resubscribe_all(sink);
            })
            .await
    }

    pub fn disconnect(&mut self) {
        self.transport.disconnect();
    }

    // ── Room lifecycle ────────────────────────────────

    /// Replace the current room with `snapshot`.
    ///
    /// Old subscriptions are stopped before the grid is replaced; new ones
    /// start only once the grid is ready.
    pub fn enter_room(&mut self, snapshot: RoomSnapshot) -> Result<LoadReport, RoomError> {
        snapshot.validate()?;
        let palette = snapshot.config.palette()?;
        self.leave_room();

        let side = snapshot.config.side();
        let report = self.grid.load(side, side, &snapshot.pixels, palette)?;
        self.viewport.reset(side, side);
        self.selected_color = 0;

        let mut subscriptions = Vec::with_capacity(Topic::ALL.len());
        for topic in Topic::ALL {
            let tx = self.stream_tx.clone();
            let subscribed = self.registry.subscribe(
                &mut self.transport,
                topic.path(),
                &snapshot.slug,
                move |delivery| forward(&tx, topic, delivery),
            );
            match subscribed {
                Ok(id) => subscriptions.push(id),
                Err(e) => log::error!("Could not subscribe to {topic}: {e}"),
            }
        }

        log::info!(
            "Entered room '{}' ({side}×{side}, {} colors)",
            snapshot.display_name(),
            self.grid.palette().map_or(0, |p| p.len())
        );
        self.room = Some(ActiveRoom {
            name: snapshot.display_name().to_string(),
            slug: snapshot.slug,
            subscriptions,
        });
        Ok(report)
    }

    /// Stop this room's streams and discard its grid.
    pub fn leave_room(&mut self) {
        if let Some(room) = self.room.take() {
            for id in &room.subscriptions {
                self.registry.unsubscribe(&mut self.transport, id);
            }
            log::info!("Left room '{}'", room.slug);
        }
        while self.stream_rx.try_recv().is_ok() {}
        self.grid.clear();
        self.viewport.reset(0, 0);
        self.tooltip_open = false;
    }

    // ── Inbound ───────────────────────────────────────

    /// Wait for the next inbound event and apply it.
    ///
    /// Returns `None` once there is no link to read from; call
    /// [`connect`](Self::connect) to resume.
    pub async fn next_update(&mut self) -> Option<Vec<ClientUpdate>> {
        let mut updates = Vec::new();
        match self.transport.next_event().await? {
            SessionEvent::Frame(frame) => {
                if let DispatchOutcome::Failed(error) = self.registry.dispatch(frame) {
                    if error.is_unauthorized() {
                        self.auth.on_unauthenticated();
                    }
                }
            }
            SessionEvent::Disconnected { reason } => {
                updates.push(ClientUpdate::Disconnected { reason });
            }
        }
        while let Ok(event) = self.stream_rx.try_recv() {
            self.apply_stream_event(event, &mut updates);
        }
        Some(updates)
    }

    fn apply_stream_event(&mut self, event: StreamEvent, updates: &mut Vec<ClientUpdate>) {
        match event {
            StreamEvent::Pixel(update) => {
                if let Some(change) = self.apply_pixel(&update) {
                    updates.push(change);
                    if let Some(tooltip) = self.refresh_tooltip_for(&update) {
                        updates.push(tooltip);
                    }
                }
            }
            StreamEvent::Chat(message) => updates.push(ClientUpdate::Chat(message)),
            StreamEvent::Failed { topic, error } => {
                updates.push(ClientUpdate::SubscriptionFailed { topic, error })
            }
        }
    }

    fn apply_pixel(&mut self, update: &PixelUpdate) -> Option<ClientUpdate> {
        let slug = self.room_slug()?;
        if !update.room_slug.is_empty() && update.room_slug != slug {
            log::debug!("Ignoring pixel for room '{}'", update.room_slug);
            return None;
        }
        let previous = self
            .grid
            .apply_cell(update.pos_x, update.pos_y, update.color)
            .ok()?;
        // apply_cell succeeded, so the coordinates and color are in range.
        Some(ClientUpdate::CellChanged {
            pos: CellPos::new(update.pos_x as u32, update.pos_y as u32),
            color: update.color as ColorIndex,
            previous,
        })
    }

    fn refresh_tooltip_for(&self, update: &PixelUpdate) -> Option<ClientUpdate> {
        let target = self.viewport.target().filter(|_| self.tooltip_open)?;
        if i64::from(target.x) != update.pos_x || i64::from(target.y) != update.pos_y {
            return None;
        }
        Some(ClientUpdate::Tooltip(self.inspect()))
    }

    // ── Gestures ──────────────────────────────────────

    pub fn pointer_down(&mut self, at: ScreenPoint) -> Option<ClientUpdate> {
        let event = self.viewport.pointer_down(at);
        self.on_viewport_event(event)
    }

    pub fn pointer_move(&mut self, at: ScreenPoint) -> Option<ClientUpdate> {
        let event = self.viewport.pointer_move(at);
        self.on_viewport_event(event)
    }

    pub fn pointer_up(&mut self, at: ScreenPoint) -> Option<ClientUpdate> {
        let event = self.viewport.pointer_up(at);
        self.on_viewport_event(event)
    }

    pub fn wheel(&mut self, delta_y: f64, at: ScreenPoint) -> Option<ClientUpdate> {
        let event = self.viewport.wheel(delta_y, at);
        self.on_viewport_event(event)
    }

    /// Advance the click animation to the clock's present.
    pub fn tick(&mut self) -> Option<ClientUpdate> {
        let event = self.viewport.tick();
        self.on_viewport_event(event)
    }

    /// Select a cell directly (keyboard, deep link). Out of range clears.
    pub fn select(&mut self, x: i64, y: i64) -> Option<ClientUpdate> {
        match self.viewport.set_target(x, y) {
            Some(target) => {
                let event = self.viewport.focus(target);
                self.on_viewport_event(event)
            }
            None => self.on_viewport_event(ViewportEvent::Cleared),
        }
    }

    fn on_viewport_event(&mut self, event: ViewportEvent) -> Option<ClientUpdate> {
        match event {
            ViewportEvent::Idle | ViewportEvent::Moved => None,
            ViewportEvent::Settled { .. } => {
                self.tooltip_open = true;
                Some(ClientUpdate::Tooltip(self.inspect()))
            }
            ViewportEvent::HideTooltip
            | ViewportEvent::Animating { .. }
            | ViewportEvent::Retargeted { .. }
            | ViewportEvent::Cleared => self.hide_tooltip(),
        }
    }

    fn hide_tooltip(&mut self) -> Option<ClientUpdate> {
        if std::mem::take(&mut self.tooltip_open) {
            Some(ClientUpdate::Tooltip(None))
        } else {
            None
        }
    }

    // ── Inspection & placement ────────────────────────

    /// Local read of the selected cell. No network.
    pub fn inspect(&self) -> Option<Inspection> {
        let pos = self.viewport.target()?;
        let (x, y) = (i64::from(pos.x), i64::from(pos.y));
        let color = self.grid.color_at(x, y).ok()?;
        let hex = self.grid.entry_at(x, y).ok()?.label.clone();
        Some(Inspection { pos, color, hex })
    }

    pub fn selected_color(&self) -> ColorIndex {
        self.selected_color
    }

    pub fn select_color(&mut self, index: i64) -> Result<ColorIndex, PlaceError> {
        let color = self.validate_color(index)?;
        self.selected_color = color;
        Ok(color)
    }

    /// Selection and color a placement would send.
    pub fn placement_data(&self) -> Option<PlacementData> {
        let target = self.viewport.target()?;
        Some(PlacementData {
            color: self.selected_color,
            pos_x: target.x,
            pos_y: target.y,
        })
    }

    /// Ask the authority to paint the selected cell with `color`.
    ///
    /// The grid is left untouched; the change arrives through the canvas
    /// stream once the authority accepts it.
    pub fn place(&mut self, color: i64) -> Result<PlacementData, PlaceError> {
        let slug = self.room_slug().ok_or(PlaceError::NoRoom)?.to_string();
        let target = self.viewport.target().ok_or(PlaceError::NoTarget)?;
        let color = self.validate_color(color)?;
        self.require_token()?;

        let frame = OutboundFrame::place_pixel(slug, target.x, target.y, color);
        if !self.transport.send(&frame) {
            return Err(PlaceError::NotConnected);
        }
        log::debug!("Requested ({}, {}) = {color}", target.x, target.y);
        Ok(PlacementData {
            color,
            pos_x: target.x,
            pos_y: target.y,
        })
    }

    /// [`place`](Self::place) with the selected color.
    pub fn place_selected(&mut self) -> Result<PlacementData, PlaceError> {
        self.place(i64::from(self.selected_color))
    }

    pub fn send_chat(&mut self, content: &str) -> Result<(), PlaceError> {
        let slug = self.room_slug().ok_or(PlaceError::NoRoom)?.to_string();
        self.require_token()?;
        if !self.transport.send(&OutboundFrame::send_message(slug, content)) {
            return Err(PlaceError::NotConnected);
        }
        Ok(())
    }

    fn validate_color(&self, index: i64) -> Result<ColorIndex, PlaceError> {
        let palette = self.grid.palette().ok_or(PlaceError::NoRoom)?;
        if !palette.contains(index) {
            log::warn!("Rejected color {index}; palette has {} colors", palette.len());
            return Err(PlaceError::InvalidColor {
                index,
                len: palette.len(),
            });
        }
        Ok(index as ColorIndex)
    }

    fn require_token(&self) -> Result<String, PlaceError> {
        self.auth.valid_token().ok_or_else(|| {
            self.auth.on_unauthenticated();
            PlaceError::AuthRequired
        })
    }
}

fn forward(tx: &mpsc::UnboundedSender<StreamEvent>, topic: Topic, delivery: Delivery) {
    let event = match delivery {
        Delivery::Failed(error) => StreamEvent::Failed { topic, error },
        Delivery::Data(payload) => {
            let decoded = match topic {
                Topic::CanvasStream => serde_json::from_value(payload).map(StreamEvent::Pixel),
                Topic::ChatStream => serde_json::from_value(payload).map(StreamEvent::Chat),
            };
            match decoded {
                Ok(event) => event,
                Err(e) => {
                    log::warn!("Dropping undecodable {topic} payload: {e}");
                    return;
                }
            }
        }
    };
    let _ = tx.send(event);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticAuth;
    use crate::loader::{RoomConfig, RoomMetadata, RoomSettings};
    use crate::protocol::InboundFrame;
    use crate::transport::{QueuedConnector, RemoteEnd};
    use eplace_core::ManualClock;
    use serde_json::json;
    use std::time::Duration;

    const FAR_FUTURE_TOKEN: &str =
        "eyJhbGciOiJIUzI1NiJ9.eyJleHAiOjMyNTAzNjgwMDAwfQ.sig";

    fn snapshot(side: u32) -> RoomSnapshot {
        RoomSnapshot {
            slug: "main".into(),
            config: RoomConfig {
                metadata: RoomMetadata {
                    canvas_dimensions: side,
                    name: Some("Main".into()),
                },
                settings: RoomSettings {
                    room_colors: "#000000,#ffffff,#ff0000".into(),
                },
            },
            pixels: vec![0; (side * side) as usize],
        }
    }

    type TestSession = RoomSession<QueuedConnector, StaticAuth, ManualClock>;

    async fn connected(auth: StaticAuth) -> (TestSession, RemoteEnd, ManualClock) {
        let connector = QueuedConnector::new();
        let remote = connector.push_pair();
        let clock = ManualClock::new();
        let viewport = ViewportController::with_clock(800.0, 600.0, clock.clone());
        let mut session = RoomSession::new(TransportSession::new(connector), auth, viewport);
        session.connect().await.unwrap();
        (session, remote, clock)
    }

    fn canvas_id(remote: &mut RemoteEnd) -> SubscriptionId {
        remote
            .drain_sent()
            .iter()
            .filter_map(|f| f.subscription())
            .find(|(_, path, _)| *path == Topic::CanvasStream.path())
            .map(|(id, _, _)| id.clone())
            .unwrap()
    }

    #[tokio::test]
    async fn test_enter_room_subscribes_both_topics() {
        let (mut session, mut remote, _) = connected(StaticAuth::anonymous()).await;
        session.enter_room(snapshot(4)).unwrap();

        let mut paths: Vec<String> = remote
            .drain_sent()
            .iter()
            .filter_map(|f| f.subscription().map(|(_, p, room)| format!("{p}@{room}")))
            .collect();
        paths.sort();
        assert_eq!(paths, vec!["rooms.canvas.getStream@main", "rooms.getChat@main"]);
        assert_eq!(session.viewport().target(), Some(CellPos::new(2, 2)));
        assert_eq!(session.room_name(), Some("Main"));
        assert_eq!(session.selected_color(), 0);
    }

    #[tokio::test]
    async fn test_pixel_update_applies_to_grid() {
        let (mut session, mut remote, _) = connected(StaticAuth::anonymous()).await;
        session.enter_room(snapshot(4)).unwrap();
        session.take_damage();
        let id = canvas_id(&mut remote);

        remote.deliver(&InboundFrame::data(
            id,
            json!({"roomSlug": "main", "posX": 2, "posY": 1, "color": 1}),
        ));
        let updates = session.next_update().await.unwrap();
        assert_eq!(
            updates,
            vec![ClientUpdate::CellChanged {
                pos: CellPos::new(2, 1),
                color: 1,
                previous: 0
            }]
        );
        assert_eq!(session.grid().color_at(2, 1), Ok(1));
        assert_eq!(session.take_damage(), Damage::Cells(vec![(2, 1)]));
    }

    #[tokio::test]
    async fn test_invalid_pixel_update_is_absorbed() {
        let (mut session, mut remote, _) = connected(StaticAuth::anonymous()).await;
        session.enter_room(snapshot(4)).unwrap();
        let id = canvas_id(&mut remote);

        remote.deliver(&InboundFrame::data(
            id,
            json!({"posX": 9, "posY": 0, "color": 1}),
        ));
        assert_eq!(session.next_update().await, Some(vec![]));
        assert!(session.grid().cells().iter().all(|&c| c == 0));
    }

    #[tokio::test]
    async fn test_click_animates_then_shows_tooltip() {
        let (mut session, _remote, clock) = connected(StaticAuth::anonymous()).await;
        session.enter_room(snapshot(4)).unwrap();

        // Surface center is grid center at zoom 2.5: cell (2, 2) sits just
        // right of and below (400, 300).
        let p = ScreenPoint::new(401.0, 301.0);
        assert_eq!(session.pointer_down(p), None);
        assert_eq!(session.pointer_up(p), None);
        assert!(session.viewport().is_animating());

        clock.advance(Duration::from_millis(250));
        assert_eq!(session.tick(), None);

        clock.advance(Duration::from_millis(300));
        let shown = session.tick();
        let Some(ClientUpdate::Tooltip(Some(inspection))) = shown else {
            panic!("expected tooltip, got {shown:?}");
        };
        assert_eq!(inspection.pos, CellPos::new(2, 2));
        assert_eq!(inspection.hex, "#000000");
        assert!(session.is_tooltip_open());
    }

    #[tokio::test]
    async fn test_tooltip_refreshes_on_live_update() {
        let (mut session, mut remote, clock) = connected(StaticAuth::anonymous()).await;
        session.enter_room(snapshot(4)).unwrap();
        let id = canvas_id(&mut remote);

        assert_eq!(session.select(1, 1), None);
        clock.advance(Duration::from_millis(600));
        let shown = session.tick();
        assert!(matches!(shown, Some(ClientUpdate::Tooltip(Some(_)))));

        remote.deliver(&InboundFrame::data(id, json!({"posX": 1, "posY": 1, "color": 2})));
        let updates = session.next_update().await.unwrap();
        assert_eq!(updates.len(), 2);
        let ClientUpdate::Tooltip(Some(inspection)) = &updates[1] else {
            panic!("expected refreshed tooltip");
        };
        assert_eq!(inspection.color, 2);
        assert_eq!(inspection.hex, "#ff0000");
    }

    #[tokio::test]
    async fn test_drag_hides_tooltip() {
        let (mut session, _remote, _) = connected(StaticAuth::anonymous()).await;
        session.enter_room(snapshot(4)).unwrap();
        session.tooltip_open = true;

        session.pointer_down(ScreenPoint::new(400.0, 300.0));
        assert_eq!(
            session.pointer_move(ScreenPoint::new(420.0, 300.0)),
            Some(ClientUpdate::Tooltip(None))
        );
        assert!(!session.is_tooltip_open());
        assert_eq!(session.pointer_move(ScreenPoint::new(430.0, 300.0)), None);
    }

    #[tokio::test]
    async fn test_place_sends_mutation_without_local_write() {
        let (mut session, mut remote, _) =
            connected(StaticAuth::new(FAR_FUTURE_TOKEN)).await;
        session.enter_room(snapshot(4)).unwrap();
        remote.drain_sent();

        let placed = session.place(2).unwrap();
        assert_eq!(placed, PlacementData { color: 2, pos_x: 2, pos_y: 2 });
        assert_eq!(
            remote.drain_sent(),
            vec![OutboundFrame::place_pixel("main", 2, 2, 2)]
        );
        assert_eq!(session.grid().color_at(2, 2), Ok(0));
    }

    #[tokio::test]
    async fn test_place_requires_token() {
        let (mut session, mut remote, _) = connected(StaticAuth::anonymous()).await;
        session.enter_room(snapshot(4)).unwrap();
        remote.drain_sent();

        assert_eq!(session.place(1), Err(PlaceError::AuthRequired));
        assert_eq!(session.auth().unauthenticated_count(), 1);
        assert!(remote.drain_sent().is_empty());
    }

    #[tokio::test]
    async fn test_place_validation() {
        let (mut session, _remote, _) = connected(StaticAuth::new(FAR_FUTURE_TOKEN)).await;
        assert_eq!(session.place(0), Err(PlaceError::NoRoom));

        session.enter_room(snapshot(4)).unwrap();
        assert_eq!(
            session.place(7),
            Err(PlaceError::InvalidColor { index: 7, len: 3 })
        );
        session.viewport.clear_target();
        assert_eq!(session.place(1), Err(PlaceError::NoTarget));
        assert_eq!(session.placement_data(), None);
    }

    #[tokio::test]
    async fn test_unauthorized_error_routes_to_auth() {
        let (mut session, mut remote, _) = connected(StaticAuth::anonymous()).await;
        session.enter_room(snapshot(2)).unwrap();
        let id = canvas_id(&mut remote);

        remote.deliver_raw(format!(
            r#"{{"id":"{id}","error":{{"json":{{"message":"login","data":{{"code":"UNAUTHORIZED"}}}}}}}}"#
        ));
        let updates = session.next_update().await.unwrap();
        assert!(matches!(
            &updates[..],
            [ClientUpdate::SubscriptionFailed { topic: Topic::CanvasStream, .. }]
        ));
        assert_eq!(session.auth().unauthenticated_count(), 1);
        assert_eq!(session.registry().len(), 2);
    }

    #[tokio::test]
    async fn test_leave_room_stops_streams() {
        let (mut session, mut remote, _) = connected(StaticAuth::anonymous()).await;
        session.enter_room(snapshot(2)).unwrap();
        let id = canvas_id(&mut remote);

        session.leave_room();
        let stops: Vec<_> = remote
            .drain_sent()
            .into_iter()
            .filter(|f| matches!(f, OutboundFrame::Stop { .. }))
            .collect();
        assert_eq!(stops.len(), 2);
        assert!(session.registry().is_empty());
        assert!(!session.grid().is_loaded());

        // Late frame for the stopped subscription.
        remote.deliver(&InboundFrame::data(id, json!({"posX": 0, "posY": 0, "color": 1})));
        assert_eq!(session.next_update().await, Some(vec![]));
    }

    #[tokio::test]
    async fn test_chat_is_surfaced() {
        let (mut session, mut remote, _) = connected(StaticAuth::anonymous()).await;
        session.enter_room(snapshot(2)).unwrap();
        let chat_id = remote
            .drain_sent()
            .iter()
            .filter_map(|f| f.subscription())
            .find(|(_, path, _)| *path == Topic::ChatStream.path())
            .map(|(id, _, _)| id.clone())
            .unwrap();

        remote.deliver(&InboundFrame::data(
            chat_id,
            json!({"roomSlug": "main", "authorUid": "u1", "content": "hello"}),
        ));
        let updates = session.next_update().await.unwrap();
        let [ClientUpdate::Chat(msg)] = &updates[..] else {
            panic!("expected chat, got {updates:?}");
        };
        assert_eq!(msg.content, "hello");
    }

    #[tokio::test]
    async fn test_disconnect_is_reported() {
        let (mut session, remote, _) = connected(StaticAuth::anonymous()).await;
        remote.close(None);
        assert_eq!(
            session.next_update().await,
            Some(vec![ClientUpdate::Disconnected { reason: None }])
        );
        assert_eq!(session.connection_state(), ConnectionState::Disconnected);
        assert_eq!(session.next_update().await, None);
    }
}

//! # eplace-collab — Live room synchronization for the eplace client
//!
//! Keeps a local canvas in step with the room authority over one
//! long-lived socket.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   subscription / mutation   ┌──────────────┐
//! │ RoomSession  │ ──────────────────────────► │  Authority   │
//! │ (per room)   │ ◄────────────────────────── │  (remote)    │
//! └──────┬───────┘   started / data / error    └──────────────┘
//!        │
//!        ├──► TransportSession ── Link (reader/writer tasks)
//!        ├──► SubscriptionRegistry ── id → handler
//!        ├──► GridStore (eplace-core)
//!        └──► ViewportController (eplace-core)
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] — JSON frames, topics and correlation ids
//! - [`transport`] — connection lifecycle and frame send/receive
//! - [`registry`] — live subscriptions, dispatch and resubscription
//! - [`auth`] — bearer-token collaborator
//! - [`loader`] — one-shot room descriptor and snapshot fetch
//! - [`config`] — endpoints and room selection
//! - [`client`] — the room session tying it all together

pub mod auth;
pub mod client;
pub mod config;
pub mod loader;
pub mod protocol;
pub mod registry;
pub mod transport;

pub use auth::{AuthProvider, BearerToken, EnvAuth, StaticAuth};
pub use client::{ClientUpdate, Inspection, PlaceError, PlacementData, RoomError, RoomSession};
pub use config::{ClientConfig, ConfigError};
pub use loader::{HttpRoomLoader, LoaderError, RoomConfig, RoomLoader, RoomSnapshot, StaticRoomLoader};
pub use protocol::{
    ChatMessage, InboundBody, InboundFrame, OutboundFrame, PixelUpdate, ProtocolError,
    RemoteError, SubscriptionId, Topic,
};
pub use registry::{Delivery, DispatchOutcome, RegistryError, SubscriptionRegistry};
pub use transport::{
    ConnectionState, Connector, FrameSink, Link, QueuedConnector, SessionEvent, TransportError,
    TransportSession, WsConnector,
};

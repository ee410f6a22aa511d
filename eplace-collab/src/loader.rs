//! Room configuration and snapshot loading.
//!
//! A one-shot fetch at room entry: the room descriptor (dimensions,
//! palette, display name) and the full grid as a flat array of color
//! indices. The HTTP loader tries the room-scoped endpoints first and
//! falls back to the generic ones.

use std::future::Future;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use eplace_core::{Palette, PaletteError};

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{url} returned {status}")]
    Status { url: String, status: u16 },
    #[error("Invalid room palette: {0}")]
    Palette(#[from] PaletteError),
    #[error("Snapshot has {actual} cells, room is {side}×{side}")]
    SnapshotSize { side: u32, actual: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomMetadata {
    /// Side length; the grid is square.
    pub canvas_dimensions: u32,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSettings {
    /// Comma-separated `#RRGGBB` list.
    pub room_colors: String,
}

/// Room descriptor as served by the config endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomConfig {
    pub metadata: RoomMetadata,
    pub settings: RoomSettings,
}

impl RoomConfig {
    pub fn side(&self) -> u32 {
        self.metadata.canvas_dimensions
    }

    pub fn palette(&self) -> Result<Palette, PaletteError> {
        Palette::parse(&self.settings.room_colors)
    }
}

/// Everything needed to enter a room.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomSnapshot {
    pub slug: String,
    pub config: RoomConfig,
    pub pixels: Vec<i64>,
}

impl RoomSnapshot {
    pub fn display_name(&self) -> &str {
        self.config.metadata.name.as_deref().unwrap_or(&self.slug)
    }

    /// Check the pixel count against the square dimensions.
    pub fn validate(&self) -> Result<(), LoaderError> {
        let side = self.config.side();
        let expected = side as usize * side as usize;
        if self.pixels.len() != expected {
            return Err(LoaderError::SnapshotSize {
                side,
                actual: self.pixels.len(),
            });
        }
        Ok(())
    }
}

/// Source of room snapshots.
pub trait RoomLoader {
    fn load(&self, slug: &str) -> impl Future<Output = Result<RoomSnapshot, LoaderError>> + Send;
}

/// Loads from the REST API.
#[derive(Debug, Clone)]
pub struct HttpRoomLoader {
    client: reqwest::Client,
    api_url: String,
}

impl HttpRoomLoader {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_url)
    }

    pub fn with_client(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        Self { client, api_url }
    }

    /// `(room endpoint, generic fallback)` for one resource.
    pub fn endpoints(&self, slug: &str, resource: &str) -> (String, String) {
        (
            format!("{}/api/rooms/{slug}/{resource}", self.api_url),
            format!("{}/api/{resource}", self.api_url),
        )
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, LoaderError> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(LoaderError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(resp.json().await?)
    }

    async fn fetch_with_fallback<T: DeserializeOwned>(
        &self,
        slug: &str,
        resource: &str,
    ) -> Result<T, LoaderError> {
        let (primary, fallback) = self.endpoints(slug, resource);
        match self.get_json(&primary).await {
            Ok(value) => Ok(value),
            Err(e) => {
                log::warn!("Room {resource} fetch failed ({e}); trying {fallback}");
                self.get_json(&fallback).await
            }
        }
    }
}

impl RoomLoader for HttpRoomLoader {
    fn load(&self, slug: &str) -> impl Future<Output = Result<RoomSnapshot, LoaderError>> + Send {
        async move {
            let config: RoomConfig = self.fetch_with_fallback(slug, "config").await?;
            let pixels: Vec<i64> = self.fetch_with_fallback(slug, "canvas").await?;
            let snapshot = RoomSnapshot {
                slug: slug.to_string(),
                config,
                pixels,
            };
            snapshot.validate()?;
            log::info!(
                "Loaded room '{}' ({}×{})",
                snapshot.display_name(),
                snapshot.config.side(),
                snapshot.config.side()
            );
            Ok(snapshot)
        }
    }
}

/// Serves one fixed snapshot regardless of slug.
#[derive(Debug, Clone)]
pub struct StaticRoomLoader {
    snapshot: RoomSnapshot,
}

impl StaticRoomLoader {
    pub fn new(snapshot: RoomSnapshot) -> Self {
        Self { snapshot }
    }
}

impl RoomLoader for StaticRoomLoader {
    fn load(&self, slug: &str) -> impl Future<Output = Result<RoomSnapshot, LoaderError>> + Send {
        let mut snapshot = self.snapshot.clone();
        snapshot.slug = slug.to_string();
        std::future::ready(snapshot.validate().map(|()| snapshot))
    }
}

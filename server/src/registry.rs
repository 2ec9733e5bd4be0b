//! Session registry: the in-memory table of connected clients and their last
//! reported state
//!
//! This module owns the only shared mutable state of the server:
//! - Insert-on-connect with default position and color
//! - Field-level updates from `move` and `color` events
//! - Removal on disconnect or when a background sweep finds the entry stale
//! - Point-in-time snapshots for the broadcast loop
//!
//! The table sits behind a single `RwLock`. Every mutation replaces fields
//! while holding the write lock and every snapshot clones while holding the
//! read lock, so readers never see a half-applied update and iteration never
//! races with inserts or removals.

use crate::error::RegistryError;
use crate::utils::{get_timestamp, random_hue_color};
use log::{debug, info};
use shared::{ClientId, ClientState, Position, PositionMode, Snapshot};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;

/// How a newly connected client gets its color
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColorPolicy {
    /// Every client starts with the same color
    Fixed(String),
    /// Every client starts with `hsl(<random hue>, 100%, 50%)`
    RandomHue,
}

impl ColorPolicy {
    pub fn pick(&self) -> String {
        match self {
            ColorPolicy::Fixed(color) => color.clone(),
            ColorPolicy::RandomHue => random_hue_color(),
        }
    }
}

impl Default for ColorPolicy {
    fn default() -> Self {
        ColorPolicy::Fixed(shared::DEFAULT_COLOR.to_string())
    }
}

/// Result of applying a `move` or `color` event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Applied,
    /// Id not in the table (already disconnected or evicted)
    UnknownClient,
    /// Position used a coordinate system this deployment does not accept
    WrongCoordinates,
}

/// Returns true if the entry has been inactive for longer than `timeout`
///
/// Entries stamped in the future (clock adjustments) are never stale.
pub fn is_stale(state: &ClientState, now: u64, timeout: Duration) -> bool {
    let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
    now.saturating_sub(state.last_active) > timeout_ms
}

/// Registry of connected clients keyed by connection id
pub struct SessionRegistry {
    clients: RwLock<HashMap<ClientId, ClientState>>,
    position_mode: PositionMode,
    color_policy: ColorPolicy,
    max_clients: usize,
}

impl SessionRegistry {
    /// Creates an empty registry
    ///
    /// `position_mode` decides both the zero position given to new entries
    /// and which `move` payloads are accepted. `max_clients` caps the table
    /// size; connections beyond it are refused.
    pub fn new(position_mode: PositionMode, color_policy: ColorPolicy, max_clients: usize) -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
            position_mode,
            color_policy,
            max_clients,
        }
    }

    pub fn position_mode(&self) -> PositionMode {
        self.position_mode
    }

    /// Inserts a default entry for a freshly accepted connection
    ///
    /// Returns the inserted state so the caller can log it. Nothing is
    /// inserted when the table is full or the id already exists.
    pub async fn on_connect(&self, id: ClientId) -> Result<ClientState, RegistryError> {
        let state = ClientState::new(
            self.position_mode.origin(),
            self.color_policy.pick(),
            get_timestamp(),
        );

        let mut clients = self.clients.write().await;
        if clients.contains_key(&id) {
            return Err(RegistryError::DuplicateId(id));
        }
        if clients.len() >= self.max_clients {
            return Err(RegistryError::AtCapacity(clients.len()));
        }

        info!("Client {} joined with color {}", id, state.color);
        clients.insert(id, state.clone());
        Ok(state)
    }

    /// Overwrites the position of a known client and refreshes its activity
    pub async fn on_update_position(&self, id: &ClientId, position: Position) -> UpdateOutcome {
        if position.mode() != self.position_mode {
            return UpdateOutcome::WrongCoordinates;
        }

        let mut clients = self.clients.write().await;
        match clients.get_mut(id) {
            Some(state) => {
                state.position = position;
                state.last_active = get_timestamp();
                UpdateOutcome::Applied
            }
            None => UpdateOutcome::UnknownClient,
        }
    }

    /// Overwrites the color of a known client and refreshes its activity
    pub async fn on_update_color(&self, id: &ClientId, color: String) -> UpdateOutcome {
        let mut clients = self.clients.write().await;
        match clients.get_mut(id) {
            Some(state) => {
                state.color = color;
                state.last_active = get_timestamp();
                UpdateOutcome::Applied
            }
            None => UpdateOutcome::UnknownClient,
        }
    }

    /// Removes a client. Returns false if it was already gone.
    pub async fn on_disconnect(&self, id: &ClientId) -> bool {
        let removed = self.clients.write().await.remove(id).is_some();
        if removed {
            info!("Client {} left", id);
        } else {
            debug!("Client {} already removed", id);
        }
        removed
    }

    /// Removes every entry inactive for longer than `timeout` as of `now`
    /// (milliseconds since the Unix epoch) and returns the removed ids
    pub async fn sweep_stale(&self, now: u64, timeout: Duration) -> Vec<ClientId> {
        let mut clients = self.clients.write().await;
        let stale: Vec<ClientId> = clients
            .iter()
            .filter(|(_, state)| is_stale(state, now, timeout))
            .map(|(id, _)| id.clone())
            .collect();

        for id in &stale {
            clients.remove(id);
        }

        stale
    }

    /// Owned point-in-time copy of the table
    pub async fn snapshot(&self) -> Snapshot {
        self.clients.read().await.clone()
    }

    /// Looks up a single entry
    pub async fn get(&self, id: &ClientId) -> Option<ClientState> {
        self.clients.read().await.get(id).cloned()
    }

    /// Number of registered clients
    pub async fn len(&self) -> usize {
        self.clients.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.clients.read().await.is_empty()
    }
}

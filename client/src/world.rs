//! Client-side mirror of the latest server broadcast

use shared::{ClientId, ClientState, ServerEvent, Snapshot};

/// Latest known state of every dot, as seen by one client
#[derive(Debug, Default, Clone)]
pub struct World {
    me: Option<ClientId>,
    clients: Snapshot,
    updates: u64,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one server event
    ///
    /// `updateAll` replaces the whole mirror: entries missing from a
    /// broadcast belong to clients that left or were evicted.
    pub fn apply(&mut self, event: &ServerEvent) {
        match event {
            ServerEvent::Init(id) => self.me = Some(id.clone()),
            ServerEvent::UpdateAll(update) => {
                self.clients = update.clients.clone();
                self.updates += 1;
            }
            ServerEvent::Rejected(_) => {
                self.me = None;
                self.clients.clear();
            }
        }
    }

    pub fn me(&self) -> Option<&ClientId> {
        self.me.as_ref()
    }

    /// Own entry, if the server still tracks this client
    pub fn my_state(&self) -> Option<&ClientState> {
        self.me.as_ref().and_then(|id| self.clients.get(id))
    }

    pub fn get(&self, id: &ClientId) -> Option<&ClientState> {
        self.clients.get(id)
    }

    /// Every tracked client except this one
    pub fn others(&self) -> impl Iterator<Item = (&ClientId, &ClientState)> {
        self.clients
            .iter()
            .filter(move |(id, _)| Some(*id) != self.me.as_ref())
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Number of `updateAll` events applied so far
    pub fn updates(&self) -> u64 {
        self.updates
    }
}

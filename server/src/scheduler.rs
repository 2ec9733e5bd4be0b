//! Periodic tasks: state broadcast and stale-entry sweep.
//!
//! Each task owns its own `interval` and touches the registry through one
//! operation per tick. The two are never phase-locked, and there is exactly
//! one of each per server regardless of how many clients are connected.

use crate::connections::{BroadcastReport, ConnectionTable};
use crate::registry::SessionRegistry;
use crate::utils::get_timestamp;
use log::{debug, error, info};
use shared::{ClientId, ServerEvent, UpdateAll};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};

const STATS_EVERY_TICKS: u64 = 100;

/// Aborts the wrapped tasks when dropped
pub struct TaskSet(Vec<JoinHandle<()>>);

impl TaskSet {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, handle: JoinHandle<()>) {
        self.0.push(handle);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for TaskSet {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TaskSet {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

/// Snapshots the registry and pushes `updateAll` to every connection
pub async fn broadcast_tick(
    registry: &SessionRegistry,
    connections: &ConnectionTable,
    include_count: bool,
) -> BroadcastReport {
    if connections.is_empty().await {
        return BroadcastReport::default();
    }

    let clients = registry.snapshot().await;
    let count = include_count.then(|| clients.len());
    let event = ServerEvent::UpdateAll(UpdateAll { clients, count });

    match connections.broadcast(&event).await {
        Ok(report) => report,
        Err(e) => {
            error!("Failed to broadcast state: {}", e);
            BroadcastReport::default()
        }
    }
}

/// Evicts entries that have been inactive for longer than `timeout`
pub async fn sweep_tick(registry: &SessionRegistry, timeout: Duration) -> Vec<ClientId> {
    let removed = registry.sweep_stale(get_timestamp(), timeout).await;
    for id in &removed {
        info!("Evicted {} after {}ms of inactivity", id, timeout.as_millis());
    }
    removed
}

/// Starts the global broadcast loop
pub fn spawn_broadcaster(
    registry: Arc<SessionRegistry>,
    connections: Arc<ConnectionTable>,
    period: Duration,
    include_count: bool,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut ticks: u64 = 0;

        loop {
            ticker.tick().await;
            let report = broadcast_tick(&registry, &connections, include_count).await;
            ticks += 1;

            // Periodic delivery stats
            if ticks % STATS_EVERY_TICKS == 0 {
                debug!(
                    "Tick {}: {} delivered, {} failed, {} clients",
                    ticks,
                    report.delivered,
                    report.failed,
                    registry.len().await
                );
            }
        }
    })
}

/// Starts the global stale-entry sweep loop
pub fn spawn_sweeper(
    registry: Arc<SessionRegistry>,
    period: Duration,
    timeout: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // The first tick fires immediately and nothing can be stale yet
        ticker.tick().await;

        loop {
            ticker.tick().await;
            sweep_tick(&registry, timeout).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ColorPolicy;
    use shared::{Position, PositionMode};
    use tokio::sync::mpsc;
    use tokio_tungstenite::tungstenite::Message;

    fn registry() -> Arc<SessionRegistry> {
        Arc::new(SessionRegistry::new(
            PositionMode::Cartesian,
            ColorPolicy::default(),
            16,
        ))
    }

    fn decode_update(message: Message) -> UpdateAll {
        match message {
            Message::Text(text) => match ServerEvent::from_json(text.as_str()).unwrap() {
                ServerEvent::UpdateAll(update) => update,
                other => panic!("Unexpected event: {:?}", other),
            },
            other => panic!("Unexpected message: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_broadcast_tick_sends_snapshot_to_everyone() {
        let registry = registry();
        let connections = ConnectionTable::new();
        let a = ClientId::new("a");
        let b = ClientId::new("b");
        let (tx_a, mut rx_a) = mpsc::channel(4);
        let (tx_b, mut rx_b) = mpsc::channel(4);
        registry.on_connect(a.clone()).await.unwrap();
        registry.on_connect(b.clone()).await.unwrap();
        connections.register(a.clone(), tx_a).await;
        connections.register(b.clone(), tx_b).await;
        registry
            .on_update_position(&a, Position::Cartesian { x: 1.0, y: 2.0 })
            .await;

        let report = broadcast_tick(&registry, &connections, true).await;

        assert_eq!(report.delivered, 2);
        let update_a = decode_update(rx_a.try_recv().unwrap());
        let update_b = decode_update(rx_b.try_recv().unwrap());
        assert_eq!(update_a, update_b);
        assert_eq!(update_a.count, Some(2));
        assert_eq!(
            update_a.clients[&a].position,
            Position::Cartesian { x: 1.0, y: 2.0 }
        );
    }

    #[tokio::test]
    async fn test_broadcast_tick_without_count() {
        let registry = registry();
        let connections = ConnectionTable::new();
        let (tx, mut rx) = mpsc::channel(4);
        connections.register(ClientId::new("watcher"), tx).await;

        broadcast_tick(&registry, &connections, false).await;

        let update = decode_update(rx.try_recv().unwrap());
        assert_eq!(update.count, None);
        assert!(update.clients.is_empty());
    }

    #[tokio::test]
    async fn test_broadcast_tick_skips_when_nobody_listens() {
        let registry = registry();
        let connections = ConnectionTable::new();
        registry.on_connect(ClientId::new("a")).await.unwrap();

        let report = broadcast_tick(&registry, &connections, true).await;

        assert_eq!(report, BroadcastReport::default());
    }

    #[tokio::test]
    async fn test_broadcast_tick_survives_closed_recipient() {
        let registry = registry();
        let connections = ConnectionTable::new();
        let (tx_gone, rx_gone) = mpsc::channel(4);
        let (tx_ok, mut rx_ok) = mpsc::channel(4);
        drop(rx_gone);
        connections.register(ClientId::new("gone"), tx_gone).await;
        connections.register(ClientId::new("ok"), tx_ok).await;

        let report = broadcast_tick(&registry, &connections, false).await;

        assert_eq!(
            report,
            BroadcastReport {
                delivered: 1,
                failed: 1
            }
        );
        assert!(rx_ok.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_sweep_tick_removes_only_stale_entries() {
        let registry = registry();
        registry.on_connect(ClientId::new("idle")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        registry.on_connect(ClientId::new("active")).await.unwrap();

        let removed = sweep_tick(&registry, Duration::from_millis(20)).await;

        assert_eq!(removed, vec![ClientId::new("idle")]);
        assert!(registry.get(&ClientId::new("active")).await.is_some());
    }

    #[tokio::test]
    async fn test_spawned_broadcaster_ticks_repeatedly() {
        let registry = registry();
        let connections = Arc::new(ConnectionTable::new());
        let (tx, mut rx) = mpsc::channel(64);
        connections.register(ClientId::new("a"), tx).await;

        let mut tasks = TaskSet::new();
        tasks.push(spawn_broadcaster(
            Arc::clone(&registry),
            Arc::clone(&connections),
            Duration::from_millis(10),
            false,
        ));

        for _ in 0..3 {
            let message = tokio::time::timeout(Duration::from_secs(1), rx.recv())
                .await
                .expect("broadcast did not arrive")
                .expect("queue closed");
            decode_update(message);
        }
        assert_eq!(tasks.len(), 1);
    }

    #[tokio::test]
    async fn test_spawned_sweeper_evicts_idle_clients() {
        let registry = registry();
        registry.on_connect(ClientId::new("idle")).await.unwrap();

        let _tasks = {
            let mut tasks = TaskSet::new();
            tasks.push(spawn_sweeper(
                Arc::clone(&registry),
                Duration::from_millis(10),
                Duration::from_millis(30),
            ));
            tasks
        };

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_task_set_aborts_on_drop() {
        let handle = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
        });
        let abort_probe = handle.abort_handle();

        let mut tasks = TaskSet::new();
        tasks.push(handle);
        drop(tasks);

        tokio::time::timeout(Duration::from_secs(1), async {
            while !abort_probe.is_finished() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("task was not aborted");
    }
}

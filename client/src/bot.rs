//! Headless bots that wander around and report their position

use crate::error::ClientError;
use crate::network::Client;
use crate::world::World;
use log::{debug, info};
use rand::Rng;
use shared::{Position, PositionMode};
use std::f64::consts::TAU;
use std::time::Duration;
use tokio::time::{interval, Instant, MissedTickBehavior};

/// Deterministic motion path, sampled by elapsed time
#[derive(Debug, Clone, PartialEq)]
pub struct Wanderer {
    mode: PositionMode,
    radius: f64,
    /// Radians per second
    speed: f64,
    phase: f64,
}

impl Wanderer {
    pub fn new(mode: PositionMode, radius: f64, speed: f64, phase: f64) -> Self {
        Self {
            mode,
            radius,
            speed,
            phase,
        }
    }

    /// Random orbit with radius in [50, 250) and up to half a turn per second
    pub fn random(mode: PositionMode) -> Self {
        let mut rng = rand::thread_rng();
        let radius = rng.gen_range(50.0..250.0);
        let speed = rng.gen_range(0.2..std::f64::consts::PI);
        let phase = rng.gen_range(0.0..TAU);
        Self::new(mode, radius, speed, phase)
    }

    pub fn mode(&self) -> PositionMode {
        self.mode
    }

    /// Position after `elapsed`, in this wanderer's coordinate system
    pub fn position_at(&self, elapsed: Duration) -> Position {
        let angle = (self.phase + self.speed * elapsed.as_secs_f64()).rem_euclid(TAU);
        match self.mode {
            PositionMode::Polar => Position::Polar {
                r: self.radius,
                theta: angle,
            },
            PositionMode::Cartesian => Position::Cartesian {
                x: self.radius * angle.cos(),
                y: self.radius * angle.sin(),
            },
        }
    }
}

/// Settings shared by every bot
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub server: String,
    pub move_interval: Duration,
    pub mode: PositionMode,
    pub color: Option<String>,
}

/// Connects one bot and keeps it moving until the connection ends
pub async fn run_bot(config: BotConfig) -> Result<(), ClientError> {
    let mut client = Client::connect(&config.server).await?;
    let wanderer = Wanderer::random(config.mode);
    let mut world = World::new();
    world.apply(&shared::ServerEvent::Init(client.id().clone()));

    if let Some(color) = &config.color {
        client.send_color(color).await?;
    }

    let mut ticker = interval(config.move_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let started = Instant::now();
    let mut tracked = false;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let position = wanderer.position_at(started.elapsed());
                client.send_move(position).await?;
            }
            event = client.recv() => {
                world.apply(&event?);
                if world.updates() % 100 == 0 {
                    debug!(
                        "Bot {} sees {} clients ({} others)",
                        client.id(),
                        world.len(),
                        world.others().count()
                    );
                }
                let present = world.my_state().is_some();
                if tracked && !present {
                    info!("Bot {} was dropped by the server", client.id());
                }
                tracked = present;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use std::f64::consts::PI;

    #[test]
    fn test_polar_orbit_advances_theta() {
        let wanderer = Wanderer::new(PositionMode::Polar, 100.0, PI, 0.0);

        match wanderer.position_at(Duration::from_millis(500)) {
            Position::Polar { r, theta } => {
                assert_approx_eq!(r, 100.0);
                assert_approx_eq!(theta, PI / 2.0);
            }
            other => panic!("expected polar position, got {:?}", other),
        }
    }

    #[test]
    fn test_theta_wraps_into_one_turn() {
        let wanderer = Wanderer::new(PositionMode::Polar, 10.0, PI, 0.0);

        match wanderer.position_at(Duration::from_secs(3)) {
            Position::Polar { theta, .. } => assert_approx_eq!(theta, PI),
            other => panic!("expected polar position, got {:?}", other),
        }
    }

    #[test]
    fn test_cartesian_circle_keeps_radius() {
        let wanderer = Wanderer::new(PositionMode::Cartesian, 50.0, 1.3, 0.4);

        for ms in [0, 250, 1_000, 7_777] {
            match wanderer.position_at(Duration::from_millis(ms)) {
                Position::Cartesian { x, y } => assert_approx_eq!(x.hypot(y), 50.0, 1e-9),
                other => panic!("expected cartesian position, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_random_wanderer_stays_in_range() {
        for _ in 0..100 {
            let wanderer = Wanderer::random(PositionMode::Polar);
            assert_eq!(wanderer.mode(), PositionMode::Polar);
            assert!((50.0..250.0).contains(&wanderer.radius));
            assert!(wanderer.speed > 0.0);
        }
    }
}

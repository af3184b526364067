//! The single task that owns the [`World`]. Every join, intent change, read
//! and tick is a [`WorldCommand`] processed here one at a time.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};

use roadhound_core::dog::DogId;
use roadhound_core::map::{Direction, MapId};
use roadhound_core::registry::Token;
use roadhound_core::world::{
    ActionError, JoinError, JoinOutcome, SessionView, TickListener, TickReport, World,
};

#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    #[error(transparent)]
    Join(#[from] JoinError),
    #[error(transparent)]
    Action(#[from] ActionError),
    #[error("ticks are driven by the internal timer")]
    AutoTickActive,
    #[error("world loop has stopped")]
    Closed,
}

/// Live counters reported by the health endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorldStats {
    pub sessions: usize,
    pub dogs: usize,
    pub players: usize,
}

type Reply<T> = oneshot::Sender<Result<T, WorldError>>;

/// Commands sent from HTTP handlers to the world loop.
pub enum WorldCommand {
    Join {
        name: String,
        map_id: MapId,
        reply: Reply<JoinOutcome>,
    },
    SetDirection {
        token: Token,
        direction: Option<Direction>,
        reply: Reply<()>,
    },
    Players {
        token: Token,
        reply: Reply<Vec<(DogId, String)>>,
    },
    State {
        token: Token,
        reply: Reply<SessionView>,
    },
    Tick {
        elapsed: Duration,
        reply: Reply<TickReport>,
    },
    Stats {
        reply: Reply<WorldStats>,
    },
    Stop,
}

/// Cloneable sender side of the world loop.
#[derive(Clone)]
pub struct WorldHandle {
    tx: mpsc::UnboundedSender<WorldCommand>,
    auto_tick: bool,
}

impl WorldHandle {
    /// Whether the loop advances the world on its own timer.
    pub fn auto_tick(&self) -> bool {
        self.auto_tick
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> WorldCommand,
    ) -> Result<T, WorldError> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(make(reply)).map_err(|_| WorldError::Closed)?;
        rx.await.map_err(|_| WorldError::Closed)?
    }

    pub async fn join(&self, name: String, map_id: MapId) -> Result<JoinOutcome, WorldError> {
        self.request(|reply| WorldCommand::Join {
            name,
            map_id,
            reply,
        })
        .await
    }

    pub async fn set_direction(
        &self,
        token: Token,
        direction: Option<Direction>,
    ) -> Result<(), WorldError> {
        self.request(|reply| WorldCommand::SetDirection {
            token,
            direction,
            reply,
        })
        .await
    }

    pub async fn players(&self, token: Token) -> Result<Vec<(DogId, String)>, WorldError> {
        self.request(|reply| WorldCommand::Players { token, reply })
            .await
    }

    pub async fn state(&self, token: Token) -> Result<SessionView, WorldError> {
        self.request(|reply| WorldCommand::State { token, reply })
            .await
    }

    /// Advance the world by `elapsed`. Rejected while the internal timer runs.
    pub async fn tick(&self, elapsed: Duration) -> Result<TickReport, WorldError> {
        if self.auto_tick {
            return Err(WorldError::AutoTickActive);
        }
        self.request(|reply| WorldCommand::Tick { elapsed, reply })
            .await
    }

    pub async fn stats(&self) -> Result<WorldStats, WorldError> {
        self.request(|reply| WorldCommand::Stats { reply }).await
    }

    /// Ask the loop to stop. Await the task handle to know when it is done.
    pub fn stop(&self) {
        let _ = self.tx.send(WorldCommand::Stop);
    }
}

/// Spawn the world loop as a tokio task.
///
/// With a `tick_period` the world advances on an internal timer and
/// explicit tick commands are rejected; without one it only advances on
/// [`WorldHandle::tick`].
pub fn spawn_world_loop(
    world: World,
    tick_period: Option<Duration>,
    listener: Option<Box<dyn TickListener>>,
) -> (WorldHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(run_world_loop(world, tick_period, listener, rx));
    (
        WorldHandle {
            tx,
            auto_tick: tick_period.is_some(),
        },
        handle,
    )
}

async fn next_timer_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        },
        None => std::future::pending().await,
    }
}

fn run_tick(
    world: &mut World,
    listener: &mut Option<Box<dyn TickListener>>,
    elapsed: Duration,
) -> TickReport {
    let report = world.tick(elapsed);
    if report.spawned > 0 || report.picked_up > 0 || report.delivered > 0 {
        tracing::trace!(
            spawned = report.spawned,
            picked_up = report.picked_up,
            delivered = report.delivered,
            "Tick"
        );
    }
    if let Some(listener) = listener.as_mut() {
        listener.on_tick(world, elapsed);
    }
    report
}

async fn run_world_loop(
    mut world: World,
    tick_period: Option<Duration>,
    mut listener: Option<Box<dyn TickListener>>,
    mut cmd_rx: mpsc::UnboundedReceiver<WorldCommand>,
) {
    let mut interval = tick_period.map(|period| {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        interval
    });
    let mut last_tick = Instant::now();

    tracing::info!(
        tick_period_ms = tick_period.map(|p| p.as_millis() as u64),
        "World loop started"
    );

    loop {
        tokio::select! {
            _ = next_timer_tick(&mut interval) => {
                let now = Instant::now();
                let elapsed = now - last_tick;
                last_tick = now;
                run_tick(&mut world, &mut listener, elapsed);
            }
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(WorldCommand::Join { name, map_id, reply }) => {
                        let _ = reply.send(world.join(&name, &map_id).map_err(Into::into));
                    },
                    Some(WorldCommand::SetDirection { token, direction, reply }) => {
                        let _ = reply.send(
                            world.set_direction(&token, direction).map_err(Into::into),
                        );
                    },
                    Some(WorldCommand::Players { token, reply }) => {
                        let _ = reply.send(world.players(&token).map_err(Into::into));
                    },
                    Some(WorldCommand::State { token, reply }) => {
                        let _ = reply.send(world.state(&token).map_err(Into::into));
                    },
                    Some(WorldCommand::Tick { elapsed, reply }) => {
                        let result = if tick_period.is_some() {
                            Err(WorldError::AutoTickActive)
                        } else {
                            Ok(run_tick(&mut world, &mut listener, elapsed))
                        };
                        let _ = reply.send(result);
                    },
                    Some(WorldCommand::Stats { reply }) => {
                        let _ = reply.send(Ok(WorldStats {
                            sessions: world.session_count(),
                            dogs: world.dog_count(),
                            players: world.registry().len(),
                        }));
                    },
                    Some(WorldCommand::Stop) | None => break,
                }
            }
        }
    }

    if let Some(listener) = listener.as_mut() {
        listener.on_shutdown(&world);
    }
    tracing::info!("World loop stopped");
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use roadhound_core::test_helpers::test_world;
    use roadhound_core::world::WorldSettings;

    use super::*;

    fn settings() -> WorldSettings {
        WorldSettings {
            spawn_loot_on_join: false,
            ..WorldSettings::default()
        }
    }

    #[derive(Default)]
    struct Calls {
        ticks: Vec<Duration>,
        shutdowns: usize,
    }

    struct Recorder(Arc<Mutex<Calls>>);

    impl TickListener for Recorder {
        fn on_tick(&mut self, _world: &World, elapsed: Duration) {
            self.0.lock().unwrap().ticks.push(elapsed);
        }

        fn on_shutdown(&mut self, _world: &World) {
            self.0.lock().unwrap().shutdowns += 1;
        }
    }

    #[tokio::test]
    async fn commands_are_served_in_order() {
        let (world, _) = test_world(settings());
        let (handle, task) = spawn_world_loop(world, None, None);

        let joined = handle
            .join("Rex".into(), MapId::new("map1"))
            .await
            .unwrap();
        handle
            .set_direction(joined.token.clone(), Some(Direction::East))
            .await
            .unwrap();
        handle.tick(Duration::from_secs(2)).await.unwrap();

        let view = handle.state(joined.token.clone()).await.unwrap();
        assert_eq!(view.dogs[0].position.x, 2.0);

        let players = handle.players(joined.token).await.unwrap();
        assert_eq!(players, vec![(joined.dog_id, "Rex".to_string())]);

        handle.stop();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn join_errors_are_returned() {
        let (world, _) = test_world(settings());
        let (handle, task) = spawn_world_loop(world, None, None);

        let err = handle
            .join("Rex".into(), MapId::new("nowhere"))
            .await
            .unwrap_err();
        assert!(matches!(err, WorldError::Join(JoinError::MapNotFound(_))));

        handle.stop();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn explicit_tick_rejected_while_timer_runs() {
        let (world, _) = test_world(settings());
        let (handle, task) = spawn_world_loop(world, Some(Duration::from_millis(10)), None);
        assert!(handle.auto_tick());

        let err = handle.tick(Duration::from_millis(100)).await.unwrap_err();
        assert!(matches!(err, WorldError::AutoTickActive));

        handle.stop();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn timer_advances_world_and_calls_listener() {
        let (world, _) = test_world(settings());
        let calls = Arc::new(Mutex::new(Calls::default()));
        let listener = Box::new(Recorder(Arc::clone(&calls)));
        let (handle, task) =
            spawn_world_loop(world, Some(Duration::from_millis(100)), Some(listener));

        let joined = handle
            .join("Rex".into(), MapId::new("map1"))
            .await
            .unwrap();
        handle
            .set_direction(joined.token.clone(), Some(Direction::East))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(1050)).await;

        let view = handle.state(joined.token).await.unwrap();
        assert!(view.dogs[0].position.x > 0.5);

        handle.stop();
        task.await.unwrap();

        let calls = calls.lock().unwrap();
        assert!(calls.ticks.len() >= 10);
        assert_eq!(calls.shutdowns, 1);
    }

    #[tokio::test]
    async fn closed_loop_reports_closed() {
        let (world, _) = test_world(settings());
        let (handle, task) = spawn_world_loop(world, None, None);
        handle.stop();
        task.await.unwrap();

        assert!(matches!(handle.stats().await, Err(WorldError::Closed)));
    }
}

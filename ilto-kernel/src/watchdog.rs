/**
 * WATCHDOG SUPERVISOR - Redémarrage à froid du pipeline sur perte de heartbeat
 *
 * RÔLE :
 * Le Device Bridge publie un heartbeat tant que toute la chaîne tourne. Sans
 * heartbeat pendant `liveness_budget` ticks, les trois workers sont arrêtés
 * puis relancés ensemble.
 *
 * FONCTIONNEMENT :
 * - Begin + Start au lancement, compteur au budget
 * - heartbeat => compteur remis au budget
 * - tick (10 s) => compteur décrémenté ; à 0 : Killed, terminate_all, start_all
 * - après chaque tick : état publié sur `status/watchdog`
 * - signal d'arrêt => terminate_all + Exit
 */

use crate::liveness::LivenessCounter;
use crate::status_log::StatusLog;
use crate::workers::WorkerGroup;
use ilto_bus::{Bus, BusError, BusMessage, Topics};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant};
use tracing::{debug, info, warn};

/// Publié après chaque tick sur `status/watchdog`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchdogHealth {
    pub liveness: i64,
    pub restarts: u32,
    pub uptime_seconds: u64,
}

pub struct Supervisor<B> {
    bus: B,
    topics: Topics,
    group: WorkerGroup,
    counter: LivenessCounter,
    status_log: StatusLog,
    tick: Duration,
    restarts: u32,
    started_at: Instant,
}

impl<B: Bus> Supervisor<B> {
    pub fn new(
        bus: B,
        topics: Topics,
        group: WorkerGroup,
        budget: u32,
        tick: Duration,
        status_log: StatusLog,
    ) -> Self {
        Self {
            bus,
            topics,
            group,
            counter: LivenessCounter::new(budget),
            status_log,
            tick,
            restarts: 0,
            started_at: Instant::now(),
        }
    }

    pub async fn subscribe(&self) -> Result<(), BusError> {
        self.bus.subscribe(&self.topics.heartbeat).await
    }

    pub fn status_log(&self) -> &Path {
        self.status_log.path()
    }

    pub fn restarts(&self) -> u32 {
        self.restarts
    }

    pub fn health(&self) -> WatchdogHealth {
        WatchdogHealth {
            liveness: self.counter.remaining(),
            restarts: self.restarts,
            uptime_seconds: self.started_at.elapsed().as_secs(),
        }
    }

    /// Boucle de supervision ; ne rend la main qu'une fois `shutdown` résolu
    /// et les workers arrêtés.
    pub async fn run<F>(&mut self, mut heartbeats: mpsc::UnboundedReceiver<BusMessage>, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        self.status_log.begin();
        self.start_workers();

        let mut ticker = interval_at(Instant::now() + self.tick, self.tick);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                Some(msg) = heartbeats.recv() => self.on_message(&msg),
                _ = ticker.tick() => self.on_tick().await,
            }
        }

        info!("[watchdog] shutting down, terminating workers");
        self.group.terminate_all();
        self.status_log.exit();
    }

    fn on_message(&mut self, msg: &BusMessage) {
        if msg.topic == self.topics.heartbeat {
            debug!("[watchdog] heartbeat");
            self.counter.reset();
        }
    }

    async fn on_tick(&mut self) {
        if self.counter.tick() {
            warn!("[watchdog] no heartbeat for {} ticks, restarting all workers", self.counter.budget());
            self.status_log.killed();
            self.group.terminate_all();
            self.start_workers();
            self.restarts += 1;
        }
        self.publish_health().await;
    }

    fn start_workers(&mut self) {
        let handles = self.group.start_all();
        if handles.len() < self.group.len() {
            warn!("[watchdog] only {}/{} workers started", handles.len(), self.group.len());
        }
        for h in &handles {
            debug!("[watchdog] {} pid {} up since {}", h.role, h.pid, h.last_restart);
        }
        self.status_log.start(&handles);
        self.counter.reset();
    }

    async fn publish_health(&self) {
        let health = self.health();
        let payload = match serde_json::to_string(&health) {
            Ok(p) => p,
            Err(e) => {
                warn!("[watchdog] health not serialized: {e}");
                return;
            }
        };
        if let Err(e) = self.bus.publish(&self.topics.status_watchdog, &payload).await {
            warn!("[watchdog] health not published: {e}");
        }
    }
}

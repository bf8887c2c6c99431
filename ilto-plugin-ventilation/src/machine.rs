/**
 * OVERRIDE MACHINE - Override temporisé ventilation/boost avec restauration
 *
 * RÔLE :
 * Force temporairement l'appareil en ventilation (chauffage + régulation
 * coupés, vitesse max) ou en boost (vitesse max), puis restaure la
 * configuration observée avant l'override.
 *
 * FONCTIONNEMENT :
 * - Idle : la télémétrie (heating/mode/speed) met à jour le DeviceSnapshot
 * - V<d>/B<d> : snapshot, séquence de commandes, countdown de d ticks (100 ms)
 * - V0/B0 ou fin du countdown : restauration mode → speed → heating
 * - L/T/S pendant l'override (après 2.5 s) : intervention opérateur => V0
 *
 * CONCURRENCE :
 * Tout l'état (snapshot, session, stop du countdown) est derrière un seul
 * Mutex tokio, tenu pendant toute une transition, settle delays compris.
 */

use crate::countdown;
use crate::device::{DeviceSnapshot, FanSpeed, Heating, TelemetryField};
use crate::directive::{Directive, DirectiveError, OverrideKind};
use ilto_bus::{Bus, BusError, BusMessage, Topics};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct OverrideSettings {
    /// Pause après chaque commande appareil
    pub settle_delay: Duration,
    /// Période du countdown (1 tick = 1 déciseconde)
    pub tick: Duration,
    /// Publication du temps restant tous les N ticks
    pub status_every_ticks: u32,
    /// Fenêtre pendant laquelle L/T/S n'annulent pas l'override
    pub guard_ticks: u32,
}

impl Default for OverrideSettings {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(1),
            tick: Duration::from_millis(100),
            status_every_ticks: 100,
            guard_ticks: 25,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OverrideSession {
    pub id: u64,
    pub kind: OverrideKind,
    pub total_ticks: u32,
    pub remaining_ticks: u32,
    /// Configuration à restaurer, capturée au démarrage
    pub snapshot: DeviceSnapshot,
    pub restored: bool,
}

impl OverrideSession {
    pub fn elapsed_ticks(&self) -> u32 {
        self.total_ticks - self.remaining_ticks
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TickOutcome {
    Continue,
    Finished,
}

#[derive(Debug, Default)]
struct MachineState {
    snapshot: DeviceSnapshot,
    session: Option<OverrideSession>,
    countdown: Option<oneshot::Sender<()>>,
    last_session_id: u64,
}

impl MachineState {
    fn stop_countdown(&mut self) {
        if let Some(stop) = self.countdown.take() {
            // le countdown a pu se terminer seul : receiver déjà droppé
            let _ = stop.send(());
        }
    }
}

struct Inner<B> {
    bus: B,
    topics: Topics,
    settings: OverrideSettings,
    state: Mutex<MachineState>,
}

pub struct OverrideMachine<B> {
    inner: Arc<Inner<B>>,
}

impl<B> Clone for OverrideMachine<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: Bus> OverrideMachine<B> {
    pub fn new(bus: B, topics: Topics, settings: OverrideSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                bus,
                topics,
                settings,
                state: Mutex::new(MachineState::default()),
            }),
        }
    }

    pub(crate) fn settings(&self) -> &OverrideSettings {
        &self.inner.settings
    }

    /// Abonnement au topic `control` (y compris nos propres commandes) et à la télémétrie
    pub async fn subscribe(&self) -> Result<(), BusError> {
        let topics = &self.inner.topics;
        for filter in [
            &topics.control,
            &topics.telemetry_heating,
            &topics.telemetry_mode,
            &topics.telemetry_speed,
        ] {
            self.inner.bus.subscribe(filter).await?;
        }
        Ok(())
    }

    /// Demande au Device Bridge de republier l'état de l'appareil
    pub async fn request_refresh(&self) {
        self.command(Directive::Refresh).await;
    }

    /// Traite les messages un par un, dans l'ordre d'arrivée
    pub async fn run(&self, mut rx: mpsc::UnboundedReceiver<BusMessage>) {
        while let Some(msg) = rx.recv().await {
            self.handle(&msg).await;
        }
    }

    pub async fn handle(&self, msg: &BusMessage) {
        let Some(text) = msg.text() else {
            warn!("[ventilation] non UTF-8 payload on {}, dropped", msg.topic);
            return;
        };

        let topics = &self.inner.topics;
        let field = if msg.topic == topics.telemetry_heating {
            TelemetryField::Heating
        } else if msg.topic == topics.telemetry_mode {
            TelemetryField::Mode
        } else if msg.topic == topics.telemetry_speed {
            TelemetryField::Speed
        } else if msg.topic == topics.control {
            match text.parse::<Directive>() {
                Ok(directive) => self.on_directive(directive).await,
                Err(DirectiveError::Unknown(d)) => debug!("[ventilation] ignoring directive {d}"),
                Err(e) => warn!("[ventilation] {e}, dropped"),
            }
            return;
        } else {
            debug!("[ventilation] ignoring topic {}", msg.topic);
            return;
        };

        self.on_telemetry(field, text).await;
    }

    async fn on_directive(&self, directive: Directive) {
        match directive {
            Directive::Override { deciseconds: 0, .. } => self.cancel().await,
            Directive::Override { kind, deciseconds } => self.start(kind, deciseconds).await,
            Directive::Manual { .. } => self.on_manual(directive).await,
            Directive::Refresh => {}
        }
    }

    async fn on_telemetry(&self, field: TelemetryField, text: &str) {
        let mut state = self.inner.state.lock().await;
        if state.session.is_some() {
            debug!("[ventilation] {field:?} telemetry dropped during override");
            return;
        }
        match state.snapshot.apply(field, text) {
            Ok(()) => debug!("[ventilation] snapshot now {:?}", state.snapshot),
            Err(e) => warn!("[ventilation] {e}, dropped"),
        }
    }

    async fn start(&self, kind: OverrideKind, deciseconds: u32) {
        let mut state = self.inner.state.lock().await;
        state.stop_countdown();

        // l'ancien topic de statut doit retomber à 0 s'il n'est pas réutilisé
        if let Some(old) = state.session.as_ref().filter(|s| !s.restored && s.kind != kind) {
            let old_kind = old.kind;
            self.publish_status(old_kind, 0).await;
        }

        // la télémétrie est ignorée pendant un override : si une session est
        // remplacée, le snapshot reste celui d'avant le premier override
        let snapshot = state.snapshot;
        state.last_session_id += 1;
        let id = state.last_session_id;
        state.session = Some(OverrideSession {
            id,
            kind,
            total_ticks: deciseconds,
            remaining_ticks: deciseconds,
            snapshot,
            restored: false,
        });
        info!("[ventilation] {kind:?} override for {deciseconds} ticks (session {id})");

        if kind == OverrideKind::Ventilation {
            self.command(Directive::heating(Heating::Off)).await;
            self.settle().await;
            self.command(Directive::mode(0)).await;
            self.settle().await;
        }
        self.command(Directive::speed(FanSpeed::High)).await;

        let (stop_tx, stop_rx) = oneshot::channel();
        state.countdown = Some(stop_tx);
        tokio::spawn(countdown::run(self.clone(), id, stop_rx));

        self.publish_status(kind, deciseconds).await;
        self.command(Directive::Refresh).await;
    }

    async fn cancel(&self) {
        let mut state = self.inner.state.lock().await;
        self.restore_locked(&mut state).await;
    }

    async fn restore_locked(&self, state: &mut MachineState) {
        let Some(session) = state.session.as_mut() else {
            debug!("[ventilation] cancel while idle ignored");
            return;
        };
        if session.restored {
            return;
        }
        session.restored = true;
        let (id, kind, snapshot) = (session.id, session.kind, session.snapshot);
        state.stop_countdown();

        info!("[ventilation] restoring {snapshot:?} (session {id})");
        self.publish_status(kind, 0).await;

        // ordre imposé : jamais de vitesse haute avec chauffage encore actif
        self.command(Directive::mode(snapshot.mode)).await;
        self.settle().await;
        self.command(Directive::speed(snapshot.speed)).await;
        self.settle().await;
        self.command(Directive::heating(snapshot.heating)).await;
        self.settle().await;
        self.command(Directive::Refresh).await;

        state.session = None;
    }

    async fn on_manual(&self, directive: Directive) {
        let state = self.inner.state.lock().await;
        let Some(session) = state.session.as_ref().filter(|s| !s.restored) else {
            return;
        };

        if session.elapsed_ticks() > self.inner.settings.guard_ticks {
            info!("[ventilation] manual {directive} during override, cancelling");
            drop(state);
            self.command(Directive::stop()).await;
        } else {
            debug!("[ventilation] manual {directive} inside guard window, ignored");
        }
    }

    pub(crate) async fn tick(&self, session_id: u64) -> TickOutcome {
        let mut state = self.inner.state.lock().await;
        let Some(session) = state.session.as_mut() else {
            return TickOutcome::Finished;
        };
        if session.id != session_id || session.restored {
            return TickOutcome::Finished;
        }

        session.remaining_ticks = session.remaining_ticks.saturating_sub(1);
        let (kind, remaining) = (session.kind, session.remaining_ticks);

        if remaining == 0 {
            info!("[ventilation] {kind:?} override expired (session {session_id})");
            self.command(Directive::stop()).await;
            self.restore_locked(&mut state).await;
            return TickOutcome::Finished;
        }
        // d - 100k tant que positif
        if session.elapsed_ticks() % self.inner.settings.status_every_ticks == 0 {
            self.publish_status(kind, remaining).await;
        }
        TickOutcome::Continue
    }

    /// Session en cours (None = Idle)
    pub async fn session(&self) -> Option<OverrideSession> {
        self.inner.state.lock().await.session.clone()
    }

    pub async fn snapshot(&self) -> DeviceSnapshot {
        self.inner.state.lock().await.snapshot
    }

    async fn command(&self, directive: Directive) {
        let payload = directive.to_string();
        if let Err(e) = self.inner.bus.publish(&self.inner.topics.control, &payload).await {
            warn!("[ventilation] command {payload} not sent: {e}");
        }
    }

    async fn publish_status(&self, kind: OverrideKind, remaining: u32) {
        let topic = match kind {
            OverrideKind::Ventilation => &self.inner.topics.status_ventilation,
            OverrideKind::Boost => &self.inner.topics.status_boost,
        };
        if let Err(e) = self.inner.bus.publish(topic, &remaining.to_string()).await {
            warn!("[ventilation] status not published: {e}");
        }
    }

    async fn settle(&self) {
        tokio::time::sleep(self.inner.settings.settle_delay).await;
    }
}

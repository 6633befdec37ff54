//! Async driver for [`AlarmMonitor`]: the recurring tick plus background refreshes.
//!
//! One task owns the state machine. Store calls run on spawned tasks and
//! report back over channels, so a tick never waits on the network.

use std::future::pending;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::state::{AlarmMonitor, DueAlarm, MonitorState};
use crate::config::MonitorConfig;
use crate::error::{CalarmError, CalarmResult};
use crate::event::{Event, NewEvent};
use crate::store::CalendarStore;
use crate::window::AlarmWindow;

const MIN_PERIOD: Duration = Duration::from_millis(100);

/// Source of "now" for the monitor.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone)]
pub struct MonitorOptions {
    pub tick_interval: Duration,
    /// `None` refreshes only on start, after a snooze and on request
    pub refresh_interval: Option<Duration>,
    /// How far ahead of now candidates are fetched
    pub lookahead: chrono::Duration,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        MonitorOptions::from(&MonitorConfig::default())
    }
}

impl From<&MonitorConfig> for MonitorOptions {
    fn from(config: &MonitorConfig) -> Self {
        MonitorOptions {
            tick_interval: Duration::from_secs(config.tick_interval_secs.max(1)),
            refresh_interval: (config.refresh_interval_secs > 0)
                .then(|| Duration::from_secs(config.refresh_interval_secs)),
            lookahead: chrono::Duration::try_days(config.lookahead_days)
                .unwrap_or(chrono::Duration::MAX),
        }
    }
}

/// Notifications published by a running monitor.
#[derive(Debug, Clone)]
pub enum MonitorEvent {
    AlarmDue(DueAlarm),
    Dismissed(DueAlarm),
    Snoozed { original: DueAlarm, created: Event },
}

/// Point-in-time view of the monitor's state.
#[derive(Debug, Clone)]
pub struct MonitorSnapshot {
    pub state: MonitorState,
    pub fired: Vec<String>,
    pub candidates: Vec<Event>,
}

enum Command {
    Dismiss(oneshot::Sender<CalarmResult<DueAlarm>>),
    Snooze {
        minutes: u32,
        reply: oneshot::Sender<CalarmResult<Event>>,
    },
    Refresh,
    Snapshot(oneshot::Sender<MonitorSnapshot>),
}

struct FetchResult {
    generation: u64,
    result: CalarmResult<Vec<Event>>,
}

struct SnoozeResult {
    result: CalarmResult<Event>,
    reply: oneshot::Sender<CalarmResult<Event>>,
}

/// Handle to a monitor running on a tokio task.
///
/// Dropping the handle stops the monitor.
pub struct MonitorHandle {
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<MonitorEvent>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl MonitorHandle {
    pub fn spawn<S, C>(store: S, clock: C, options: MonitorOptions) -> Self
    where
        S: CalendarStore + 'static,
        C: Clock,
    {
        let (commands, command_rx) = mpsc::channel(16);
        let (events, _) = broadcast::channel(64);
        let cancel = CancellationToken::new();

        let driver = Driver {
            monitor: AlarmMonitor::new(),
            store: Arc::new(store),
            clock: Arc::new(clock),
            options,
            events: events.clone(),
            generation: 0,
            applied_generation: 0,
        };
        let task = tokio::spawn(driver.run(command_rx, cancel.clone()));

        MonitorHandle {
            commands,
            events,
            cancel,
            task: Some(task),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.events.subscribe()
    }

    pub async fn dismiss(&self) -> CalarmResult<DueAlarm> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Dismiss(reply)).await?;
        rx.await.map_err(|_| CalarmError::MonitorClosed)?
    }

    /// Snooze the presented alarm. Resolves once the reminder event is created
    /// (or its creation failed, in which case the alarm stays presented).
    pub async fn snooze(&self, minutes: u32) -> CalarmResult<Event> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Snooze { minutes, reply }).await?;
        rx.await.map_err(|_| CalarmError::MonitorClosed)?
    }

    /// Queue a background refresh of the candidate list.
    pub async fn refresh(&self) -> CalarmResult<()> {
        self.send(Command::Refresh).await
    }

    pub async fn snapshot(&self) -> CalarmResult<MonitorSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Snapshot(reply)).await?;
        rx.await.map_err(|_| CalarmError::MonitorClosed)
    }

    /// Stop the monitor and wait for its task to finish.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "alarm monitor task did not stop cleanly");
            }
        }
    }

    async fn send(&self, command: Command) -> CalarmResult<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| CalarmError::MonitorClosed)
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct Driver<S, C> {
    monitor: AlarmMonitor,
    store: Arc<S>,
    clock: Arc<C>,
    options: MonitorOptions,
    events: broadcast::Sender<MonitorEvent>,
    generation: u64,
    applied_generation: u64,
}

impl<S, C> Driver<S, C>
where
    S: CalendarStore + 'static,
    C: Clock,
{
    async fn run(mut self, mut commands: mpsc::Receiver<Command>, cancel: CancellationToken) {
        let (fetch_tx, mut fetch_rx) = mpsc::channel::<FetchResult>(4);
        let (snooze_tx, mut snooze_rx) = mpsc::channel::<SnoozeResult>(4);

        let mut tick = interval(self.options.tick_interval.max(MIN_PERIOD));
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut refresh = self.options.refresh_interval.map(|period| {
            let mut refresh = interval(period.max(MIN_PERIOD));
            refresh.set_missed_tick_behavior(MissedTickBehavior::Skip);
            refresh
        });

        // The periodic refresh's immediate first tick doubles as the initial fetch
        if refresh.is_none() {
            self.spawn_refresh(&fetch_tx);
        }

        info!(tick_secs = self.options.tick_interval.as_secs(), "alarm monitor started");

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                Some(fetched) = fetch_rx.recv() => self.apply_fetch(fetched),
                Some(snoozed) = snooze_rx.recv() => self.finish_snooze(snoozed, &fetch_tx),
                command = commands.recv() => match command {
                    Some(command) => self.handle(command, &fetch_tx, &snooze_tx),
                    None => break,
                },
                _ = tick.tick() => self.tick(),
                () = next_refresh(&mut refresh) => self.spawn_refresh(&fetch_tx),
            }
        }

        debug!("alarm monitor stopped");
    }

    fn tick(&mut self) {
        let now = self.clock.now();
        if let Some(due) = self.monitor.tick(now) {
            info!(
                uid = %due.event.uid,
                summary = %due.event.summary,
                fire_instant = %due.fire_instant,
                "alarm due"
            );
            let _ = self.events.send(MonitorEvent::AlarmDue(due));
        }
    }

    fn handle(
        &mut self,
        command: Command,
        fetch_tx: &mpsc::Sender<FetchResult>,
        snooze_tx: &mpsc::Sender<SnoozeResult>,
    ) {
        match command {
            Command::Dismiss(reply) => {
                let result = self.monitor.dismiss();
                if let Ok(due) = &result {
                    info!(uid = %due.event.uid, "alarm dismissed");
                    let _ = self.events.send(MonitorEvent::Dismissed(due.clone()));
                }
                let _ = reply.send(result);
            }
            Command::Snooze { minutes, reply } => {
                match self.monitor.begin_snooze(minutes, self.clock.now()) {
                    Ok(request) => self.spawn_snooze(request, reply, snooze_tx),
                    Err(e) => {
                        let _ = reply.send(Err(e));
                    }
                }
            }
            Command::Refresh => self.spawn_refresh(fetch_tx),
            Command::Snapshot(reply) => {
                let _ = reply.send(MonitorSnapshot {
                    state: self.monitor.state().clone(),
                    fired: self.monitor.fired().iter().map(str::to_string).collect(),
                    candidates: self.monitor.candidates().to_vec(),
                });
            }
        }
    }

    fn spawn_refresh(&mut self, fetch_tx: &mpsc::Sender<FetchResult>) {
        let now = self.clock.now();
        self.generation += 1;
        let generation = self.generation;

        let store = Arc::clone(&self.store);
        let fetch_tx = fetch_tx.clone();
        let window = now
            .checked_add_signed(self.options.lookahead)
            .ok_or_else(|| CalarmError::InvalidWindow("lookahead is out of range".into()))
            .and_then(|to| AlarmWindow::new(now, to));

        tokio::spawn(async move {
            let result = match window {
                Ok(window) => store.list_events(window.into()).await,
                Err(e) => Err(e),
            };
            let _ = fetch_tx.send(FetchResult { generation, result }).await;
        });
    }

    fn apply_fetch(&mut self, fetched: FetchResult) {
        // A slower, older fetch must not overwrite a newer one
        if fetched.generation <= self.applied_generation {
            debug!(generation = fetched.generation, "discarding stale fetch");
            return;
        }

        match fetched.result {
            Ok(events) => {
                self.applied_generation = fetched.generation;
                self.monitor.replace_candidates(events, self.clock.now());
                debug!(candidates = self.monitor.candidates().len(), "alarm candidates refreshed");
            }
            Err(e) => {
                warn!(
                    error = %e,
                    candidates = self.monitor.candidates().len(),
                    "alarm refresh failed, keeping previous candidates"
                );
            }
        }
    }

    fn spawn_snooze(
        &self,
        request: NewEvent,
        reply: oneshot::Sender<CalarmResult<Event>>,
        snooze_tx: &mpsc::Sender<SnoozeResult>,
    ) {
        let store = Arc::clone(&self.store);
        let snooze_tx = snooze_tx.clone();

        tokio::spawn(async move {
            let result = store.create_event(request).await;
            let _ = snooze_tx.send(SnoozeResult { result, reply }).await;
        });
    }

    fn finish_snooze(&mut self, snoozed: SnoozeResult, fetch_tx: &mpsc::Sender<FetchResult>) {
        let SnoozeResult { result, reply } = snoozed;

        match result {
            Ok(created) => match self.monitor.complete_snooze() {
                Ok(original) => {
                    info!(uid = %original.event.uid, created = %created.uid, "alarm snoozed");
                    let _ = self.events.send(MonitorEvent::Snoozed {
                        original,
                        created: created.clone(),
                    });
                    let _ = reply.send(Ok(created));
                    self.spawn_refresh(fetch_tx);
                }
                Err(e) => {
                    let _ = reply.send(Err(e));
                }
            },
            Err(e) => {
                warn!(error = %e, "snooze event creation failed, alarm stays active");
                self.monitor.abort_snooze();
                let _ = reply.send(Err(e));
            }
        }
    }
}

async fn next_refresh(refresh: &mut Option<Interval>) {
    match refresh {
        Some(interval) => {
            interval.tick().await;
        }
        None => pending().await,
    }
}

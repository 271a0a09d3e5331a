//! Tokio plumbing around the engine.
//!
//! One task owns the [`GameEngine`]. Requests and timer expiries are both
//! funnelled into that task, so every mutation runs on a single logical
//! thread and a timer can never race a host command.

use chrono::{DateTime, Utc};
use derive_more::Display;
use housie_engine::{
    Actor, Broadcaster, Clock, EngineConfig, GameEngine, GameError, GameEvent, GameState,
    ScheduledTimer, TicketId, TimerDriver, TimerPurpose,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, instrument, trace, warn};

/// Queued requests before callers start waiting.
pub const JOB_QUEUE_DEPTH: usize = 64;
/// Events a slow subscriber may fall behind before it starts lagging.
pub const EVENT_BUFFER: usize = 256;

type Job = Box<dyn FnOnce(&mut GameEngine) + Send>;

/// Wall clock driven by tokio's monotonic time.
///
/// Follows `tokio::time::pause` and `advance`, so paused-time tests see the
/// same timestamps the timers use.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    base: DateTime<Utc>,
    origin: Instant,
}

impl TokioClock {
    /// Anchors the clock at the current wall time.
    pub fn new() -> Self {
        Self::anchored_at(Utc::now())
    }

    /// Anchors the clock at `base`.
    pub fn anchored_at(base: DateTime<Utc>) -> Self {
        Self {
            base,
            origin: Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = Instant::now().saturating_duration_since(self.origin);
        self.base
            + chrono::TimeDelta::from_std(elapsed).unwrap_or_else(|_| chrono::TimeDelta::zero())
    }
}

/// Timer driver backed by `tokio::time::sleep`.
///
/// Expired timers are sent back to the owning task; at most one sleep per
/// purpose is alive at any time.
#[derive(Debug)]
pub struct TokioTimers {
    fired: mpsc::UnboundedSender<ScheduledTimer>,
    tasks: HashMap<TimerPurpose, JoinHandle<()>>,
}

impl TokioTimers {
    /// Creates a driver that reports expiries on `fired`.
    pub fn new(fired: mpsc::UnboundedSender<ScheduledTimer>) -> Self {
        Self {
            fired,
            tasks: HashMap::new(),
        }
    }
}

impl TimerDriver for TokioTimers {
    fn arm(&mut self, timer: ScheduledTimer, delay: Duration) {
        let fired = self.fired.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if fired.send(timer).is_err() {
                debug!(purpose = %timer.purpose, "Game host gone, dropping timer");
            }
        });
        if let Some(previous) = self.tasks.insert(timer.purpose, task) {
            previous.abort();
        }
    }

    fn cancel(&mut self, purpose: TimerPurpose) {
        if let Some(task) = self.tasks.remove(&purpose) {
            task.abort();
        }
    }
}

impl Drop for TokioTimers {
    fn drop(&mut self) {
        for (_, task) in self.tasks.drain() {
            task.abort();
        }
    }
}

/// Fans engine events out to every WebSocket subscriber.
#[derive(Debug, Clone)]
pub struct ChannelBroadcaster {
    tx: broadcast::Sender<GameEvent>,
}

impl ChannelBroadcaster {
    /// Wraps an existing broadcast sender.
    pub fn new(tx: broadcast::Sender<GameEvent>) -> Self {
        Self { tx }
    }
}

impl Broadcaster for ChannelBroadcaster {
    fn publish(&self, event: GameEvent) {
        // Send only fails when nobody is listening.
        if self.tx.send(event).is_err() {
            trace!("No subscribers for event");
        }
    }
}

/// Failure to run a request against the live game.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum HostError {
    /// The engine rejected the operation.
    #[display("{}", _0)]
    Game(GameError),
    /// The game host task has stopped.
    #[display("Game host is not running")]
    Closed,
}

impl From<GameError> for HostError {
    fn from(err: GameError) -> Self {
        HostError::Game(err)
    }
}

impl std::error::Error for HostError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HostError::Game(err) => Some(err),
            HostError::Closed => None,
        }
    }
}

/// Owns the engine task.
#[derive(Debug)]
pub struct GameHost;

impl GameHost {
    /// Spawns the engine task and returns a handle to it.
    ///
    /// The task stops once every [`GameHandle`] is dropped.
    #[instrument(skip_all)]
    pub fn spawn(config: EngineConfig) -> GameHandle {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let (jobs_tx, jobs_rx) = mpsc::channel::<Job>(JOB_QUEUE_DEPTH);
        let (fired_tx, fired_rx) = mpsc::unbounded_channel();

        let engine = GameEngine::new(
            config,
            Arc::new(TokioClock::new()),
            Box::new(TokioTimers::new(fired_tx)),
            Arc::new(ChannelBroadcaster::new(events.clone())),
        );
        tokio::spawn(Self::run(engine, jobs_rx, fired_rx));
        info!("Game host started");

        GameHandle {
            jobs: jobs_tx,
            events,
        }
    }

    async fn run(
        mut engine: GameEngine,
        mut jobs: mpsc::Receiver<Job>,
        mut fired: mpsc::UnboundedReceiver<ScheduledTimer>,
    ) {
        loop {
            tokio::select! {
                job = jobs.recv() => match job {
                    Some(job) => job(&mut engine),
                    None => break,
                },
                Some(timer) = fired.recv() => {
                    debug!(purpose = %timer.purpose, token = %timer.token, "Timer fired");
                    engine.on_timer(timer);
                }
            }
        }
        info!("Game host stopped");
    }
}

/// Cloneable access to the live game.
#[derive(Debug, Clone)]
pub struct GameHandle {
    jobs: mpsc::Sender<Job>,
    events: broadcast::Sender<GameEvent>,
}

impl GameHandle {
    /// Runs `f` on the engine task and returns its result.
    pub async fn with_engine<R, F>(&self, f: F) -> Result<R, HostError>
    where
        R: Send + 'static,
        F: FnOnce(&mut GameEngine) -> R + Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job: Job = Box::new(move |engine| {
            // The caller may have given up waiting.
            let _ = reply_tx.send(f(engine));
        });
        self.jobs.send(job).await.map_err(|_| HostError::Closed)?;
        reply_rx.await.map_err(|_| HostError::Closed)
    }

    /// Runs an engine operation and returns the state it left behind.
    pub async fn apply<F>(&self, op: F) -> Result<GameState, HostError>
    where
        F: FnOnce(&mut GameEngine) -> Result<(), GameError> + Send + 'static,
    {
        self.with_engine(move |engine| op(engine).map(|()| engine.state().clone()))
            .await?
            .map_err(HostError::from)
    }

    /// Current state.
    pub async fn snapshot(&self) -> Result<GameState, HostError> {
        self.with_engine(|engine| engine.state().clone()).await
    }

    /// Subscribes to events without a starting snapshot.
    pub fn subscribe(&self) -> broadcast::Receiver<GameEvent> {
        self.events.subscribe()
    }

    /// Subscribes and captures the state at the same instant.
    ///
    /// Every event on the receiver happened after the returned snapshot.
    pub async fn subscribe_with_snapshot(
        &self,
    ) -> Result<(GameState, broadcast::Receiver<GameEvent>), HostError> {
        let events = self.events.clone();
        self.with_engine(move |engine| (engine.state().clone(), events.subscribe()))
            .await
    }

    /// See [`GameEngine::create_game`].
    ///
    /// Warns when part of the deal fell back to the fixed layout.
    pub async fn create_game(
        &self,
        actor: Actor,
        ticket_count: usize,
    ) -> Result<GameState, HostError> {
        self.apply(move |engine| {
            let before = engine.generation_fallbacks();
            engine.create_game(actor, ticket_count)?;
            let fallbacks = engine.generation_fallbacks() - before;
            if fallbacks > 0 {
                warn!(fallbacks, ticket_count, "Tickets dealt with the fallback layout");
            }
            Ok(())
        })
        .await
    }

    /// See [`GameEngine::set_draw_sequence`].
    pub async fn set_draw_sequence(
        &self,
        actor: Actor,
        sequence: Vec<i64>,
    ) -> Result<GameState, HostError> {
        self.apply(move |engine| engine.set_draw_sequence(actor, sequence))
            .await
    }

    /// Like [`GameHandle::set_draw_sequence`], parsing comma or space separated text.
    pub async fn set_draw_sequence_text(
        &self,
        actor: Actor,
        text: String,
    ) -> Result<GameState, HostError> {
        self.apply(move |engine| engine.set_draw_sequence(actor, text.as_str()))
            .await
    }

    /// See [`GameEngine::book_ticket`].
    pub async fn book_ticket(
        &self,
        actor: Actor,
        ticket_id: TicketId,
        player_name: String,
    ) -> Result<GameState, HostError> {
        self.apply(move |engine| engine.book_ticket(actor, &ticket_id, &player_name))
            .await
    }

    /// See [`GameEngine::edit_booking`].
    pub async fn edit_booking(
        &self,
        actor: Actor,
        ticket_id: TicketId,
        player_name: String,
    ) -> Result<GameState, HostError> {
        self.apply(move |engine| engine.edit_booking(actor, &ticket_id, &player_name))
            .await
    }

    /// See [`GameEngine::unbook_ticket`].
    pub async fn unbook_ticket(
        &self,
        actor: Actor,
        ticket_id: TicketId,
    ) -> Result<GameState, HostError> {
        self.apply(move |engine| engine.unbook_ticket(actor, &ticket_id))
            .await
    }

    /// See [`GameEngine::request_pending_booking`].
    pub async fn request_pending_booking(
        &self,
        actor: Actor,
        ticket_id: TicketId,
        player_name: String,
    ) -> Result<GameState, HostError> {
        self.apply(move |engine| engine.request_pending_booking(actor, &ticket_id, &player_name))
            .await
    }

    /// See [`GameEngine::confirm_pending`].
    pub async fn confirm_pending(
        &self,
        actor: Actor,
        ticket_id: TicketId,
    ) -> Result<GameState, HostError> {
        self.apply(move |engine| engine.confirm_pending(actor, &ticket_id))
            .await
    }

    /// See [`GameEngine::cancel_pending`].
    pub async fn cancel_pending(
        &self,
        actor: Actor,
        ticket_id: TicketId,
    ) -> Result<GameState, HostError> {
        self.apply(move |engine| engine.cancel_pending(actor, &ticket_id))
            .await
    }

    /// See [`GameEngine::start_countdown`].
    pub async fn start_countdown(
        &self,
        actor: Actor,
        seconds: u64,
    ) -> Result<GameState, HostError> {
        self.apply(move |engine| engine.start_countdown(actor, seconds))
            .await
    }

    /// See [`GameEngine::reset_game`].
    pub async fn reset_game(&self, actor: Actor) -> Result<GameState, HostError> {
        self.apply(move |engine| engine.reset_game(actor)).await
    }
}

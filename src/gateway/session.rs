use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::connection::{FrameReader, FrameWriter, InboundFrame};
use super::dispatcher::MessageRouter;
use super::events::{close_code, ServerFrame};
use super::heartbeat::Liveness;
use super::hub::{HubHandle, SessionHandle, SessionId};
use crate::models::message::{Envelope, UserId};

pub const DEFAULT_OUTBOUND_CAPACITY: usize = 256;

/// How long the outbound pump waits for a close handshake on a stuck socket.
const CLOSE_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    Connecting = 0,
    Active = 1,
    Closing = 2,
    Closed = 3,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SessionState::Connecting,
            1 => SessionState::Active,
            2 => SessionState::Closing,
            _ => SessionState::Closed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    ClientClosed,
    TransportError,
    SlowConsumer,
    IdleTimeout,
    HubShutdown,
}

impl CloseReason {
    pub fn close_code(&self) -> u16 {
        match self {
            CloseReason::ClientClosed | CloseReason::TransportError => close_code::NORMAL,
            CloseReason::SlowConsumer => close_code::SLOW_CONSUMER,
            CloseReason::IdleTimeout => close_code::SESSION_TIMED_OUT,
            CloseReason::HubShutdown => close_code::GOING_AWAY,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            CloseReason::ClientClosed => "closed",
            CloseReason::TransportError => "transport error",
            CloseReason::SlowConsumer => "slow consumer",
            CloseReason::IdleTimeout => "session timed out",
            CloseReason::HubShutdown => "server shutting down",
        }
    }
}

/// Shared state machine for one session, `connecting → active → closing →
/// closed`. The first close reason recorded wins.
#[derive(Debug)]
pub struct Lifecycle {
    state: AtomicU8,
    reason: OnceLock<CloseReason>,
    shutdown: CancellationToken,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(SessionState::Connecting as u8),
            reason: OnceLock::new(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn close_reason(&self) -> Option<CloseReason> {
        self.reason.get().copied()
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.shutdown.cancelled().await
    }

    /// `connecting → active`. False if the session started closing first.
    pub fn activate(&self) -> bool {
        self.state
            .compare_exchange(
                SessionState::Connecting as u8,
                SessionState::Active as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Move to `closing` and stop both pumps. Returns true for the call that
    /// made the transition; later calls are no-ops.
    pub fn close(&self, reason: CloseReason) -> bool {
        let _ = self.reason.set(reason);
        let mut current = self.state.load(Ordering::Acquire);
        let transitioned = loop {
            if current >= SessionState::Closing as u8 {
                break false;
            }
            match self.state.compare_exchange(
                current,
                SessionState::Closing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break true,
                Err(actual) => current = actual,
            }
        };
        self.shutdown.cancel();
        transitioned
    }

    /// `closing → closed`. True exactly once per session.
    fn finish(&self) -> bool {
        self.state
            .compare_exchange(
                SessionState::Closing as u8,
                SessionState::Closed as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    pub outbound_capacity: usize,
    pub liveness: Liveness,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
            liveness: Liveness::default(),
        }
    }
}

/// One client connection: an inbound pump, an outbound pump and the bounded
/// queue the hub fills.
pub struct ClientSession {
    id: SessionId,
    user_id: UserId,
    lifecycle: Arc<Lifecycle>,
    hub: HubHandle,
    router: MessageRouter,
    settings: SessionSettings,
}

impl ClientSession {
    pub fn new(
        user_id: UserId,
        hub: HubHandle,
        router: MessageRouter,
        settings: SessionSettings,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            lifecycle: Arc::new(Lifecycle::new()),
            hub,
            router,
            settings,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn lifecycle(&self) -> Arc<Lifecycle> {
        self.lifecycle.clone()
    }

    /// Register with the hub, run both pumps until either side ends the
    /// session, then tear down. Returns once the connection is closed.
    pub async fn run<R: FrameReader, W: FrameWriter>(self, reader: R, mut writer: W) {
        let (tx, rx) = mpsc::channel(self.settings.outbound_capacity.max(1));
        let handle = SessionHandle::new(self.id, self.user_id, tx, self.lifecycle.clone());

        if self.hub.register(handle).await.is_err() {
            self.lifecycle.close(CloseReason::HubShutdown);
            let reason = CloseReason::HubShutdown;
            writer.close(reason.close_code(), reason.description()).await;
            self.lifecycle.finish();
            return;
        }
        self.lifecycle.activate();
        tracing::info!(user_id = self.user_id, session_id = %self.id, "session connected");

        let writer_task = tokio::spawn(outbound_pump(
            writer,
            rx,
            self.lifecycle.clone(),
            self.settings.liveness.ping_interval,
        ));

        let reason = self.inbound_pump(reader).await;
        self.lifecycle.close(reason);

        // Runs once per session; a hub-initiated eviction already removed
        // the entry, in which case this is a no-op.
        let _ = self.hub.unregister(self.user_id, self.id).await;

        if let Err(e) = writer_task.await {
            tracing::error!(session_id = %self.id, "outbound pump panicked: {e}");
        }
        self.lifecycle.finish();
        tracing::info!(
            user_id = self.user_id,
            session_id = %self.id,
            reason = self.lifecycle.close_reason().map(|r| r.description()).unwrap_or("closed"),
            "session closed"
        );
    }

    async fn inbound_pump<R: FrameReader>(&self, mut reader: R) -> CloseReason {
        let liveness = self.settings.liveness;
        let mut idle_check = liveness.ping_interval.map(ticker);
        let mut last_read = Instant::now();

        loop {
            tokio::select! {
                _ = self.lifecycle.cancelled() => {
                    return self.lifecycle.close_reason().unwrap_or(CloseReason::ClientClosed);
                }
                _ = tick(&mut idle_check) => {
                    if last_read.elapsed() > liveness.idle_timeout {
                        tracing::debug!(session_id = %self.id, "no frames within idle timeout");
                        return CloseReason::IdleTimeout;
                    }
                }
                frame = reader.read_frame() => match frame {
                    Ok(Some(InboundFrame::Text(text))) => {
                        last_read = Instant::now();
                        self.handle_text(&text).await;
                    }
                    Ok(Some(InboundFrame::Control)) => {
                        last_read = Instant::now();
                    }
                    Ok(None) => return CloseReason::ClientClosed,
                    Err(e) => {
                        tracing::debug!(session_id = %self.id, "read failed: {e}");
                        return CloseReason::TransportError;
                    }
                },
            }
        }
    }

    /// Decode and route one text frame. Bad frames are reported back to
    /// this session and otherwise ignored.
    async fn handle_text(&self, text: &str) {
        let mut envelope = match serde_json::from_str::<Envelope>(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::debug!(session_id = %self.id, "malformed frame: {e}");
                self.report("invalid_request", format!("malformed message: {e}"))
                    .await;
                return;
            }
        };

        if envelope.sender_id != 0 && envelope.sender_id != self.user_id {
            tracing::debug!(
                session_id = %self.id,
                claimed = envelope.sender_id,
                "sender id overridden with session user"
            );
        }
        envelope.sender_id = self.user_id;

        let message = match envelope.into_new_message() {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!(session_id = %self.id, "rejected frame: {e}");
                self.report("invalid_request", e.to_string()).await;
                return;
            }
        };

        if let Err(e) = self.router.route(message).await {
            self.report(e.code(), e.message()).await;
        }
    }

    async fn report(&self, code: &'static str, message: String) {
        let _ = self
            .hub
            .reply(self.user_id, self.id, ServerFrame::error(code, message))
            .await;
    }
}

async fn outbound_pump<W: FrameWriter>(
    mut writer: W,
    mut rx: mpsc::Receiver<ServerFrame>,
    lifecycle: Arc<Lifecycle>,
    ping_interval: Option<Duration>,
) {
    let mut ping = ping_interval.map(ticker);

    loop {
        tokio::select! {
            biased;
            _ = lifecycle.cancelled() => break,
            frame = rx.recv() => {
                let Some(frame) = frame else {
                    // The hub dropped our sender: we were evicted.
                    break;
                };
                let result = tokio::select! {
                    result = writer.write_frame(frame.to_json()) => result,
                    _ = lifecycle.cancelled() => break,
                };
                if let Err(e) = result {
                    tracing::debug!("write failed: {e}");
                    lifecycle.close(CloseReason::TransportError);
                    break;
                }
            }
            _ = tick(&mut ping) => {
                if let Err(e) = writer.ping().await {
                    tracing::debug!("ping failed: {e}");
                    lifecycle.close(CloseReason::TransportError);
                    break;
                }
            }
        }
    }

    let reason = lifecycle.close_reason().unwrap_or(CloseReason::ClientClosed);
    lifecycle.close(reason);
    let _ = tokio::time::timeout(
        CLOSE_GRACE,
        writer.close(reason.close_code(), reason.description()),
    )
    .await;
}

fn ticker(period: Duration) -> Interval {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

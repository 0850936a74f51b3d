//! Per-endpoint session: owns the transport for its lifetime, tracks
//! position/battery/availability, infers movement, and exposes the command
//! surface the host integrates against. Inbound frames flow from the
//! transport's channel through one consumer task into the shared state.

use crate::constants::{
    DEFAULT_STATUS_RETRIES, DEVICE_PORT, POLL_FAST, POLL_NORMAL, RESPONSE_WAIT, RETRY_PAUSE,
    SET_POSITION_FOLLOW_UP, STATUS_RATE_LIMIT,
};
use crate::error::ShadeError;
use crate::liveness::{Liveness, Transition};
use crate::message::{Command, LimitType, Reply, StatusReport};
use crate::movement::MovementTracker;
use crate::packet::{Frame, SequenceCounter};
use crate::transport::{Datagram, Transport};
use bytes::Bytes;
use parking_lot::Mutex;
use serde::Serialize;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, info, warn};

/// Bounded wait for the reply consumer to drain on shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Identity of one shade controller, from discovery or manual entry. The
/// serial, when known, is the stable key; the IP may change under DHCP.
#[derive(Debug, Clone)]
pub struct DeviceIdentity {
    pub ip: IpAddr,
    pub serial: Option<u64>,
    pub model: Option<u8>,
    pub name: Option<String>,
}

/// Point-in-time view of session state handed to observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateSnapshot {
    pub position: Option<u8>,
    pub battery_millivolts: Option<u32>,
    pub battery_percentage: Option<u8>,
    pub available: bool,
    pub is_opening: bool,
    pub is_closing: bool,
}

type Observer = Arc<dyn Fn(&StateSnapshot) + Send + Sync>;

/// What a toggle should do given the current session state, in precedence
/// order: stop movement first, then pick a direction from position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleAction {
    Stop,
    Open,
    Close,
    NoOp,
}

/// Decide the toggle outcome. Pure so the ladder is testable on its own.
pub fn decide_toggle(position: Option<u8>, opening: bool, closing: bool) -> ToggleAction {
    if opening || closing {
        return ToggleAction::Stop;
    }
    match position {
        Some(100) => ToggleAction::Close,
        Some(0) => ToggleAction::Open,
        None => ToggleAction::NoOp,
        Some(p) if p > 50 => ToggleAction::Close,
        Some(_) => ToggleAction::Open,
    }
}

/// Battery percent from voltage: 3.0 V empty, 4.2 V full, linear between.
pub fn battery_percentage(millivolts: u32) -> u8 {
    let volts = millivolts as f64 / 1000.0;
    if volts <= 3.0 {
        0
    } else if volts >= 4.2 {
        100
    } else {
        (((volts - 3.0) / 1.2) * 100.0).round() as u8
    }
}

struct SessionState {
    position: Option<u8>,
    battery_millivolts: Option<u32>,
    liveness: Liveness,
    movement: MovementTracker,
    sequence: SequenceCounter,
    last_status_request: Option<Instant>,
    poll_interval: Duration,
}

impl SessionState {
    fn new() -> Self {
        Self {
            position: None,
            battery_millivolts: None,
            liveness: Liveness::new(Instant::now()),
            movement: MovementTracker::new(),
            sequence: SequenceCounter::new(),
            last_status_request: None,
            poll_interval: POLL_FAST,
        }
    }
}

pub struct PowerShade {
    identity: DeviceIdentity,
    target: SocketAddr,
    transport: Transport,
    state: Mutex<SessionState>,
    observers: Mutex<Vec<(String, Observer)>>,
    consumer_task: Mutex<Option<JoinHandle<()>>>,
}

impl PowerShade {
    /// Bind a transport and start the session against the protocol port.
    pub async fn connect(identity: DeviceIdentity) -> Result<Arc<Self>, ShadeError> {
        Self::connect_to(identity, DEVICE_PORT).await
    }

    /// Same as [`connect`](Self::connect) but against a nonstandard device
    /// port, for simulators and tests.
    pub async fn connect_to(identity: DeviceIdentity, port: u16) -> Result<Arc<Self>, ShadeError> {
        let (transport, rx) = Transport::bind().await?;
        let session = Arc::new(Self {
            target: SocketAddr::new(identity.ip, port),
            identity,
            transport,
            state: Mutex::new(SessionState::new()),
            observers: Mutex::new(Vec::new()),
            consumer_task: Mutex::new(None),
        });
        let task = tokio::spawn(consume_replies(session.clone(), rx));
        *session.consumer_task.lock() = Some(task);
        info!(ip = %session.identity.ip, "session started");
        Ok(session)
    }

    /// Stop the receive loop and the reply consumer, bounded.
    pub async fn shutdown(&self) {
        self.transport.shutdown().await;
        let task = self.consumer_task.lock().take();
        if let Some(task) = task {
            if timeout(SHUTDOWN_GRACE, task).await.is_err() {
                warn!(ip = %self.identity.ip, "reply consumer did not stop in time");
            }
        }
        info!(ip = %self.identity.ip, "session stopped");
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub fn position(&self) -> Option<u8> {
        self.state.lock().position
    }

    pub fn battery_millivolts(&self) -> Option<u32> {
        self.state.lock().battery_millivolts
    }

    pub fn battery_percentage(&self) -> Option<u8> {
        self.state.lock().battery_millivolts.map(battery_percentage)
    }

    pub fn available(&self) -> bool {
        self.state.lock().liveness.is_available(Instant::now())
    }

    pub fn is_opening(&self) -> bool {
        self.state.lock().movement.is_opening()
    }

    pub fn is_closing(&self) -> bool {
        self.state.lock().movement.is_closing()
    }

    /// Current poll interval, recomputed whenever status arrives.
    pub fn poll_interval(&self) -> Duration {
        self.state.lock().poll_interval
    }

    pub fn snapshot(&self) -> StateSnapshot {
        let state = self.state.lock();
        StateSnapshot {
            position: state.position,
            battery_millivolts: state.battery_millivolts,
            battery_percentage: state.battery_millivolts.map(battery_percentage),
            available: state.liveness.is_available(Instant::now()),
            is_opening: state.movement.is_opening(),
            is_closing: state.movement.is_closing(),
        }
    }

    /// Register an observer. The callback fires synchronously once right
    /// away so a fresh subscriber sees current state without waiting for
    /// the next change. A duplicate id replaces the earlier registration.
    pub fn subscribe(
        &self,
        id: impl Into<String>,
        callback: impl Fn(&StateSnapshot) + Send + Sync + 'static,
    ) {
        let id = id.into();
        let callback: Observer = Arc::new(callback);
        callback(&self.snapshot());
        let mut observers = self.observers.lock();
        observers.retain(|(existing, _)| *existing != id);
        observers.push((id, callback));
    }

    pub fn unsubscribe(&self, id: &str) {
        self.observers.lock().retain(|(existing, _)| existing != id);
    }

    fn notify(&self) {
        let snapshot = self.snapshot();
        // clone the callbacks out so none run under the registry lock
        let observers: Vec<Observer> = self
            .observers
            .lock()
            .iter()
            .map(|(_, callback)| callback.clone())
            .collect();
        for callback in observers {
            callback(&snapshot);
        }
    }

    async fn send_command(&self, command: Command) {
        let frame = {
            let mut state = self.state.lock();
            let sequence = state.sequence.next();
            command.to_frame(sequence)
        };
        self.transport.send(frame.into(), self.target).await;
    }

    /// One status request cycle with the default retry budget.
    pub async fn request_status(&self) {
        self.request_status_with_retry(DEFAULT_STATUS_RETRIES).await;
    }

    /// Request status, retrying until a reply lands or the budget runs out.
    /// Cycles closer together than the rate limit collapse into a no-op.
    /// There is no reply correlation: any status reply recorded within the
    /// freshness window satisfies the cycle.
    pub async fn request_status_with_retry(&self, max_retries: u32) {
        {
            let mut state = self.state.lock();
            let now = Instant::now();
            if let Some(last) = state.last_status_request {
                if now.duration_since(last) < STATUS_RATE_LIMIT {
                    debug!(ip = %self.identity.ip, "status request rate limited");
                    return;
                }
            }
            state.last_status_request = Some(now);
        }

        for attempt in 0..=max_retries {
            self.send_command(Command::GetStatus).await;
            sleep(RESPONSE_WAIT).await;

            let answered = self
                .state
                .lock()
                .liveness
                .response_is_fresh(Instant::now());
            if answered {
                break;
            }
            debug!(ip = %self.identity.ip, attempt = attempt + 1, "no status reply yet");
            if attempt < max_retries {
                sleep(RETRY_PAUSE).await;
            }
        }

        let transition = {
            let mut state = self.state.lock();
            if state.liveness.response_is_fresh(Instant::now()) {
                None
            } else {
                state.liveness.on_cycle_failure()
            }
        };
        if transition == Some(Transition::Offline) {
            warn!(ip = %self.identity.ip, "device stopped responding, marking unavailable");
            self.notify();
        }
    }

    /// Drive the shade to a percent-open target. Out-of-range input is a
    /// caller error and never reaches the wire. Movement intent is published
    /// before the send, with direction inferred from the current position
    /// (midpoint heuristic when it is unknown) so arrival can clear it.
    pub async fn set_position(&self, percent: u8) -> Result<(), ShadeError> {
        if percent > 100 {
            return Err(ShadeError::InvalidPosition(percent));
        }
        let (opening, closing) = {
            let state = self.state.lock();
            match state.position {
                Some(current) => (percent > current, percent < current),
                None => (percent > 50, percent <= 50),
            }
        };
        self.apply_intent(opening, closing, Some(percent));
        self.move_to(percent).await;
        Ok(())
    }

    /// Open fully. Movement intent is published before the network call so
    /// observers reflect it immediately.
    pub async fn open(&self) {
        self.apply_intent(true, false, Some(100));
        self.move_to(100).await;
    }

    /// Close fully.
    pub async fn close(&self) {
        self.apply_intent(false, true, Some(0));
        self.move_to(0).await;
    }

    async fn move_to(&self, percent: u8) {
        self.send_command(Command::SetPosition { percent }).await;
        // pick up the new reading sooner than the next scheduled poll
        sleep(SET_POSITION_FOLLOW_UP).await;
        self.request_status().await;
    }

    /// Stop movement. Flags clear immediately, without waiting for the
    /// device to confirm, and the next stale reply cannot re-assert them.
    pub async fn stop(&self) {
        self.state.lock().movement.apply_stop();
        self.notify();
        self.send_command(Command::JogStop).await;
    }

    /// Stop if moving, otherwise head for the far end of travel.
    pub async fn toggle(&self) {
        let action = {
            let state = self.state.lock();
            decide_toggle(
                state.position,
                state.movement.is_opening(),
                state.movement.is_closing(),
            )
        };
        debug!(ip = %self.identity.ip, ?action, "toggle");
        match action {
            ToggleAction::Stop => self.stop().await,
            ToggleAction::Open => self.open().await,
            ToggleAction::Close => self.close().await,
            ToggleAction::NoOp => {
                warn!(ip = %self.identity.ip, "cannot toggle: position unknown")
            }
        }
    }

    pub async fn set_upper_limit(&self) {
        self.set_limit(LimitType::Upper).await;
    }

    pub async fn set_lower_limit(&self) {
        self.set_limit(LimitType::Lower).await;
    }

    async fn set_limit(&self, limit: LimitType) {
        info!(ip = %self.identity.ip, %limit, "setting travel limit");
        self.send_command(Command::SetLimit(limit)).await;
    }

    pub async fn clear_limits(&self) {
        info!(ip = %self.identity.ip, "clearing travel limits");
        self.send_command(Command::ClearLimits).await;
    }

    pub async fn step_up(&self) {
        self.send_command(Command::StepUp).await;
    }

    pub async fn step_down(&self) {
        self.send_command(Command::StepDown).await;
    }

    pub async fn jog_up(&self) {
        self.send_command(Command::JogUp).await;
    }

    pub async fn jog_down(&self) {
        self.send_command(Command::JogDown).await;
    }

    /// Timer-driven availability evaluation; called by the polling loop.
    pub fn evaluate_availability(&self) {
        let transition = self.state.lock().liveness.evaluate(Instant::now());
        match transition {
            Some(Transition::Offline) => {
                warn!(ip = %self.identity.ip, "device not responding, marking unavailable");
                self.notify();
            }
            Some(Transition::Online) => {
                info!(ip = %self.identity.ip, "device responding again, marking available");
                self.notify();
            }
            None => {}
        }
    }

    /// Apply a decoded status reply. Safe to call at any time; late replies
    /// after a failed cycle still refresh state, they just cannot undo an
    /// already-committed failure count (the reset here covers the future).
    pub fn update_status(&self, position: u8, battery_millivolts: u32) {
        let transition = {
            let mut state = self.state.lock();
            let transition = state.liveness.on_response(Instant::now());
            state.position = Some(position);
            state.battery_millivolts = Some(battery_millivolts);
            state.movement.observe(position);
            // position is known from here on, drop back to the normal cadence
            state.poll_interval = POLL_NORMAL;
            transition
        };
        if transition == Some(Transition::Online) {
            info!(ip = %self.identity.ip, "device responding, marking available");
        }
        debug!(
            ip = %self.identity.ip,
            position,
            battery_millivolts,
            "status updated"
        );
        self.notify();
    }

    fn apply_intent(&self, opening: bool, closing: bool, target: Option<u8>) {
        self.state.lock().movement.apply_intent(opening, closing, target);
        self.notify();
    }

    fn ingest(&self, source: SocketAddr, bytes: Bytes) {
        let frame = match Frame::try_from(bytes) {
            Ok(frame) => frame,
            Err(error) => {
                debug!(%source, %error, "dropping undecodable datagram");
                return;
            }
        };
        match Reply::try_from(frame) {
            Ok(Reply::Status(report)) => {
                self.log_report(&report);
                self.update_status(report.position(), report.battery_mv as u32);
            }
            Ok(reply) => debug!(%source, ?reply, "ignoring non-status reply"),
            Err(error) => debug!(%source, %error, "dropping unparseable reply"),
        }
    }

    fn log_report(&self, report: &StatusReport) {
        debug!(
            ip = %self.identity.ip,
            percent = report.percent,
            tilt = report.tilt,
            battery_mv = report.battery_mv,
            cycles = report.cycles,
            stalls = report.stalls,
            "status report"
        );
    }
}

async fn consume_replies(session: Arc<PowerShade>, mut rx: mpsc::Receiver<Datagram>) {
    while let Some((source, bytes)) = rx.recv().await {
        session.ingest(source, bytes);
    }
    debug!("reply consumer stopped");
}

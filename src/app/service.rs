//! Prop service: the hexagonal core and its single cooperative tick.
//!
//! [`PropService`] owns the puzzle machine, the sampler, the command
//! listener, the link supervisor and the reporting client.  All I/O flows
//! through port traits passed into [`tick`](PropService::tick), so the whole
//! loop runs against mock adapters in tests.
//!
//! ```text
//!  InboundListener ──▶ ┌──────────────────────────────┐ ──▶ OutboundLink
//!                      │          PropService          │
//!       SensorPort ──▶ │ listener · supervisor · fsm   │ ──▶ IndicatorPort
//!                      │ sampler · reporter            │ ──▶ EventSink
//!                      └──────────────────────────────┘
//! ```
//!
//! Tick order:
//!
//! 1. answer at most one inbound request
//! 2. retire the in-flight report once its drain window ends
//! 3. supervisor: handshake or heartbeat
//! 4. flush one pending dispatch
//! 5. advance countdown
//! 6. sample (rate limited, only while Active)
//! 7. queue dispatches for changes and completion
//! 8. indicators

use log::{debug, info, warn};

use crate::config::{DispatchPolicy, PropConfig};
use crate::error::CommsError;
use crate::fsm::machine::{PuzzleMachine, Transition};
use crate::fsm::PuzzleState;
use crate::http::listener::CommandListener;
use crate::http::request::Route;
use crate::http::response::{ProbeEcho, Response};
use crate::link::payload::DispatchData;
use crate::link::reporter::{DeliveryMode, Report, ReportKind, ReportingClient};
use crate::link::supervisor::{ConnectionState, ConnectionSupervisor, SupervisorAction};
use crate::sensors::{MAX_CHANNELS, SensorSampler};

use super::commands::ControlCommand;
use super::events::AppEvent;
use super::ports::{
    Clock, EventSink, IndicatorPort, InboundListener, OutboundLink, SensorPort, StatusIndicator,
};

// ───────────────────────────────────────────────────────────────
// Indicator cache
// ───────────────────────────────────────────────────────────────

/// Last values written to the indicator port.  Lamps are only re-set on
/// change.
#[derive(Debug, Default)]
struct IndicatorCache {
    status: Option<StatusIndicator>,
    ready: Option<bool>,
    solved: Option<bool>,
    channels: [Option<bool>; MAX_CHANNELS],
}

fn status_for(state: PuzzleState, connected: bool) -> StatusIndicator {
    match (state, connected) {
        (PuzzleState::Completed, _) => StatusIndicator::Latched,
        (_, false) => StatusIndicator::Offline,
        (PuzzleState::Active, true) => StatusIndicator::Running,
        _ => StatusIndicator::Waiting,
    }
}

// ───────────────────────────────────────────────────────────────
// PropService
// ───────────────────────────────────────────────────────────────

pub struct PropService<O: OutboundLink> {
    config: PropConfig,
    machine: PuzzleMachine,
    sampler: SensorSampler,
    listener: CommandListener,
    supervisor: ConnectionSupervisor,
    reporter: ReportingClient<O::Stream>,
    handshake_mode: DeliveryMode,
    dispatch_mode: DeliveryMode,
    indicators: IndicatorCache,
    /// Link state last announced through the sink.
    link_announced: bool,
    tick_count: u64,
}

impl<O: OutboundLink> PropService<O> {
    /// Build every component from `config` and boot the puzzle machine.
    pub fn new(config: &PropConfig, now_ms: u64, sink: &mut impl EventSink) -> Self {
        let mut svc = Self {
            config: config.clone(),
            machine: PuzzleMachine::from_config(config),
            sampler: SensorSampler::from_config(config),
            listener: CommandListener::from_config(config),
            supervisor: ConnectionSupervisor::from_config(config),
            reporter: ReportingClient::from_config(config),
            handshake_mode: DeliveryMode::from_drain_ms(config.handshake_drain_ms),
            dispatch_mode: DeliveryMode::from_drain_ms(config.dispatch_drain_ms),
            indicators: IndicatorCache::default(),
            link_announced: false,
            tick_count: 0,
        };

        svc.machine.boot(now_ms);
        if config.start_armed {
            svc.sampler.reset();
            svc.machine
                .apply(ControlCommand::Start, now_ms, svc.sampler.snapshot());
        }
        info!(
            "{} ({}) booted in {}",
            config.device_id,
            config.variant.as_str(),
            svc.machine.state().as_str()
        );
        sink.emit(&AppEvent::Started(svc.machine.state()));
        svc
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one pass of the control loop.  Every wait inside is bounded.
    ///
    /// `hw` satisfies both [`SensorPort`] and [`IndicatorPort`], which
    /// avoids a double mutable borrow of the panel.
    pub fn tick<L: InboundListener>(
        &mut self,
        inbound: &mut L,
        outbound: &mut O,
        hw: &mut (impl SensorPort + IndicatorPort),
        clock: &impl Clock,
        sink: &mut impl EventSink,
    ) {
        self.tick_count += 1;

        // 1. Inbound first: probes must not wait behind game logic.
        self.service_inbound(inbound, outbound, clock, sink);

        // 2. Free the outbound slot when its drain window is over.
        if let Some(kind) = self.reporter.poll(clock) {
            debug!("report slot free after {}", kind.as_str());
        }

        // 3. Link supervision.
        self.supervise(outbound, clock, sink);

        // 4. One pending dispatch per tick, only while linked.
        if self.supervisor.is_connected() {
            self.flush_one(outbound, clock, sink);
        }

        // 5. Countdown expiry.
        let now_ms = clock.now_ms();
        if let Some(t) = self.machine.advance(now_ms) {
            emit_transition(t, sink);
        }

        // 6–7. Sample and queue dispatches.
        self.sample_and_dispatch(now_ms, hw, sink);

        // 8. Indicators.
        if self.link_announced && !self.supervisor.is_connected() {
            self.link_announced = false;
            self.reporter.drop_keepalive();
            sink.emit(&AppEvent::LinkDown);
        }
        self.refresh_indicators(hw);
    }

    // ── Inbound ───────────────────────────────────────────────

    fn service_inbound<L: InboundListener>(
        &mut self,
        inbound: &mut L,
        outbound: &mut O,
        clock: &impl Clock,
        sink: &mut impl EventSink,
    ) {
        let Some(request) = self.listener.poll(inbound, clock) else {
            return;
        };
        let route = request.route().clone();

        match route {
            Route::Probe { time } => {
                let echo = ProbeEcho {
                    time,
                    t1_us: request.received_us(),
                    t2_us: clock.now_us(),
                };
                self.supervisor.on_probe(clock.now_ms());
                let _ = request.respond(&Response::Pong(&echo), clock);
                sink.emit(&AppEvent::ProbeAnswered {
                    elapsed_us: echo.elapsed_us(),
                });

                if self.config.pong_echo && self.supervisor.is_connected() {
                    match self.reporter.echo_pong(outbound, &echo.pong_target(), clock) {
                        Ok(()) | Err(CommsError::Busy) => {}
                        Err(e) => debug!("pong echo failed: {e}"),
                    }
                }
            }
            Route::Control(command) => {
                let now_ms = clock.now_ms();
                self.apply_command(command, now_ms, sink);
                let _ = request.respond(
                    &Response::ControlOk {
                        command,
                        uptime_ms: now_ms,
                    },
                    clock,
                );
            }
            Route::Reject(rejection) => {
                let reason = rejection.message();
                warn!("inbound rejected: {reason}");
                let _ = request.respond(&Response::BadRequest(reason), clock);
                sink.emit(&AppEvent::RequestRejected(reason));
            }
        }
    }

    /// Apply a remote command.  Channel state starts empty afterwards.
    pub fn apply_command(&mut self, command: ControlCommand, now_ms: u64, sink: &mut impl EventSink) {
        info!("command: {command}");
        self.sampler.reset();
        if command == ControlCommand::Restart {
            self.supervisor.reset_backoff();
        }
        if let Some(t) = self.machine.apply(command, now_ms, self.sampler.snapshot()) {
            emit_transition(t, sink);
        }
        sink.emit(&AppEvent::CommandApplied(command));
    }

    // ── Link ──────────────────────────────────────────────────

    fn supervise(&mut self, outbound: &mut O, clock: &impl Clock, sink: &mut impl EventSink) {
        match self.supervisor.poll(clock.now_ms()) {
            SupervisorAction::Idle => {}
            SupervisorAction::AttemptConnect => {
                if !self.reporter.is_busy() {
                    self.handshake(outbound, clock, sink);
                }
            }
            SupervisorAction::SendHeartbeat => {
                if self.reporter.is_busy() {
                    self.supervisor.defer_heartbeat();
                    return;
                }
                let result = Report::heartbeat(&self.config.device_id).and_then(|report| {
                    self.reporter
                        .send_now(outbound, &report, DeliveryMode::FireAndForget, clock)
                });
                self.supervisor
                    .on_heartbeat_result(result.is_ok(), clock.now_ms());
                sink.emit(&match result {
                    Ok(()) => AppEvent::ReportSent(ReportKind::Heartbeat),
                    Err(_) => AppEvent::ReportFailed(ReportKind::Heartbeat),
                });
            }
        }
    }

    fn handshake(&mut self, outbound: &mut O, clock: &impl Clock, sink: &mut impl EventSink) {
        self.supervisor.begin_attempt();
        let ip = self
            .config
            .advertise_ip
            .clone()
            .or_else(|| outbound.local_ip().map(|ip| ip.to_string()))
            .unwrap_or_else(|| "0.0.0.0".into());

        let result = Report::connect(&self.config.device_id, &ip, self.config.listen_port)
            .and_then(|report| {
                self.reporter
                    .send_now(outbound, &report, self.handshake_mode, clock)
            });
        let now_ms = clock.now_ms();

        match result {
            Ok(()) => {
                self.supervisor.on_connect_result(true, now_ms);
                sink.emit(&AppEvent::ReportSent(ReportKind::Connect));
                sink.emit(&AppEvent::LinkUp);
                self.link_announced = true;
                if self.config.auto_start_on_connect && self.machine.state() == PuzzleState::Idle {
                    info!("auto-start after handshake");
                    self.apply_command(ControlCommand::Start, now_ms, sink);
                }
            }
            Err(e) => {
                debug!("handshake failed: {e}");
                let reinit = self.supervisor.on_connect_result(false, now_ms);
                sink.emit(&AppEvent::ReportFailed(ReportKind::Connect));
                if reinit {
                    outbound.reinitialize();
                    sink.emit(&AppEvent::PeripheralReset);
                }
                sink.emit(&AppEvent::ReconnectScheduled {
                    delay_ms: self.supervisor.current_delay_ms(),
                });
            }
        }
    }

    fn flush_one(&mut self, outbound: &mut O, clock: &impl Clock, sink: &mut impl EventSink) {
        match self.reporter.flush_pending(outbound, self.dispatch_mode, clock) {
            None => {}
            Some((kind, Ok(()))) => sink.emit(&AppEvent::ReportSent(kind)),
            Some((kind, Err(e))) => {
                warn!("dispatch {} failed: {e}; requeued", kind.as_str());
                sink.emit(&AppEvent::ReportFailed(kind));
                self.supervisor.on_link_failure(clock.now_ms());
            }
        }
    }

    // ── Sensors ───────────────────────────────────────────────

    fn sample_and_dispatch(
        &mut self,
        now_ms: u64,
        hw: &mut impl SensorPort,
        sink: &mut impl EventSink,
    ) {
        if !self.machine.is_sampling() {
            return;
        }
        let Some(sample) = self.sampler.sample(now_ms, hw) else {
            return;
        };
        if !sample.changed() {
            return;
        }
        let changed_mask = sample.changed_mask;

        for (i, value) in self.sampler.snapshot().iter().enumerate() {
            if changed_mask & (1 << i) != 0 {
                sink.emit(&AppEvent::ChannelChanged {
                    channel: i,
                    on: value.is_on(),
                });
            }
        }

        if let Some(t) = self.machine.observe(self.sampler.snapshot(), now_ms) {
            emit_transition(t, sink);
        }

        let completed = self.machine.take_completion();
        if completed {
            info!("puzzle completed");
            sink.emit(&AppEvent::Completed);
        }
        if completed || self.config.dispatch_policy == DispatchPolicy::OnChange {
            self.queue_dispatch(completed);
        }
    }

    fn queue_dispatch(&mut self, completed: bool) {
        let data = DispatchData::from_snapshot(
            self.config.variant,
            self.sampler.snapshot(),
            self.sampler.last_changed(),
            completed,
        );
        match Report::dispatch(
            &self.config.device_id,
            self.config.variant.event_name(),
            data,
            completed,
        ) {
            Ok(report) => self.reporter.enqueue(report),
            Err(e) => warn!("dispatch not queued: {e}"),
        }
    }

    // ── Indicators ────────────────────────────────────────────

    fn refresh_indicators(&mut self, hw: &mut impl IndicatorPort) {
        let status = status_for(self.machine.state(), self.supervisor.is_connected());
        if self.indicators.status != Some(status) {
            hw.set_status(status);
            self.indicators.status = Some(status);
        }

        let outputs = self.machine.outputs();
        if self.indicators.ready != Some(outputs.ready_lamp) {
            hw.set_ready_lamp(outputs.ready_lamp);
            self.indicators.ready = Some(outputs.ready_lamp);
        }
        if self.indicators.solved != Some(outputs.solved_lamp) {
            hw.set_solved_lamp(outputs.solved_lamp);
            self.indicators.solved = Some(outputs.solved_lamp);
        }

        for (i, value) in self.sampler.snapshot().iter().enumerate() {
            let on = value.is_on();
            if let Some(cached) = self.indicators.channels.get_mut(i) {
                if *cached != Some(on) {
                    hw.set_channel_lamp(i, on);
                    *cached = Some(on);
                }
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> PuzzleState {
        self.machine.state()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.supervisor.state()
    }

    pub fn is_reporting(&self) -> bool {
        self.reporter.is_busy()
    }

    pub fn pending_reports(&self) -> usize {
        self.reporter.pending_len()
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn config(&self) -> &PropConfig {
        &self.config
    }
}

fn emit_transition((from, to): Transition, sink: &mut impl EventSink) {
    debug!("puzzle: {} → {}", from.as_str(), to.as_str());
    sink.emit(&AppEvent::StateChanged { from, to });
}

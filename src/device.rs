use std::time::{Duration, Instant};

use crate::{Error, ErrorKind, Result};
use crate::sys::Transport;
use crate::config::SweepConfiguration;
use crate::command::{self, Command, Identity, Preamble, Query, SelfTest};
use crate::status::{self, InstrumentStatus};
use crate::curve::{self, CurveBuffer, CurvePoint};

/// Long enough for a slow sweep at full collector supply.
pub const DEFAULT_SIGNAL_TIMEOUT: Duration = Duration::from_secs(60);

/// Progress of the current sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Configuring,
    Armed,
    Triggered,
    AwaitingSignal,
    Completing,
    Done,
    Error(ErrorKind),
}

impl State {
    /// Whether a new sweep may be configured, and the bus used for anything else.
    fn is_settled(self) -> bool {
        matches!(self, State::Idle | State::Done | State::Error(_))
    }
}

/// Sweep controller for one curve tracer.
///
/// A sweep goes through [`Device::configure_sweep`] and then [`Device::run_sweep`], or, to be
/// able to abort it, [`Device::start_sweep`] and [`Device::finish_sweep`]. Only one sweep can be
/// in flight; requests for another one fail with [`Error::ControllerBusy`].
///
/// A configured sweep counts as in flight. From [`State::Armed`] the only way forward is to
/// start it; [`Device::configure_sweep`] and the utilities fail with `ControllerBusy` until the
/// sweep reaches `Done` or `Error`. A sweep that is no longer wanted can be started and then
/// cancelled with [`Device::abort_sweep`].
#[derive(Debug)]
pub struct Device<T: Transport> {
    transport: T,
    state: State,
    config: Option<SweepConfiguration>,
    signal_timeout: Duration,
}

impl<T: Transport> Device<T> {
    pub fn new(transport: T) -> Device<T> {
        Device {
            transport,
            state: State::Idle,
            config: None,
            signal_timeout: DEFAULT_SIGNAL_TIMEOUT,
        }
    }

    /// Set the bound on the wait for sweep completion. Must cover the worst case sweep duration.
    pub fn with_signal_timeout(mut self, timeout: Duration) -> Self {
        self.signal_timeout = timeout;
        self
    }

    pub fn signal_timeout(&self) -> Duration {
        self.signal_timeout
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    fn transition(&mut self, state: State) {
        log::debug!("state {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    fn fail<R>(&mut self, error: Error) -> Result<R> {
        log::debug!("sweep failed: {}", error);
        self.config = None;
        self.transition(State::Error(error.kind()));
        Err(error)
    }

    fn ensure_settled(&self) -> Result<()> {
        if self.state.is_settled() {
            Ok(())
        } else {
            Err(Error::ControllerBusy(self.state))
        }
    }

    fn send(&mut self, command: &Command) -> Result<()> {
        let line = command.to_string();
        log::debug!("send({:?})", line);
        self.transport.send(&line)
    }

    fn query(&mut self, query: Query) -> Result<String> {
        let response = self.transport.query(query.as_str())?;
        log::debug!("query({:?}) = {:?}", query.as_str(), response);
        Ok(response)
    }

    fn read_status(&mut self) -> Result<InstrumentStatus> {
        let status = status::decode_status(&self.query(Query::Event)?)?;
        log::debug!("read_status() = {:?}", status);
        Ok(status)
    }

    /// Program the instrument for a sweep.
    ///
    /// The configuration is validated before anything is sent. A controller in `Done` or
    /// `Error` is reset to `Idle` first.
    pub fn configure_sweep(&mut self, config: &SweepConfiguration) -> Result<()> {
        self.ensure_settled()?;
        if self.state != State::Idle {
            self.transition(State::Idle);
        }
        self.config = None;
        let commands = command::sweep_commands(config)?;

        self.transition(State::Configuring);
        for command in &commands {
            let result = self.send(command);
            if let Err(error) = result {
                return self.fail(error)
            }
        }
        // drop requests left over from earlier operations so that they cannot complete this one
        let result = self.transport.clear_signal();
        if let Err(error) = result {
            return self.fail(error)
        }
        self.config = Some(*config);
        self.transition(State::Armed);
        Ok(())
    }

    /// Trigger the configured sweep and wait for its curve.
    pub fn run_sweep(&mut self) -> Result<Vec<CurvePoint>> {
        self.start_sweep()?;
        self.finish_sweep()
    }

    /// Trigger the configured sweep without waiting for it to complete.
    pub fn start_sweep(&mut self) -> Result<()> {
        let mode = match (self.state, self.config) {
            (State::Armed, Some(config)) => config.mode,
            (state, _) if !state.is_settled() =>
                return Err(Error::ControllerBusy(state)),
            (state, _) =>
                return Err(Error::InvalidState { operation: "start a sweep", state }),
        };
        let result = self.send(&Command::Measure(mode));
        if let Err(error) = result {
            return self.fail(error)
        }
        self.transition(State::Triggered);
        self.transition(State::AwaitingSignal);
        Ok(())
    }

    /// Wait for the sweep started by [`Device::start_sweep`] and read its curve.
    pub fn finish_sweep(&mut self) -> Result<Vec<CurvePoint>> {
        let config = match (self.state, self.config) {
            (State::AwaitingSignal, Some(config)) => config,
            (state, _) =>
                return Err(Error::InvalidState { operation: "finish a sweep", state }),
        };
        match self.complete(&config) {
            Ok(points) => {
                self.config = None;
                self.transition(State::Done);
                Ok(points)
            }
            Err(error) => self.fail(error)
        }
    }

    /// Abort a sweep that has been started but has not signalled completion yet.
    pub fn abort_sweep(&mut self) -> Result<()> {
        if self.state != State::AwaitingSignal {
            return Err(Error::InvalidState { operation: "abort a sweep", state: self.state })
        }
        log::debug!("aborting sweep");
        // bring the collector supply down, and keep the instrument from requesting service
        // for the sweep it was running
        let result = self.send(&Command::CollectorSupply(0.0))
            .and_then(|()| self.send(&Command::ServiceRequest(false)))
            .and_then(|()| self.transport.clear_signal());
        self.config = None;
        match result {
            Ok(()) => {
                self.transition(State::Error(ErrorKind::Cancelled));
                Ok(())
            }
            Err(error) => self.fail(error)
        }
    }

    fn complete(&mut self, config: &SweepConfiguration) -> Result<Vec<CurvePoint>> {
        if !self.wait_for_service_request()? {
            return Err(self.diagnose_timeout())
        }

        self.transition(State::Completing);
        let status = self.read_status()?;
        if !status.is_complete() {
            log::warn!("sweep did not complete, instrument reports {:?}", status);
            return Err(Error::Instrument(status))
        }

        log::debug!("send({:?})", Query::Curve.as_str());
        self.transport.send(Query::Curve.as_str())?;
        let buffer = CurveBuffer::new(self.transport.read_binary_block()?);
        log::debug!("read {} byte curve block", buffer.len());
        curve::decode(&buffer, config)
    }

    /// Wait until this instrument requests service, or the signal timeout elapses.
    ///
    /// SRQ is shared by the whole bus, so each assertion is followed by a serial poll; requests
    /// from other devices are passed over and the wait resumes for the rest of the timeout.
    fn wait_for_service_request(&mut self) -> Result<bool> {
        let mut remaining = self.signal_timeout;
        loop {
            let started = Instant::now();
            log::trace!("wait_for_signal({:?})", remaining);
            if !self.transport.wait_for_signal(remaining)? {
                return Ok(false)
            }
            let stb = self.transport.serial_poll()?;
            log::debug!("serial_poll() = {:?}", stb);
            if stb.requested_service() {
                return Ok(true)
            }
            log::warn!("service request from another device ignored");
            remaining = remaining.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                return Ok(false)
            }
        }
    }

    /// Tell an instrument that gave up on the sweep apart from a signal that never arrived.
    fn diagnose_timeout(&mut self) -> Error {
        let timeout = self.signal_timeout;
        match self.read_status() {
            Ok(status) if status.is_fault() => {
                log::warn!("no service request, instrument reports {:?}", status);
                Error::Instrument(status)
            }
            Ok(status) => {
                log::warn!("no service request within {:?}, instrument reports {:?}",
                           timeout, status);
                Error::SignalTimeout(timeout)
            }
            Err(error) => {
                log::warn!("no service request within {:?}, status unavailable: {}",
                           timeout, error);
                Error::SignalTimeout(timeout)
            }
        }
    }

    /// Restore the power-up settings.
    pub fn initialize(&mut self) -> Result<()> {
        self.ensure_settled()?;
        self.send(&Command::Initialize)?;
        if self.state != State::Idle {
            self.transition(State::Idle);
        }
        Ok(())
    }

    pub fn identify(&mut self) -> Result<Identity> {
        self.ensure_settled()?;
        command::decode_identity(&self.query(Query::Identify)?)
    }

    /// Run the ROM and RAM self test.
    pub fn self_test(&mut self) -> Result<SelfTest> {
        self.ensure_settled()?;
        command::decode_self_test(&self.query(Query::SelfTest)?)
    }

    /// Read the preamble of the displayed waveform, which carries the scale factors of the
    /// current horizontal and vertical settings.
    pub fn read_preamble(&mut self) -> Result<Preamble> {
        self.ensure_settled()?;
        command::decode_preamble(&self.query(Query::Preamble)?)
    }

    /// Stop the instrument from asserting SRQ, e.g. before handing the bus to another
    /// controller.
    pub fn disable_service_requests(&mut self) -> Result<()> {
        self.ensure_settled()?;
        self.send(&Command::ServiceRequest(false))?;
        self.send(&Command::OperationComplete(false))?;
        self.transport.clear_signal()
    }
}

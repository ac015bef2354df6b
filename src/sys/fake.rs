//! Scripted transport that records every call, for exercising the controller without hardware.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::thread::sleep;
use std::time::Duration;

use crate::{Error, Result};
use crate::status::StatusByte;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Send(String),
    Query(String),
    Wait(Duration),
    ReadBlock,
    ClearSignal,
    SerialPoll,
}

#[derive(Debug, Default)]
pub struct FakeTransport {
    pub calls: Vec<Call>,
    responses: HashMap<String, VecDeque<String>>,
    signals: VecDeque<bool>,
    status_bytes: VecDeque<u8>,
    blocks: VecDeque<Vec<u8>>,
    send_delays: Vec<Duration>,
    fail_send_at: Option<usize>,
    sends: usize,
}

fn bus_error(reason: &str) -> Error {
    Error::Bus(io::Error::new(io::ErrorKind::BrokenPipe, reason.to_owned()))
}

impl FakeTransport {
    pub fn new() -> FakeTransport {
        Default::default()
    }

    pub fn respond(mut self, query: &str, response: &str) -> Self {
        self.responses.entry(query.to_owned()).or_default().push_back(response.to_owned());
        self
    }

    /// Queue the outcome of the next `wait_for_signal`. Without queued outcomes the signal
    /// never arrives.
    pub fn signal(mut self, signaled: bool) -> Self {
        self.signals.push_back(signaled);
        self
    }

    /// Queue the result of the next serial poll. Defaults to operation complete with RQS.
    pub fn status_byte(mut self, stb: u8) -> Self {
        self.status_bytes.push_back(stb);
        self
    }

    pub fn block(mut self, data: Vec<u8>) -> Self {
        self.blocks.push_back(data);
        self
    }

    /// Delay the acknowledgement of the n-th `send` by `delays[n]`.
    pub fn delay_sends(mut self, delays: Vec<Duration>) -> Self {
        self.send_delays = delays;
        self
    }

    /// Fail the n-th `send` (counting from zero) with a bus error.
    pub fn fail_send(mut self, index: usize) -> Self {
        self.fail_send_at = Some(index);
        self
    }

    pub fn sent(&self) -> Vec<&str> {
        self.calls.iter().filter_map(|call| match call {
            Call::Send(command) => Some(command.as_str()),
            _ => None,
        }).collect()
    }

    pub fn count(&self, call: &Call) -> usize {
        self.calls.iter().filter(|&recorded| recorded == call).count()
    }

    pub fn queried(&self, query: &str) -> usize {
        self.count(&Call::Query(query.to_owned()))
    }
}

impl super::Transport for FakeTransport {
    fn send(&mut self, command: &str) -> Result<()> {
        let index = self.sends;
        self.sends += 1;
        if let Some(&delay) = self.send_delays.get(index) {
            sleep(delay);
        }
        if self.fail_send_at == Some(index) {
            return Err(bus_error("no listener"))
        }
        self.calls.push(Call::Send(command.to_owned()));
        Ok(())
    }

    fn query(&mut self, query: &str) -> Result<String> {
        self.calls.push(Call::Query(query.to_owned()));
        match self.responses.get_mut(query).and_then(VecDeque::pop_front) {
            Some(response) => Ok(response),
            None if query == "EVE?" => Ok("EVENT 000".to_owned()),
            None => Err(bus_error("no response scripted")),
        }
    }

    fn wait_for_signal(&mut self, timeout: Duration) -> Result<bool> {
        self.calls.push(Call::Wait(timeout));
        Ok(self.signals.pop_front().unwrap_or(false))
    }

    fn read_binary_block(&mut self) -> Result<Vec<u8>> {
        self.calls.push(Call::ReadBlock);
        self.blocks.pop_front().ok_or_else(|| bus_error("no block scripted"))
    }

    fn clear_signal(&mut self) -> Result<()> {
        self.calls.push(Call::ClearSignal);
        Ok(())
    }

    fn serial_poll(&mut self) -> Result<StatusByte> {
        self.calls.push(Call::SerialPoll);
        Ok(StatusByte::from_bits_retain(self.status_bytes.pop_front().unwrap_or(0x42)))
    }
}

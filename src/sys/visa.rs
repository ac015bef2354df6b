use std::ffi::CString;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::time::Duration;

use visa_rs::prelude::*;
use visa_rs::enums::event::{EventKind, Mechanism};
use visa_rs::enums::status::ErrorCode;

use crate::{Error, Result};
use crate::curve;
use crate::status::StatusByte;

const READ_CHUNK: usize = 4096;

fn bus_error(error: visa_rs::Error) -> Error {
    Error::Bus(io::Error::other(error))
}

/// GPIB (or any other VISA) session with service requests delivered through the event queue.
pub struct VisaTransport {
    // closing the resource manager closes every session it opened, so it is dropped last
    instrument: Instrument,
    _resource_manager: DefaultRM,
}

impl VisaTransport {
    /// Open a resource such as `GPIB0::23::INSTR`.
    pub fn open(resource: &str) -> Result<VisaTransport> {
        let resource_manager = DefaultRM::new().map_err(bus_error)?;
        let resource_name = CString::new(resource)
            .map_err(|error| Error::InvalidConfiguration(error.to_string()))?;
        let instrument = resource_manager
            .open(&resource_name.into(), AccessMode::NO_LOCK, TIMEOUT_IMMEDIATE)
            .map_err(bus_error)?;
        instrument
            .enable_event(EventKind::EventServiceReq, Mechanism::Queue)
            .map_err(bus_error)?;
        log::debug!("opened {} with service request queue", resource);
        Ok(VisaTransport { instrument, _resource_manager: resource_manager })
    }
}

impl std::fmt::Debug for VisaTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("VisaTransport").finish_non_exhaustive()
    }
}

impl Drop for VisaTransport {
    fn drop(&mut self) {
        if let Err(error) = self.instrument.disable_event(EventKind::EventServiceReq,
                                                          Mechanism::Queue) {
            log::warn!("cannot disable service request queue: {}", error);
        }
    }
}

impl super::Transport for VisaTransport {
    fn send(&mut self, command: &str) -> Result<()> {
        log::trace!("write({:?})", command);
        (&self.instrument).write_all(format!("{}\n", command).as_bytes())?;
        Ok(())
    }

    fn query(&mut self, query: &str) -> Result<String> {
        self.send(query)?;
        let mut response = String::new();
        BufReader::new(&self.instrument).read_line(&mut response)?;
        let response = response.trim_end_matches(['\r', '\n']).to_owned();
        log::trace!("read() = {:?}", response);
        Ok(response)
    }

    fn wait_for_signal(&mut self, timeout: Duration) -> Result<bool> {
        match self.instrument.wait_on_event(EventKind::EventServiceReq, timeout) {
            Ok(_event) => Ok(true),
            Err(visa_rs::Error(ErrorCode::ErrorTmo)) => Ok(false),
            Err(error) => Err(bus_error(error)),
        }
    }

    fn read_binary_block(&mut self) -> Result<Vec<u8>> {
        // read until the length announced by the block header has arrived; binary data may
        // contain the line terminator
        let mut data = Vec::new();
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            let count = (&self.instrument).read(&mut chunk[..])?;
            if count == 0 {
                return Err(Error::Bus(io::Error::new(io::ErrorKind::UnexpectedEof,
                                                     "curve block ended early")))
            }
            data.extend_from_slice(&chunk[..count]);
            log::trace!("read {} bytes of curve block, {} total", count, data.len());
            if curve::frame_len(&data).is_some_and(|len| data.len() >= len) {
                return Ok(data)
            }
        }
    }

    fn clear_signal(&mut self) -> Result<()> {
        self.instrument.discard_events(EventKind::EventServiceReq, Mechanism::Queue)
            .map_err(bus_error)
    }

    fn serial_poll(&mut self) -> Result<StatusByte> {
        let stb = self.instrument.read_stb().map_err(bus_error)?;
        Ok(StatusByte::from_bits_retain(stb as u8))
    }
}

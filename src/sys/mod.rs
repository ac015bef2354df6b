//! Access to the instrument bus.

use std::time::Duration;

use crate::Result;
use crate::status::StatusByte;

/// Blocking request/response channel to one instrument, plus the bus-wide service request line.
///
/// Implementations append the line terminator to commands and strip it from responses.
pub trait Transport {
    /// Send a command that has no response. Returns once the instrument accepted it.
    fn send(&mut self, command: &str) -> Result<()>;

    /// Send a query and read the one-line text response.
    fn query(&mut self, query: &str) -> Result<String>;

    /// Block until SRQ is asserted or `timeout` elapses. Returns `false` on timeout.
    ///
    /// SRQ is shared by every device on the bus; `true` only means that some device wants
    /// service.
    fn wait_for_signal(&mut self, timeout: Duration) -> Result<bool>;

    /// Read one binary block produced by the previous command.
    fn read_binary_block(&mut self) -> Result<Vec<u8>>;

    /// Discard service requests that were signalled but not yet waited for.
    fn clear_signal(&mut self) -> Result<()> {
        Ok(())
    }

    /// Serial poll the instrument, releasing SRQ if it was asserting it.
    ///
    /// Transports without access to the status byte report that the instrument requested
    /// service, i.e. every signal is attributed to it.
    fn serial_poll(&mut self) -> Result<StatusByte> {
        Ok(StatusByte::RQS)
    }
}

#[cfg(feature = "hardware")]
pub mod visa;

#[cfg(test)]
pub(crate) mod fake;

//! Decoding of the binary curve block returned by `CUR?`.
//!
//! The block is laid out as:
//!
//! ```text
//! CURVE CURVID:"INDEX 0",%<count><x0><y0>...<xN-1><yN-1><checksum>
//! ```
//!
//! where `<count>` is a big-endian `u16` equal to the number of points plus one, each coordinate
//! is a big-endian `u16` holding a 10-bit code, and `<checksum>` is the two's complement of
//! the modulo-256 sum of the count and point bytes.

use std::io;

use bytemuck::{Pod, Zeroable};

use crate::{Error, Result};
use crate::command::MAX_CODE;
use crate::config::SweepConfiguration;

const BLOCK_MARKER: u8 = b'%';
const HEADER_PREFIX: &[u8] = b"CURVE";

/// Raw response to `CUR?`, exactly as read from the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurveBuffer(Vec<u8>);

impl CurveBuffer {
    pub fn new(data: Vec<u8>) -> CurveBuffer {
        CurveBuffer(data)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0[..]
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for CurveBuffer {
    fn from(data: Vec<u8>) -> Self {
        CurveBuffer(data)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurvePoint {
    /// Horizontal coordinate, in volts.
    pub voltage: f64,
    /// Vertical coordinate, in amperes.
    pub current: f64,
}

#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
struct RawPoint {
    x: [u8; 2],
    y: [u8; 2],
}

impl RawPoint {
    fn x(&self) -> u16 {
        u16::from_be_bytes(self.x)
    }

    fn y(&self) -> u16 {
        u16::from_be_bytes(self.y)
    }
}

fn malformed(reason: String) -> Error {
    Error::MalformedCurveData(reason)
}

/// Position of the `%` that opens the binary block. The header fields before it may hold quoted
/// text, such as a readout, in which `%` is an ordinary character.
fn block_marker(data: &[u8]) -> Option<usize> {
    let mut quoted = false;
    for (index, &byte) in data.iter().enumerate() {
        match byte {
            b'"' => quoted = !quoted,
            BLOCK_MARKER if !quoted => return Some(index),
            _ => ()
        }
    }
    None
}

/// Returns the total length of the block that begins at `data[0]`, once enough of it has been
/// received to tell, i.e. once the count that follows the `%` marker is available.
pub fn frame_len(data: &[u8]) -> Option<usize> {
    let marker = block_marker(data)?;
    let count = data.get(marker + 1..marker + 3)?;
    let points = u16::from_be_bytes([count[0], count[1]]).saturating_sub(1) as usize;
    Some(marker + 1 + 2 + points * 4 + 1)
}

/// Convert a curve block into points, applying the scale factors of the sweep it belongs to.
///
/// The points are returned in acquisition order. The block must contain exactly
/// `config.step_count` points.
pub fn decode(buffer: &CurveBuffer, config: &SweepConfiguration) -> Result<Vec<CurvePoint>> {
    let data = buffer.as_bytes();
    if !data.starts_with(HEADER_PREFIX) {
        return Err(malformed(format!("block starts with {:02x?}", &data[..data.len().min(8)])))
    }
    let marker = block_marker(data)
        .ok_or_else(|| malformed("no binary block marker".to_owned()))?;
    let block = &data[marker + 1..];
    if block.len() < 2 {
        return Err(malformed("block truncated before point count".to_owned()))
    }
    let count = u16::from_be_bytes([block[0], block[1]]);
    if count == 0 {
        return Err(malformed("point count field is zero".to_owned()))
    }
    let points = (count - 1) as usize;
    let block_len = 2 + points * 4 + 1;
    if block.len() < block_len {
        return Err(malformed(format!("block truncated: {} of {} bytes for {} points",
                                     block.len(), block_len, points)))
    }
    let (block, trailer) = block.split_at(block_len);
    if !trailer.iter().all(|&byte| byte == b'\r' || byte == b'\n') {
        return Err(malformed(format!("{} unexpected bytes after block", trailer.len())))
    }
    let sum = block.iter().fold(0u8, |sum, &byte| sum.wrapping_add(byte));
    if sum != 0 {
        return Err(malformed(format!("checksum mismatch (residue {:#04x})", sum)))
    }
    if points != config.step_count as usize {
        return Err(malformed(format!("{} points received, {} configured",
                                     points, config.step_count)))
    }

    let raw_points: &[RawPoint] = bytemuck::try_cast_slice(&block[2..block_len - 1])
        .map_err(|error| malformed(format!("cannot split point data: {}", error)))?;
    log::trace!("decoding {} points", raw_points.len());
    raw_points.iter().enumerate().map(|(index, raw_point)| {
        let (x, y) = (raw_point.x(), raw_point.y());
        if x > MAX_CODE || y > MAX_CODE {
            return Err(malformed(format!("point {} has code ({}, {}) above {}",
                                         index, x, y, MAX_CODE)))
        }
        Ok(CurvePoint {
            voltage: config.horizontal.apply(x),
            current: config.vertical.apply(y),
        })
    }).collect()
}

/// Write points as CSV with a `Voltage (V),Current (A)` header.
pub fn write_csv<W: io::Write>(writer: W, points: &[CurvePoint]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(["Voltage (V)", "Current (A)"]).map_err(io::Error::from)?;
    for point in points {
        writer.write_record([point.voltage.to_string(), point.current.to_string()])
            .map_err(io::Error::from)?;
    }
    writer.flush()?;
    Ok(())
}

/// Build a well-formed `CUR?` response from raw codes.
#[cfg(test)]
pub(crate) fn curve_block(codes: &[(u16, u16)]) -> Vec<u8> {
    curve_block_with_header(b"CURVE CURVID:\"INDEX 0\",%", codes)
}

#[cfg(test)]
fn curve_block_with_header(header: &[u8], codes: &[(u16, u16)]) -> Vec<u8> {
    let mut block = Vec::new();
    block.extend_from_slice(&(codes.len() as u16 + 1).to_be_bytes());
    for &(x, y) in codes {
        block.extend_from_slice(&x.to_be_bytes());
        block.extend_from_slice(&y.to_be_bytes());
    }
    let sum = block.iter().fold(0u8, |sum, &byte| sum.wrapping_add(byte));
    block.push(sum.wrapping_neg());

    let mut data = header.to_vec();
    data.extend_from_slice(&block);
    data
}

// Sources:
// - https://learn.microsoft.com/openspecs/windows_protocols/ms-shllink
// - https://learn.microsoft.com/windows/win32/api/minwinbase/ns-minwinbase-filetime

//! Bounds-checked little-endian reads over an in-memory buffer.
//!
//! A `ByteReader` is a window into the shortcut buffer. Offsets passed to its
//! methods are relative to the start of the window (its *anchor*), while the
//! errors it returns always carry absolute buffer offsets, so a failure deep
//! inside a nested structure still points at the right byte.

use byteorder::{ByteOrder, LittleEndian};
use chrono::{DateTime, TimeZone, Utc};

use crate::error::LnkError;

/// Seconds between 1601-01-01 and 1970-01-01.
pub const FILETIME_EPOCH_DELTA_SECS: i64 = 11_644_473_600;
/// FILETIME ticks (100 ns) per second.
pub const FILETIME_TICKS_PER_SEC: u64 = 10_000_000;

#[derive(Debug, Clone, Copy)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    origin: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, origin: 0 }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Absolute buffer offset of this window's first byte.
    pub fn origin(&self) -> usize {
        self.origin
    }

    fn out_of_bounds(&self, offset: usize, len: usize) -> LnkError {
        LnkError::OutOfBounds {
            offset: self.origin.saturating_add(offset),
            len,
            limit: self.origin + self.data.len(),
        }
    }

    pub fn bytes(&self, offset: usize, len: usize) -> Result<&'a [u8], LnkError> {
        let end = offset
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| self.out_of_bounds(offset, len))?;
        Ok(&self.data[offset..end])
    }

    /// Narrow the reader to `len` bytes starting at `offset`. The new window
    /// is anchored at `offset`.
    pub fn window(&self, offset: usize, len: usize) -> Result<ByteReader<'a>, LnkError> {
        let data = self.bytes(offset, len)?;
        Ok(ByteReader {
            data,
            origin: self.origin + offset,
        })
    }

    /// Window from `offset` up to the end of the current window.
    pub fn tail(&self, offset: usize) -> Result<ByteReader<'a>, LnkError> {
        if offset > self.data.len() {
            return Err(self.out_of_bounds(offset, 0));
        }
        self.window(offset, self.data.len() - offset)
    }

    pub fn u8(&self, offset: usize) -> Result<u8, LnkError> {
        Ok(self.bytes(offset, 1)?[0])
    }

    pub fn u16(&self, offset: usize) -> Result<u16, LnkError> {
        Ok(LittleEndian::read_u16(self.bytes(offset, 2)?))
    }

    pub fn i16(&self, offset: usize) -> Result<i16, LnkError> {
        Ok(LittleEndian::read_i16(self.bytes(offset, 2)?))
    }

    pub fn u32(&self, offset: usize) -> Result<u32, LnkError> {
        Ok(LittleEndian::read_u32(self.bytes(offset, 4)?))
    }

    pub fn i32(&self, offset: usize) -> Result<i32, LnkError> {
        Ok(LittleEndian::read_i32(self.bytes(offset, 4)?))
    }

    pub fn u64(&self, offset: usize) -> Result<u64, LnkError> {
        Ok(LittleEndian::read_u64(self.bytes(offset, 8)?))
    }

    pub fn i64(&self, offset: usize) -> Result<i64, LnkError> {
        Ok(LittleEndian::read_i64(self.bytes(offset, 8)?))
    }

    pub fn guid(&self, offset: usize) -> Result<String, LnkError> {
        Ok(format_guid(self.bytes(offset, 16)?))
    }

    /// NUL-terminated ANSI string, cleaned for display. A string that runs
    /// off the end of the window is an error.
    pub fn ascii_z(&self, offset: usize) -> Result<String, LnkError> {
        let rest = self.tail(offset)?.data;
        let end = rest
            .iter()
            .position(|b| *b == 0)
            .ok_or_else(|| self.out_of_bounds(offset, rest.len() + 1))?;
        Ok(clean_line(&rest[..end]))
    }

    /// NUL-terminated UTF-16LE string.
    pub fn utf16_z(&self, offset: usize) -> Result<String, LnkError> {
        let rest = self.tail(offset)?.data;
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(LittleEndian::read_u16)
            .take_while(|u| *u != 0)
            .collect();
        if units.len() * 2 + 2 > rest.len() {
            return Err(self.out_of_bounds(offset, units.len() * 2 + 2));
        }
        Ok(clean_wide(&units))
    }

    /// ANSI string stored in a fixed-size field, cut at the first NUL.
    pub fn fixed_ascii(&self, offset: usize, len: usize) -> Result<String, LnkError> {
        let raw = self.bytes(offset, len)?;
        let end = raw.iter().position(|b| *b == 0).unwrap_or(raw.len());
        Ok(clean_line(&raw[..end]))
    }

    /// UTF-16LE string stored in a fixed-size field, cut at the first NUL.
    pub fn fixed_utf16(&self, offset: usize, len: usize) -> Result<String, LnkError> {
        let raw = self.bytes(offset, len)?;
        let units: Vec<u16> = raw
            .chunks_exact(2)
            .map(LittleEndian::read_u16)
            .take_while(|u| *u != 0)
            .collect();
        Ok(clean_wide(&units))
    }
}

/// Keep only bytes strictly between 20 and 128.
pub fn clean_line(raw: &[u8]) -> String {
    raw.iter()
        .filter(|b| **b > 20 && **b < 128)
        .map(|b| *b as char)
        .collect()
}

fn clean_wide(units: &[u16]) -> String {
    char::decode_utf16(units.iter().copied())
        .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
        .filter(|c| !c.is_control())
        .collect()
}

/// Format 16 bytes as a braced GUID. The first three fields are stored
/// little-endian on disk, the last eight bytes as-is. Any other length is
/// rendered as plain hex.
pub fn format_guid(raw: &[u8]) -> String {
    if raw.len() != 16 {
        return to_hex(raw);
    }
    format!(
        "{{{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{}-{}}}",
        raw[3],
        raw[2],
        raw[1],
        raw[0],
        raw[5],
        raw[4],
        raw[7],
        raw[6],
        to_hex(&raw[8..10]),
        to_hex(&raw[10..16])
    )
}

pub fn to_hex(raw: &[u8]) -> String {
    use std::fmt::Write;
    raw.iter().fold(String::with_capacity(raw.len() * 2), |mut s, b| {
        let _ = write!(s, "{:02x}", b);
        s
    })
}

/// FILETIME (100 ns ticks since 1601-01-01) to a UTC timestamp, truncated to
/// whole seconds.
pub fn filetime_to_datetime(ft: u64) -> Option<DateTime<Utc>> {
    let secs = (ft / FILETIME_TICKS_PER_SEC) as i64 - FILETIME_EPOCH_DELTA_SECS;
    Utc.timestamp_opt(secs, 0).single()
}

pub fn format_filetime(ft: u64) -> String {
    filetime_to_datetime(ft)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}

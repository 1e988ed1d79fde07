// Sources:
// - https://learn.microsoft.com/openspecs/windows_protocols/ms-shllink/c3376b21-0931-45e4-b2fc-a48ac0e60d15

//! The fixed 76-byte ShellLinkHeader found at offset 0 of every shortcut.

use log::{debug, error, warn};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::LnkError;
use crate::reader::{ByteReader, clean_line, format_guid};

pub const HEADER_SIZE: u32 = 0x4C;
pub const SHELL_LINK_CLSID: &str = "{00021401-0000-0000-c000-000000000046}";

/// Window show states, indexed by the raw ShowCommand value.
pub const SHOW_COMMANDS: [&str; 11] = [
    "SW_HIDE",
    "SW_NORMAL",
    "SW_SHOWMINIMIZED",
    "SW_MAXIMIZE",
    "SW_SHOWNOACTIVATE",
    "SW_SHOW",
    "SW_MINIMIZE",
    "SW_SHOWMINNOACTIVE",
    "SW_SHOWNA",
    "SW_RESTORE",
    "SW_SHOWDEFAULT",
];

/// Hot key modifier byte values and their names.
pub const HOTKEY_MODIFIERS: [(u8, &str); 4] = [
    (0x00, "UNSET"),
    (0x01, "HOTKEYF_SHIFT"),
    (0x02, "HOTKEYF_CONTROL"),
    (0x04, "HOTKEYF_ALT"),
];

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ShellLinkHeader {
    pub header_size: u32,           // 0x00
    pub class_id: String,           // 0x04
    pub link_flags: u32,            // 0x14
    pub file_attributes: u32,       // 0x18
    pub creation_time: u64,         // 0x1C
    pub access_time: u64,           // 0x24
    pub write_time: u64,            // 0x2C
    pub file_size: u32,             // 0x34
    pub icon_index: i32,            // 0x38
    pub show_command: ShowCommand,  // 0x3C
    pub hotkey: HotKey,             // 0x40
    pub reserved0: u16,             // 0x42
    pub reserved1: u32,             // 0x44
    pub reserved2: u32,             // 0x48
}

impl ShellLinkHeader {
    /// Decode the header at the start of `reader`. Any failure here is fatal
    /// to the whole decode.
    pub fn from_reader(reader: &ByteReader<'_>) -> Result<Self, LnkError> {
        let header_size = reader.u32(0)?;
        if header_size != HEADER_SIZE {
            error!(
                "Header size is 0x{:X}, this is not a shell link.",
                header_size
            );
            return Err(LnkError::MalformedHeader {
                declared: header_size,
            });
        }
        let h = reader.window(0, HEADER_SIZE as usize)?;

        let class_id = format_guid(h.bytes(0x04, 16)?);
        if class_id != SHELL_LINK_CLSID {
            warn!("Unexpected link class identifier {}", class_id);
        }

        let header = Self {
            header_size,
            class_id,
            link_flags: h.u32(0x14)?,
            file_attributes: h.u32(0x18)?,
            creation_time: h.u64(0x1C)?,
            access_time: h.u64(0x24)?,
            write_time: h.u64(0x2C)?,
            file_size: h.u32(0x34)?,
            icon_index: h.i32(0x38)?,
            show_command: ShowCommand::from_raw(h.u32(0x3C)?),
            hotkey: HotKey::from_bytes(h.u8(0x40)?, h.u8(0x41)?),
            reserved0: h.u16(0x42)?,
            reserved1: h.u32(0x44)?,
            reserved2: h.u32(0x48)?,
        };
        debug!(
            "Header decoded: link flags 0x{:08X}, attributes 0x{:08X}",
            header.link_flags, header.file_attributes
        );
        Ok(header)
    }
}

/// Window show state. Values outside the table are kept as-is.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ShowCommand {
    Known(String),
    Raw(u32),
}

impl ShowCommand {
    pub fn from_raw(raw: u32) -> Self {
        match SHOW_COMMANDS.get(raw as usize) {
            Some(name) => ShowCommand::Known(name.to_string()),
            None => ShowCommand::Raw(raw),
        }
    }
}

impl fmt::Display for ShowCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShowCommand::Known(name) => f.write_str(name),
            ShowCommand::Raw(raw) => write!(f, "{}", raw),
        }
    }
}

/// Hot key assignment: a virtual key code (low byte) and a modifier (high
/// byte). An unknown modifier keeps the raw 16-bit value.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum HotKey {
    Decoded {
        modifier: String,
        key: String,
        raw: u16,
    },
    Raw(u16),
}

impl HotKey {
    pub fn from_bytes(key: u8, modifier: u8) -> Self {
        let raw = u16::from_le_bytes([key, modifier]);
        match HOTKEY_MODIFIERS.iter().find(|(value, _)| *value == modifier) {
            Some((_, name)) => HotKey::Decoded {
                modifier: name.to_string(),
                key: key_name(key),
                raw,
            },
            None => HotKey::Raw(raw),
        }
    }
}

fn key_name(key: u8) -> String {
    match key {
        0x70..=0x87 => format!("F{}", key - 0x6F),
        0x90 => "NUM LOCK".to_string(),
        0x91 => "SCROLL LOCK".to_string(),
        _ => clean_line(&[key]),
    }
}

impl fmt::Display for HotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HotKey::Decoded { modifier, key, raw } => {
                let [lo, hi] = raw.to_le_bytes();
                write!(f, "{} - {} {{0x{:02x}{:02x}}}", modifier, key, lo, hi)
            }
            HotKey::Raw(raw) => write!(f, "{}", raw),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_bytes() -> Vec<u8> {
        let mut buf = vec![0u8; HEADER_SIZE as usize];
        buf[0] = 0x4C;
        buf[4..20].copy_from_slice(&[
            0x01, 0x14, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0xc0, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x46,
        ]);
        buf
    }

    #[test]
    fn test_header_fields() {
        let mut buf = header_bytes();
        buf[0x14..0x18].copy_from_slice(&0x0000_00A9u32.to_le_bytes());
        buf[0x18..0x1C].copy_from_slice(&0x20u32.to_le_bytes());
        buf[0x1C..0x24].copy_from_slice(&116_444_736_000_000_000u64.to_le_bytes());
        buf[0x34..0x38].copy_from_slice(&4096u32.to_le_bytes());
        buf[0x38..0x3C].copy_from_slice(&(-3i32).to_le_bytes());
        buf[0x3C..0x40].copy_from_slice(&7u32.to_le_bytes());
        buf[0x40] = b'K';
        buf[0x41] = 0x02;
        buf[0x44..0x48].copy_from_slice(&0xdeadu32.to_le_bytes());

        let h = ShellLinkHeader::from_reader(&ByteReader::new(&buf)).unwrap();
        assert_eq!(h.header_size, 76);
        assert_eq!(h.class_id, SHELL_LINK_CLSID);
        assert_eq!(h.link_flags, 0xA9);
        assert_eq!(h.file_attributes, 0x20);
        assert_eq!(h.creation_time, 116_444_736_000_000_000);
        assert_eq!(h.file_size, 4096);
        assert_eq!(h.icon_index, -3);
        assert_eq!(h.show_command, ShowCommand::Known("SW_SHOWMINNOACTIVE".into()));
        assert_eq!(h.hotkey.to_string(), "HOTKEYF_CONTROL - K {0x4b02}");
        assert_eq!(h.reserved1, 0xdead);
    }

    #[test]
    fn test_malformed_header_size() {
        let mut buf = header_bytes();
        buf[0] = 0x50;
        let err = ShellLinkHeader::from_reader(&ByteReader::new(&buf)).unwrap_err();
        assert_eq!(err, LnkError::MalformedHeader { declared: 0x50 });
    }

    #[test]
    fn test_truncated_header() {
        let buf = header_bytes();
        let err = ShellLinkHeader::from_reader(&ByteReader::new(&buf[..40])).unwrap_err();
        assert!(matches!(err, LnkError::OutOfBounds { .. }));
        assert!(ShellLinkHeader::from_reader(&ByteReader::new(&[])).is_err());
    }

    #[test]
    fn test_show_command_fallback() {
        assert_eq!(ShowCommand::from_raw(1).to_string(), "SW_NORMAL");
        assert_eq!(ShowCommand::from_raw(10).to_string(), "SW_SHOWDEFAULT");
        assert_eq!(ShowCommand::from_raw(11), ShowCommand::Raw(11));
    }

    #[test]
    fn test_hotkey_fallback() {
        assert_eq!(
            HotKey::from_bytes(0x70, 0x04).to_string(),
            "HOTKEYF_ALT - F1 {0x7004}"
        );
        assert_eq!(HotKey::from_bytes(0, 0).to_string(), "UNSET -  {0x0000}");
        // Shift+Control is not a single table entry.
        assert_eq!(HotKey::from_bytes(0x41, 0x03), HotKey::Raw(0x0341));
    }
}

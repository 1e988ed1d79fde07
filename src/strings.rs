// Sources:
// - https://learn.microsoft.com/openspecs/windows_protocols/ms-shllink/17b69472-0f34-4bcf-b290-eccdb8de224b

//! StringData: up to five counted strings stored back to back. Each string is
//! a 16-bit character count followed by that many characters, one byte each,
//! or two when the link is flagged as Unicode.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::Decoded;
use crate::error::LnkError;
use crate::flags::{
    HAS_ARGUMENTS, HAS_ICON_LOCATION, HAS_NAME, HAS_RELATIVE_PATH, HAS_WORKING_DIR, LinkFlags,
};
use crate::reader::{ByteReader, clean_line};

/// StringData fields in on-disk order, with the flag that enables each.
pub const STRING_FIELDS: [(u32, &str); 5] = [
    (HAS_NAME, "description"),
    (HAS_RELATIVE_PATH, "relative_path"),
    (HAS_WORKING_DIR, "working_directory"),
    (HAS_ARGUMENTS, "command_line_arguments"),
    (HAS_ICON_LOCATION, "icon_location"),
];

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StringData {
    pub description: Option<String>,
    pub relative_path: Option<String>,
    pub working_directory: Option<String>,
    pub command_line_arguments: Option<String>,
    pub icon_location: Option<String>,
    /// Absolute offset of each field that was read, by field name.
    pub offsets: Vec<FieldOffset>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FieldOffset {
    pub field: String,
    pub offset: usize,
}

impl StringData {
    pub fn is_empty(&self) -> bool {
        self.fields().iter().all(|(_, v)| v.is_none())
    }

    /// (name, value) pairs in on-disk order.
    pub fn fields(&self) -> [(&'static str, Option<&str>); 5] {
        [
            (STRING_FIELDS[0].1, self.description.as_deref()),
            (STRING_FIELDS[1].1, self.relative_path.as_deref()),
            (STRING_FIELDS[2].1, self.working_directory.as_deref()),
            (STRING_FIELDS[3].1, self.command_line_arguments.as_deref()),
            (STRING_FIELDS[4].1, self.icon_location.as_deref()),
        ]
    }

    pub fn offset_of(&self, field: &str) -> Option<usize> {
        self.offsets
            .iter()
            .find(|f| f.field == field)
            .map(|f| f.offset)
    }
}

/// Read the flag-gated strings starting at `offset` (absolute). A field whose
/// flag is clear takes no room. The first unreadable field ends the stage,
/// since every later field's position depends on it.
pub fn read_string_data(
    reader: &ByteReader<'_>,
    offset: usize,
    flags: LinkFlags,
) -> Decoded<StringData> {
    debug!("Reading StringData at 0x{:X}", offset);
    let unit = if flags.is_unicode() { 2 } else { 1 };
    let mut values: [Option<String>; 5] = Default::default();
    let mut offsets = Vec::new();
    let mut warnings = Vec::new();
    let mut cursor = offset;

    for (i, (flag, field)) in STRING_FIELDS.iter().enumerate() {
        if !flags.contains(*flag) {
            continue;
        }
        match read_counted_string(reader, cursor, unit) {
            Ok((text, next)) => {
                debug!("StringData {} at 0x{:X}: {:?}", field, cursor, text);
                offsets.push(FieldOffset {
                    field: field.to_string(),
                    offset: cursor,
                });
                values[i] = Some(text);
                cursor = next;
            }
            Err(e) => {
                warn!("StringData {} could not be read: {}", field, e);
                warnings.push(e);
                cursor = reader.len();
                break;
            }
        }
    }

    let [
        description,
        relative_path,
        working_directory,
        command_line_arguments,
        icon_location,
    ] = values;
    Decoded {
        value: Some(StringData {
            description,
            relative_path,
            working_directory,
            command_line_arguments,
            icon_location,
            offsets,
        }),
        next: cursor,
        warnings,
    }
}

/// One counted string at `offset`; returns the text and the offset right
/// after it.
fn read_counted_string(
    reader: &ByteReader<'_>,
    offset: usize,
    unit: usize,
) -> Result<(String, usize), LnkError> {
    let count = reader.u16(offset)? as usize;
    let len = count * unit;
    let raw = reader.bytes(offset + 2, len)?;
    Ok((clean_line(raw), offset + 2 + len))
}

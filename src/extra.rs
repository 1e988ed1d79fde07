// Sources:
// - https://learn.microsoft.com/openspecs/windows_protocols/ms-shllink/c41e062d-f764-4f13-bd4f-ea812ab9a4d1
// - https://learn.microsoft.com/openspecs/windows_protocols/ms-propstore/1eb58eb3-e7d8-4a09-ac0e-8bcb14b6fa0e

//! ExtraData: a chain of signature-tagged blocks that runs to the end of the
//! file. Each block starts with its size and signature, so an unknown or
//! malformed block can be stepped over without losing the ones after it.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::Decoded;
use crate::error::LnkError;
use crate::idlist::{ItemId, walk_items};
use crate::reader::{ByteReader, to_hex};

pub const ENVIRONMENT_VARIABLES_SIGNATURE: u32 = 0xA000_0001;
pub const CONSOLE_PROPERTIES_SIGNATURE: u32 = 0xA000_0002;
pub const TRACKER_SIGNATURE: u32 = 0xA000_0003;
pub const CONSOLE_CODEPAGE_SIGNATURE: u32 = 0xA000_0004;
pub const SPECIAL_FOLDER_SIGNATURE: u32 = 0xA000_0005;
pub const DARWIN_SIGNATURE: u32 = 0xA000_0006;
pub const ICON_LOCATION_SIGNATURE: u32 = 0xA000_0007;
pub const SHIM_LAYER_SIGNATURE: u32 = 0xA000_0008;
pub const PROPERTY_STORE_SIGNATURE: u32 = 0xA000_0009;
pub const KNOWN_FOLDER_SIGNATURE: u32 = 0xA000_000B;
pub const SHELL_ITEM_IDENTIFIER_SIGNATURE: u32 = 0xA000_000C;

/// Fewer remaining bytes than this cannot hold another block worth reading.
pub const MIN_BLOCK_REMAINDER: usize = 10;
/// A block size below this marks the TerminalBlock.
pub const TERMINAL_BLOCK_SIZE: u32 = 4;
const BLOCK_HEADER_SIZE: u32 = 8;
/// Size, version and format identifier of a property storage record.
const STORAGE_HEADER_SIZE: u32 = 0x18;

const TARGET_ANSI_LEN: usize = 260;
const TARGET_UNICODE_LEN: usize = 520;

/// Decodes the block of `size` bytes starting at absolute `offset`.
pub type BlockDecoder = fn(&ByteReader<'_>, usize, u32) -> Result<ExtraBlock, LnkError>;

pub const DECODERS: [(u32, &str, BlockDecoder); 11] = [
    (
        ENVIRONMENT_VARIABLES_SIGNATURE,
        "ENVIRONMENTAL_VARIABLES_LOCATION_BLOCK",
        parse_environment_block,
    ),
    (
        CONSOLE_PROPERTIES_SIGNATURE,
        "CONSOLE_PROPERTIES_BLOCK",
        parse_console_block,
    ),
    (
        TRACKER_SIGNATURE,
        "DISTRIBUTED_LINK_TRACKER_BLOCK",
        parse_tracker_block,
    ),
    (
        CONSOLE_CODEPAGE_SIGNATURE,
        "CONSOLE_CODEPAGE_BLOCK",
        parse_codepage_block,
    ),
    (
        SPECIAL_FOLDER_SIGNATURE,
        "SPECIAL_FOLDER_LOCATION_BLOCK",
        parse_special_folder_block,
    ),
    (DARWIN_SIGNATURE, "DARWIN_BLOCK", parse_darwin_block),
    (
        ICON_LOCATION_SIGNATURE,
        "ICON_LOCATION_BLOCK",
        parse_icon_block,
    ),
    (
        SHIM_LAYER_SIGNATURE,
        "SHIM_LAYER_BLOCK",
        parse_shim_layer_block,
    ),
    (
        PROPERTY_STORE_SIGNATURE,
        "METADATA_PROPERTIES_BLOCK",
        parse_metadata_block,
    ),
    (
        KNOWN_FOLDER_SIGNATURE,
        "KNOWN_FOLDER_LOCATION_BLOCK",
        parse_known_folder_block,
    ),
    (
        SHELL_ITEM_IDENTIFIER_SIGNATURE,
        "SHELL_ITEM_IDENTIFIER_BLOCK",
        parse_shell_item_block,
    ),
];

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum ExtraBlock {
    #[serde(rename = "ENVIRONMENTAL_VARIABLES_LOCATION_BLOCK")]
    EnvironmentVariables(TargetBlock),
    #[serde(rename = "CONSOLE_PROPERTIES_BLOCK")]
    ConsoleProperties(ConsoleBlock),
    #[serde(rename = "DISTRIBUTED_LINK_TRACKER_BLOCK")]
    DistributedLinkTracker(TrackerBlock),
    #[serde(rename = "CONSOLE_CODEPAGE_BLOCK")]
    ConsoleCodepage(CodepageBlock),
    #[serde(rename = "SPECIAL_FOLDER_LOCATION_BLOCK")]
    SpecialFolder(SpecialFolderBlock),
    #[serde(rename = "DARWIN_BLOCK")]
    Darwin(TargetBlock),
    #[serde(rename = "ICON_LOCATION_BLOCK")]
    IconLocation(TargetBlock),
    #[serde(rename = "SHIM_LAYER_BLOCK")]
    ShimLayer(ShimBlock),
    #[serde(rename = "METADATA_PROPERTIES_BLOCK")]
    MetadataProperties(PropertyStoreBlock),
    #[serde(rename = "KNOWN_FOLDER_LOCATION_BLOCK")]
    KnownFolder(KnownFolderBlock),
    #[serde(rename = "SHELL_ITEM_IDENTIFIER_BLOCK")]
    ShellItemIdentifier(ShellItemBlock),
    /// Unknown signature, or a known one that failed to decode.
    #[serde(rename = "OPAQUE_BLOCK")]
    Opaque {
        offset: usize,
        signature: u32,
        size: u32,
    },
}

impl ExtraBlock {
    pub fn signature(&self) -> u32 {
        match self {
            ExtraBlock::EnvironmentVariables(_) => ENVIRONMENT_VARIABLES_SIGNATURE,
            ExtraBlock::ConsoleProperties(_) => CONSOLE_PROPERTIES_SIGNATURE,
            ExtraBlock::DistributedLinkTracker(_) => TRACKER_SIGNATURE,
            ExtraBlock::ConsoleCodepage(_) => CONSOLE_CODEPAGE_SIGNATURE,
            ExtraBlock::SpecialFolder(_) => SPECIAL_FOLDER_SIGNATURE,
            ExtraBlock::Darwin(_) => DARWIN_SIGNATURE,
            ExtraBlock::IconLocation(_) => ICON_LOCATION_SIGNATURE,
            ExtraBlock::ShimLayer(_) => SHIM_LAYER_SIGNATURE,
            ExtraBlock::MetadataProperties(_) => PROPERTY_STORE_SIGNATURE,
            ExtraBlock::KnownFolder(_) => KNOWN_FOLDER_SIGNATURE,
            ExtraBlock::ShellItemIdentifier(_) => SHELL_ITEM_IDENTIFIER_SIGNATURE,
            ExtraBlock::Opaque { signature, .. } => *signature,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ExtraBlock::Opaque { .. } => "OPAQUE_BLOCK",
            block => DECODERS
                .iter()
                .find(|(sig, _, _)| *sig == block.signature())
                .map(|(_, name, _)| *name)
                .unwrap_or("OPAQUE_BLOCK"),
        }
    }
}

/// Layout shared by the environment, Darwin and icon blocks: an ANSI and a
/// Unicode copy of one path or identifier.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TargetBlock {
    pub size: u32,
    pub target_ansi: String,
    pub target_unicode: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConsoleBlock {
    pub size: u32,
    pub fill_attributes: u16,
    pub popup_fill_attributes: u16,
    pub screen_buffer_size_x: i16,
    pub screen_buffer_size_y: i16,
    pub window_size_x: i16,
    pub window_size_y: i16,
    pub window_origin_x: i16,
    pub window_origin_y: i16,
    pub font_size: u32,
    pub font_family: u32,
    pub font_weight: u32,
    pub face_name: String,
    pub cursor_size: u32,
    pub full_screen: u32,
    pub quick_edit: u32,
    pub insert_mode: u32,
    pub auto_position: u32,
    pub history_buffer_size: u32,
    pub number_of_history_buffers: u32,
    pub history_no_dup: u32,
    pub color_table: Vec<u32>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrackerBlock {
    pub size: u32,
    pub length: u32,
    pub version: u32,
    pub machine_identifier: String,
    pub droid_volume_identifier: String,
    pub droid_file_identifier: String,
    pub birth_droid_volume_identifier: String,
    pub birth_droid_file_identifier: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CodepageBlock {
    pub size: u32,
    pub code_page: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SpecialFolderBlock {
    pub size: u32,
    pub special_folder_id: u32,
    pub offset: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ShimBlock {
    pub size: u32,
    pub layer_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PropertyStoreBlock {
    pub size: u32,
    pub storages: Vec<PropertyStorage>,
}

/// One serialized property storage record. Only records large enough to
/// hold a format identifier carry one.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PropertyStorage {
    pub offset: usize, // absolute
    pub size: u32,
    pub version: Option<u32>,
    pub format_id: Option<String>,
    pub value: Option<String>, // hex
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KnownFolderBlock {
    pub size: u32,
    pub known_folder_id: String,
    pub offset: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ShellItemBlock {
    pub size: u32,
    pub items: Vec<ItemId>,
}

/// What happened to one block of the chain.
#[derive(Debug)]
enum BlockOutcome {
    Decoded(ExtraBlock, usize),
    Skipped(ExtraBlock, LnkError, usize),
    Terminal,
    Halt(LnkError),
}

/// Walk the ExtraData chain from `offset` (absolute) until the buffer is
/// exhausted, a TerminalBlock is met, or a block size makes it impossible to
/// find the next one.
pub fn read_extra_data(reader: &ByteReader<'_>, offset: usize) -> Decoded<Vec<ExtraBlock>> {
    debug!("Reading ExtraData at 0x{:X}", offset);
    let mut blocks = Vec::new();
    let mut warnings = Vec::new();
    let mut cursor = offset;

    while cursor.saturating_add(MIN_BLOCK_REMAINDER) <= reader.len() {
        match read_block(reader, cursor) {
            BlockOutcome::Decoded(block, next) => {
                debug!("{} at 0x{:X}", block.name(), cursor);
                blocks.push(block);
                cursor = next;
            }
            BlockOutcome::Skipped(block, e, next) => {
                warn!("Skipping extra block at 0x{:X}: {}", cursor, e);
                blocks.push(block);
                warnings.push(e);
                cursor = next;
            }
            BlockOutcome::Terminal => {
                debug!("TerminalBlock at 0x{:X}", cursor);
                break;
            }
            BlockOutcome::Halt(e) => {
                warn!("ExtraData chain stops at 0x{:X}: {}", cursor, e);
                warnings.push(e);
                break;
            }
        }
    }

    Decoded {
        value: Some(blocks),
        next: cursor,
        warnings,
    }
}

fn read_block(reader: &ByteReader<'_>, offset: usize) -> BlockOutcome {
    let (size, signature) = match (reader.u32(offset), reader.u32(offset + 4)) {
        (Ok(size), Ok(signature)) => (size, signature),
        (Err(e), _) | (_, Err(e)) => return BlockOutcome::Halt(e),
    };
    if size < TERMINAL_BLOCK_SIZE {
        return BlockOutcome::Terminal;
    }
    let next = offset + size as usize;
    if size < BLOCK_HEADER_SIZE || next > reader.len() {
        return BlockOutcome::Halt(LnkError::ImplausibleBlockSize { offset, size });
    }

    let opaque = ExtraBlock::Opaque {
        offset,
        signature,
        size,
    };
    match DECODERS.iter().find(|(sig, _, _)| *sig == signature) {
        Some((_, _, decode)) => match decode(reader, offset, size) {
            Ok(block) => BlockOutcome::Decoded(block, next),
            Err(e) => BlockOutcome::Skipped(opaque, e, next),
        },
        None => BlockOutcome::Skipped(
            opaque,
            LnkError::UnknownExtraSignature { signature, offset },
            next,
        ),
    }
}

fn parse_target_block(
    reader: &ByteReader<'_>,
    offset: usize,
    size: u32,
) -> Result<TargetBlock, LnkError> {
    let b = reader.window(offset, size as usize)?;
    Ok(TargetBlock {
        size,
        target_ansi: b.fixed_ascii(0x08, TARGET_ANSI_LEN)?,
        target_unicode: b.fixed_utf16(0x08 + TARGET_ANSI_LEN, TARGET_UNICODE_LEN)?,
    })
}

fn parse_environment_block(
    reader: &ByteReader<'_>,
    offset: usize,
    size: u32,
) -> Result<ExtraBlock, LnkError> {
    parse_target_block(reader, offset, size).map(ExtraBlock::EnvironmentVariables)
}

fn parse_darwin_block(
    reader: &ByteReader<'_>,
    offset: usize,
    size: u32,
) -> Result<ExtraBlock, LnkError> {
    parse_target_block(reader, offset, size).map(ExtraBlock::Darwin)
}

fn parse_icon_block(
    reader: &ByteReader<'_>,
    offset: usize,
    size: u32,
) -> Result<ExtraBlock, LnkError> {
    parse_target_block(reader, offset, size).map(ExtraBlock::IconLocation)
}

fn parse_console_block(
    reader: &ByteReader<'_>,
    offset: usize,
    size: u32,
) -> Result<ExtraBlock, LnkError> {
    let b = reader.window(offset, size as usize)?;
    let color_table = (0..16)
        .map(|i| b.u32(0x8C + i * 4))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ExtraBlock::ConsoleProperties(ConsoleBlock {
        size,
        fill_attributes: b.u16(0x08)?,
        popup_fill_attributes: b.u16(0x0A)?,
        screen_buffer_size_x: b.i16(0x0C)?,
        screen_buffer_size_y: b.i16(0x0E)?,
        window_size_x: b.i16(0x10)?,
        window_size_y: b.i16(0x12)?,
        window_origin_x: b.i16(0x14)?,
        window_origin_y: b.i16(0x16)?,
        font_size: b.u32(0x20)?,
        font_family: b.u32(0x24)?,
        font_weight: b.u32(0x28)?,
        face_name: b.fixed_utf16(0x2C, 64)?,
        cursor_size: b.u32(0x6C)?,
        full_screen: b.u32(0x70)?,
        quick_edit: b.u32(0x74)?,
        insert_mode: b.u32(0x78)?,
        auto_position: b.u32(0x7C)?,
        history_buffer_size: b.u32(0x80)?,
        number_of_history_buffers: b.u32(0x84)?,
        history_no_dup: b.u32(0x88)?,
        color_table,
    }))
}

fn parse_tracker_block(
    reader: &ByteReader<'_>,
    offset: usize,
    size: u32,
) -> Result<ExtraBlock, LnkError> {
    let b = reader.window(offset, size as usize)?;
    Ok(ExtraBlock::DistributedLinkTracker(TrackerBlock {
        size,
        length: b.u32(0x08)?,
        version: b.u32(0x0C)?,
        machine_identifier: b.fixed_ascii(0x10, 16)?,
        droid_volume_identifier: b.guid(0x20)?,
        droid_file_identifier: b.guid(0x30)?,
        birth_droid_volume_identifier: b.guid(0x40)?,
        birth_droid_file_identifier: b.guid(0x50)?,
    }))
}

fn parse_codepage_block(
    reader: &ByteReader<'_>,
    offset: usize,
    size: u32,
) -> Result<ExtraBlock, LnkError> {
    let b = reader.window(offset, size as usize)?;
    Ok(ExtraBlock::ConsoleCodepage(CodepageBlock {
        size,
        code_page: b.u32(0x08)?,
    }))
}

fn parse_special_folder_block(
    reader: &ByteReader<'_>,
    offset: usize,
    size: u32,
) -> Result<ExtraBlock, LnkError> {
    let b = reader.window(offset, size as usize)?;
    Ok(ExtraBlock::SpecialFolder(SpecialFolderBlock {
        size,
        special_folder_id: b.u32(0x08)?,
        offset: b.u32(0x0C)?,
    }))
}

fn parse_shim_layer_block(
    reader: &ByteReader<'_>,
    offset: usize,
    size: u32,
) -> Result<ExtraBlock, LnkError> {
    let b = reader.window(offset, size as usize)?;
    Ok(ExtraBlock::ShimLayer(ShimBlock {
        size,
        layer_name: b.fixed_utf16(0x08, b.len() - 0x08)?,
    }))
}

/// Property storage records follow the block header back to back. The walk
/// stops on a zero-size record (the store terminator), on a record that does
/// not fit in what is left of the block, or when the block is used up.
fn parse_metadata_block(
    reader: &ByteReader<'_>,
    offset: usize,
    size: u32,
) -> Result<ExtraBlock, LnkError> {
    let b = reader.window(offset, size as usize)?;
    let mut storages = Vec::new();
    let mut pos = 0x08usize;
    while pos + 4 <= b.len() {
        let storage_size = b.u32(pos)?;
        if storage_size == 0 {
            break;
        }
        if pos.saturating_add(storage_size as usize) > b.len() {
            debug!(
                "Property storage at 0x{:X} declares 0x{:X} bytes, past its block.",
                b.origin() + pos,
                storage_size
            );
            break;
        }
        let record = b.window(pos, storage_size as usize)?;
        let (version, format_id, value) = if storage_size >= STORAGE_HEADER_SIZE {
            let header = STORAGE_HEADER_SIZE as usize;
            (
                Some(record.u32(0x04)?),
                Some(record.guid(0x08)?),
                Some(to_hex(record.bytes(header, record.len() - header)?)),
            )
        } else {
            (None, None, None)
        };
        storages.push(PropertyStorage {
            offset: record.origin(),
            size: storage_size,
            version,
            format_id,
            value,
        });
        pos += storage_size as usize;
    }
    Ok(ExtraBlock::MetadataProperties(PropertyStoreBlock {
        size,
        storages,
    }))
}

fn parse_known_folder_block(
    reader: &ByteReader<'_>,
    offset: usize,
    size: u32,
) -> Result<ExtraBlock, LnkError> {
    let b = reader.window(offset, size as usize)?;
    Ok(ExtraBlock::KnownFolder(KnownFolderBlock {
        size,
        known_folder_id: b.guid(0x08)?,
        offset: b.u32(0x18)?,
    }))
}

fn parse_shell_item_block(
    reader: &ByteReader<'_>,
    offset: usize,
    size: u32,
) -> Result<ExtraBlock, LnkError> {
    let b = reader.window(offset, size as usize)?;
    Ok(ExtraBlock::ShellItemIdentifier(ShellItemBlock {
        size,
        items: walk_items(&b.tail(0x08)?),
    }))
}

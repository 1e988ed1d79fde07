// Sources:
// - https://learn.microsoft.com/openspecs/windows_protocols/ms-shllink/16cb4ca1-9339-4d0c-a68d-bf1d6cc0f943
// - https://github.com/libyal/liblnk/blob/main/documentation/Windows%20Shortcut%20File%20(LNK)%20format.asciidoc

use log::{debug, info, warn};
use prettytable::{Table, row};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use error::{DecodeWarning, LnkError, Stage};
use extra::{ExtraBlock, read_extra_data};
use flags::{FileFlags, HAS_ARGUMENTS, HAS_RELATIVE_PATH, HAS_TARGET_ID_LIST, LinkFlags};
use header::{HEADER_SIZE, ShellLinkHeader};
use idlist::{IdList, read_id_list};
use linkinfo::{LinkInfo, LinkLocation, read_link_info};
use reader::{ByteReader, format_filetime};
use strings::{StringData, read_string_data};

pub mod error;
pub mod extra;
pub mod flags;
pub mod header;
pub mod idlist;
pub mod linkinfo;
pub mod reader;
pub mod strings;

/// Output of one decode stage: the value if it could be read, where the next
/// stage starts, and the errors that were absorbed on the way.
#[derive(Debug, Clone)]
pub struct Decoded<T> {
    pub value: Option<T>,
    pub next: usize,
    pub warnings: Vec<LnkError>,
}

impl<T> Decoded<T> {
    pub fn ok(value: T, next: usize) -> Self {
        Self {
            value: Some(value),
            next,
            warnings: Vec::new(),
        }
    }

    pub fn degraded(error: LnkError, next: usize) -> Self {
        Self {
            value: None,
            next,
            warnings: vec![error],
        }
    }
}

/// A decoded shortcut.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LnkFile {
    pub header: ShellLinkHeader,
    pub link_flags: LinkFlags,
    pub file_flags: FileFlags,
    pub id_list: Option<IdList>,
    pub link_info: Option<LinkInfo>,
    pub string_data: StringData,
    pub extra_blocks: Vec<ExtraBlock>,
    pub warnings: Vec<DecodeWarning>,
    pub size: usize,
}

impl LnkFile {
    /// Decode a shortcut held in memory. Only a bad header is fatal, every
    /// later stage degrades into a warning and decoding goes on.
    pub fn from_bytes(data: &[u8]) -> Result<Self, LnkError> {
        let reader = ByteReader::new(data);
        let header = ShellLinkHeader::from_reader(&reader)?;
        let link_flags = LinkFlags(header.link_flags);
        let file_flags = FileFlags(header.file_attributes);
        debug!("Link flags: {}", link_flags.names().join(", "));

        let mut warnings = Vec::new();
        let mut cursor = HEADER_SIZE as usize;

        let id_list = if link_flags.contains(HAS_TARGET_ID_LIST) {
            let out = read_id_list(&reader, cursor);
            cursor = out.next;
            collect(&mut warnings, Stage::IdList, out.warnings);
            out.value
        } else {
            None
        };

        let link_info = if link_flags.has_link_info() {
            let out = read_link_info(&reader, cursor);
            cursor = out.next;
            collect(&mut warnings, Stage::LinkInfo, out.warnings);
            out.value
        } else {
            None
        };

        let out = read_string_data(&reader, cursor, link_flags);
        cursor = out.next;
        collect(&mut warnings, Stage::StringData, out.warnings);
        let string_data = out.value.unwrap_or_default();

        let out = read_extra_data(&reader, cursor);
        collect(&mut warnings, Stage::ExtraData, out.warnings);
        let extra_blocks = out.value.unwrap_or_default();

        if warnings.is_empty() {
            info!("Shortcut of {} bytes fully decoded.", data.len());
        } else {
            warn!(
                "Shortcut of {} bytes decoded with {} warning(s).",
                data.len(),
                warnings.len()
            );
        }

        Ok(Self {
            header,
            link_flags,
            file_flags,
            id_list,
            link_info,
            string_data,
            extra_blocks,
            warnings,
            size: data.len(),
        })
    }

    /// True when at least one stage was only partially decoded.
    pub fn is_partial(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Reject a best-effort decode.
    pub fn into_complete(self) -> Result<Self, LnkError> {
        if self.is_partial() {
            Err(LnkError::PartialDecode {
                degraded: self.degraded_stages(),
            })
        } else {
            Ok(self)
        }
    }

    /// Number of distinct stages that recorded a warning.
    pub fn degraded_stages(&self) -> usize {
        let mut stages: Vec<Stage> = self.warnings.iter().map(|w| w.stage).collect();
        stages.dedup();
        stages.len()
    }

    /// Relative path, then a space and the arguments. Each part is empty when
    /// its flag is clear, so an arguments-only link starts with the space.
    pub fn command(&self) -> String {
        let mut command = String::new();
        if self.link_flags.contains(HAS_RELATIVE_PATH) {
            command.push_str(self.string_data.relative_path.as_deref().unwrap_or_default());
        }
        if self.link_flags.contains(HAS_ARGUMENTS) {
            command.push(' ');
            command.push_str(
                self.string_data
                    .command_line_arguments
                    .as_deref()
                    .unwrap_or_default(),
            );
        }
        command
    }

    /// Structured report. `verbose` adds the layout fields (reserved words,
    /// sizes and offsets) that only matter when checking the raw file.
    pub fn to_json(&self, verbose: bool) -> Value {
        let h = &self.header;
        let mut header = json!({
            "class_id": h.class_id,
            "link_flags": self.link_flags.names(),
            "file_flags": self.file_flags.names(),
            "creation_time": format_filetime(h.creation_time),
            "access_time": format_filetime(h.access_time),
            "write_time": format_filetime(h.write_time),
            "file_size": h.file_size,
            "icon_index": h.icon_index,
            "windowstyle": h.show_command.to_string(),
            "hotkey": h.hotkey.to_string(),
        });
        if verbose {
            header["header_size"] = json!(h.header_size);
            header["link_flags_raw"] = json!(h.link_flags);
            header["file_flags_raw"] = json!(h.file_attributes);
            header["reserved0"] = json!(h.reserved0);
            header["reserved1"] = json!(h.reserved1);
            header["reserved2"] = json!(h.reserved2);
        }

        let id_list = self.id_list.as_ref().map(|list| {
            let mut v = json!({ "items": list.items });
            if verbose {
                v["size"] = json!(list.size);
            }
            v
        });

        let link_info = self.link_info.as_ref().map(|info| {
            let mut v = serde_json::to_value(info).unwrap_or_else(|_| json!({}));
            v["location"] = json!(info.location_name());
            v["location_info"] = match &info.location {
                Some(LinkLocation::VolumeIdAndLocalBasePath(local)) => serde_json::to_value(local),
                Some(LinkLocation::CommonNetworkRelativeLinkAndPathSuffix(net)) => {
                    serde_json::to_value(net)
                }
                None => Ok(Value::Null),
            }
            .unwrap_or(Value::Null);
            if !verbose {
                strip_layout_fields(&mut v);
            }
            v
        });

        let mut data = Map::new();
        for (name, value) in self.string_data.fields() {
            if let Some(text) = value {
                data.insert(name.to_string(), json!(text));
            }
        }
        if verbose {
            data.insert("offsets".to_string(), json!(self.string_data.offsets));
        }

        let extra: Vec<Value> = self
            .extra_blocks
            .iter()
            .map(|b| serde_json::to_value(b).unwrap_or_else(|_| json!({ "type": b.name() })))
            .collect();

        json!({
            "header": header,
            "target": id_list,
            "link_info": link_info,
            "data": data,
            "extra": extra,
            "command": self.command(),
            "partial": self.is_partial(),
            "warnings": self.warnings.iter().map(|w| w.to_string()).collect::<Vec<_>>(),
        })
    }

    pub fn to_string(&self) -> String {
        let h = &self.header;
        let mut out = String::new();

        let mut hdr = Table::new();
        hdr.add_row(row!["Windows Shortcut Information"]);
        hdr.add_row(row![b -> "Link Flags", self.link_flags.names().join(" | ")]);
        hdr.add_row(row![b -> "File Flags", self.file_flags.names().join(" | ")]);
        hdr.add_row(row![b -> "Creation Timestamp", format_filetime(h.creation_time)]);
        hdr.add_row(row![b -> "Modified Timestamp", format_filetime(h.write_time)]);
        hdr.add_row(row![b -> "Accessed Timestamp", format_filetime(h.access_time)]);
        hdr.add_row(row![b -> "File Size", format!("{} (r: {})", h.file_size, self.size)]);
        hdr.add_row(row![b -> "Icon Index", h.icon_index]);
        hdr.add_row(row![b -> "Window Style", h.show_command]);
        hdr.add_row(row![b -> "HotKey", h.hotkey]);
        if let Some(list) = &self.id_list {
            hdr.add_row(row![b -> "Target ID List", format!("{} item(s), {} bytes", list.items.len(), list.size)]);
        }
        out.push_str(&hdr.to_string());
        out.push('\n');

        if !self.string_data.is_empty() {
            let mut t = Table::new();
            t.add_row(row!["String Data"]);
            for (name, value) in self.string_data.fields() {
                if let Some(text) = value {
                    t.add_row(row![b -> name, text]);
                }
            }
            out.push_str(&t.to_string());
            out.push('\n');
        }

        if let Some(info) = &self.link_info {
            let mut t = Table::new();
            t.add_row(row!["Link Info"]);
            t.add_row(row![b -> "Location", info.location_name()]);
            match &info.location {
                Some(LinkLocation::VolumeIdAndLocalBasePath(local)) => {
                    t.add_row(row![b -> "Drive Type", local.drive_type]);
                    t.add_row(row![b -> "Drive Serial Number", format!("0x{:08X}", local.drive_serial_number)]);
                    t.add_row(row![b -> "Volume Label", local.volume_label.clone().unwrap_or_default()]);
                    if let Some(path) = &local.local_base_path {
                        t.add_row(row![b -> "Local Base Path", path]);
                    }
                    if let Some(path) = &local.local_base_path_unicode {
                        t.add_row(row![b -> "Local Base Path (Unicode)", path]);
                    }
                }
                Some(LinkLocation::CommonNetworkRelativeLinkAndPathSuffix(net)) => {
                    if let Some(name) = &net.net_name {
                        t.add_row(row![b -> "Net Name", name]);
                    }
                    if let Some(name) = &net.device_name {
                        t.add_row(row![b -> "Device Name", name]);
                    }
                    if let Some(provider) = net.network_provider_type {
                        t.add_row(row![b -> "Network Provider", format!("0x{:08X}", provider)]);
                    }
                }
                None => {}
            }
            if let Some(suffix) = &info.common_path_suffix {
                t.add_row(row![b -> "Common Path Suffix", suffix]);
            }
            out.push_str(&t.to_string());
            out.push('\n');
        }

        if !self.extra_blocks.is_empty() {
            let mut t = Table::new();
            t.add_row(row!["Extra Data", "Summary"]);
            for block in &self.extra_blocks {
                t.add_row(row![b -> block.name(), extra_summary(block)]);
            }
            out.push_str(&t.to_string());
            out.push('\n');
        }

        if !self.warnings.is_empty() {
            let mut t = Table::new();
            t.add_row(row!["Warnings"]);
            for w in &self.warnings {
                t.add_row(row![w]);
            }
            out.push_str(&t.to_string());
        }
        out
    }
}

fn collect(into: &mut Vec<DecodeWarning>, stage: Stage, errors: Vec<LnkError>) {
    into.extend(errors.into_iter().map(|e| DecodeWarning::new(stage, e)));
}

/// Drop the fields that describe LinkInfo's layout rather than its content.
fn strip_layout_fields(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|key, _| !is_layout_field(key));
            map.values_mut().for_each(strip_layout_fields);
        }
        Value::Array(items) => items.iter_mut().for_each(strip_layout_fields),
        _ => {}
    }
}

fn is_layout_field(key: &str) -> bool {
    key == "size" || key.ends_with("_size") || key.contains("_offset")
}

fn extra_summary(block: &ExtraBlock) -> String {
    match block {
        ExtraBlock::EnvironmentVariables(t)
        | ExtraBlock::Darwin(t)
        | ExtraBlock::IconLocation(t) => {
            if t.target_unicode.is_empty() {
                t.target_ansi.clone()
            } else {
                t.target_unicode.clone()
            }
        }
        ExtraBlock::ConsoleProperties(c) => format!(
            "{} {}x{}, buffer {}x{}",
            c.face_name, c.window_size_x, c.window_size_y, c.screen_buffer_size_x, c.screen_buffer_size_y
        ),
        ExtraBlock::DistributedLinkTracker(t) => format!(
            "machine {} volume {} file {}",
            t.machine_identifier, t.droid_volume_identifier, t.droid_file_identifier
        ),
        ExtraBlock::ConsoleCodepage(c) => format!("code page {}", c.code_page),
        ExtraBlock::SpecialFolder(s) => format!("folder id {}", s.special_folder_id),
        ExtraBlock::ShimLayer(s) => s.layer_name.clone(),
        ExtraBlock::MetadataProperties(p) => format!("{} storage(s)", p.storages.len()),
        ExtraBlock::KnownFolder(k) => k.known_folder_id.clone(),
        ExtraBlock::ShellItemIdentifier(s) => format!("{} item(s)", s.items.len()),
        ExtraBlock::Opaque {
            offset,
            signature,
            size,
        } => format!("signature 0x{:08X}, {} bytes at 0x{:X}", signature, size, offset),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::{HAS_LINK_INFO, HAS_NAME};

    fn header(link_flags: u32) -> Vec<u8> {
        let mut h = vec![0u8; HEADER_SIZE as usize];
        h[0..4].copy_from_slice(&HEADER_SIZE.to_le_bytes());
        h[0x04..0x14].copy_from_slice(&[
            0x01, 0x14, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0xc0, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x46,
        ]);
        h[0x14..0x18].copy_from_slice(&link_flags.to_le_bytes());
        h[0x1C..0x24].copy_from_slice(&116_444_736_000_000_000u64.to_le_bytes());
        h[0x3C..0x40].copy_from_slice(&1u32.to_le_bytes());
        h
    }

    fn counted(s: &str) -> Vec<u8> {
        let mut out = (s.len() as u16).to_le_bytes().to_vec();
        out.extend_from_slice(s.as_bytes());
        out
    }

    #[test]
    fn test_header_only() {
        let lnk = LnkFile::from_bytes(&header(0)).unwrap();
        assert!(!lnk.is_partial());
        assert!(lnk.id_list.is_none());
        assert!(lnk.link_info.is_none());
        assert!(lnk.string_data.is_empty());
        assert!(lnk.extra_blocks.is_empty());
        assert_eq!(lnk.command(), "");
        assert!(lnk.into_complete().is_ok());
    }

    #[test]
    fn test_command_without_arguments() {
        let mut buf = header(HAS_RELATIVE_PATH);
        buf.extend(counted("..\\calc.exe"));
        let lnk = LnkFile::from_bytes(&buf).unwrap();
        assert_eq!(lnk.command(), "..\\calc.exe");
    }

    #[test]
    fn test_arguments_without_relative_path() {
        let mut buf = header(HAS_ARGUMENTS);
        buf.extend(counted("/c whoami"));
        let lnk = LnkFile::from_bytes(&buf).unwrap();
        assert_eq!(lnk.string_data.command_line_arguments.as_deref(), Some("/c whoami"));
        assert_eq!(lnk.command(), " /c whoami");
    }

    #[test]
    fn test_link_info_past_end_marks_partial() {
        let mut buf = header(HAS_LINK_INFO);
        let mut li = vec![0u8; 0x1C];
        li[0..4].copy_from_slice(&0x1000u32.to_le_bytes());
        li[4..8].copy_from_slice(&0x1Cu32.to_le_bytes());
        buf.extend(li);
        buf.extend_from_slice(&12u32.to_le_bytes());
        buf.extend_from_slice(&crate::extra::CONSOLE_CODEPAGE_SIGNATURE.to_le_bytes());
        buf.extend_from_slice(&437u32.to_le_bytes());
        let lnk = LnkFile::from_bytes(&buf).unwrap();
        assert!(lnk.link_info.is_some());
        assert!(lnk.extra_blocks.is_empty());
        assert!(lnk.is_partial());
        assert_eq!(lnk.warnings.len(), 1);
        assert_eq!(lnk.warnings[0].stage, Stage::LinkInfo);
        assert!(matches!(
            lnk.warnings[0].error,
            LnkError::OutOfBounds { len: 0x1000, .. }
        ));
    }

    #[test]
    fn test_truncated_link_info_is_partial() {
        let mut buf = header(HAS_LINK_INFO);
        buf.extend_from_slice(&0x200u32.to_le_bytes());
        let lnk = LnkFile::from_bytes(&buf).unwrap();
        assert!(lnk.link_info.is_none());
        assert!(lnk.is_partial());
        assert_eq!(lnk.warnings[0].stage, Stage::LinkInfo);
        assert_eq!(
            lnk.into_complete().unwrap_err(),
            LnkError::PartialDecode { degraded: 1 }
        );
    }

    #[test]
    fn test_terse_json_drops_layout_fields() {
        let mut buf = header(HAS_NAME);
        buf.extend(counted("hello"));
        let lnk = LnkFile::from_bytes(&buf).unwrap();

        let terse = lnk.to_json(false);
        assert!(terse["header"].get("reserved0").is_none());
        assert!(terse["header"].get("header_size").is_none());
        assert_eq!(terse["header"]["creation_time"], "1970-01-01 00:00:00");
        assert_eq!(terse["header"]["windowstyle"], "SW_NORMAL");
        assert_eq!(terse["data"]["description"], "hello");
        assert!(terse["data"].get("offsets").is_none());

        let verbose = lnk.to_json(true);
        assert_eq!(verbose["header"]["header_size"], 0x4C);
        assert_eq!(verbose["header"]["reserved2"], 0);
        assert_eq!(verbose["data"]["offsets"][0]["offset"], 0x4C);
    }

    #[test]
    fn test_layout_field_filter() {
        let mut v = json!({
            "size": 1,
            "header_size": 2,
            "volume_id_offset": 3,
            "local_base_path_offset_unicode": 4,
            "drive_serial_number": 5,
            "nested": [{ "net_name_offset": 6, "net_name": "x" }],
        });
        strip_layout_fields(&mut v);
        assert_eq!(
            v,
            json!({ "drive_serial_number": 5, "nested": [{ "net_name": "x" }] })
        );
    }

    #[test]
    fn test_report_mentions_sections() {
        let mut buf = header(HAS_NAME | HAS_RELATIVE_PATH);
        buf.extend(counted("desc"));
        buf.extend(counted("..\\a.exe"));
        let report = LnkFile::from_bytes(&buf).unwrap().to_string();
        assert!(report.contains("Windows Shortcut Information"));
        assert!(report.contains("String Data"));
        assert!(report.contains("..\\a.exe"));
        assert!(!report.contains("Warnings"));
    }
}

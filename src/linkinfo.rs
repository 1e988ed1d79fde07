// Sources:
// - https://learn.microsoft.com/openspecs/windows_protocols/ms-shllink/6813269d-0cc8-4be2-933f-e96e8e3412dc
// - https://learn.microsoft.com/openspecs/windows_protocols/ms-shllink/b7b3eea7-dbff-4275-bd58-83ba3f12d87a
// - https://learn.microsoft.com/openspecs/windows_protocols/ms-shllink/23bb5877-e3dd-4799-9f50-79f05f938537

//! LinkInfo: where the target lives, either on a local volume or behind a
//! network share.
//!
//! Offset anchors, which is where most LinkInfo bugs come from:
//! - `VolumeIDOffset`, `LocalBasePathOffset*`, `CommonNetworkRelativeLinkOffset`
//!   and `CommonPathSuffixOffset*` are relative to the start of LinkInfo.
//! - `VolumeLabelOffset*` are relative to the start of the VolumeID.
//! - `NetNameOffset*` and `DeviceNameOffset*` are relative to the start of the
//!   CommonNetworkRelativeLink.
//!
//! Each parser below receives a `ByteReader` anchored on the structure its
//! offsets are relative to.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Decoded;
use crate::error::LnkError;
use crate::reader::ByteReader;

// LinkInfoFlags
pub const VOLUME_ID_AND_LOCAL_BASE_PATH: u32 = 0x0000_0001;
pub const COMMON_NETWORK_RELATIVE_LINK_AND_PATH_SUFFIX: u32 = 0x0000_0002;

// CommonNetworkRelativeLinkFlags
pub const VALID_DEVICE: u32 = 0x0000_0001;
pub const VALID_NET_TYPE: u32 = 0x0000_0002;

/// LinkInfoHeaderSize from which the optional Unicode offsets are present.
pub const UNICODE_HEADER_SIZE: u32 = 0x24;
/// VolumeLabelOffset value meaning "look at VolumeLabelOffsetUnicode".
pub const VOLUME_LABEL_UNICODE_SENTINEL: u32 = 0x14;
/// NetNameOffset above which the Unicode name offsets are present.
pub const NET_NAME_UNICODE_THRESHOLD: u32 = 0x14;

pub const DRIVE_TYPES: [&str; 7] = [
    "DRIVE_UNKNOWN",
    "DRIVE_NO_ROOT_DIR",
    "DRIVE_REMOVABLE",
    "DRIVE_FIXED",
    "DRIVE_REMOTE",
    "DRIVE_CDROM",
    "DRIVE_RAMDISK",
];

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LinkInfo {
    pub size: u32,
    pub header_size: u32,
    pub flags: u32,
    pub volume_id_offset: u32,
    pub local_base_path_offset: u32,
    pub common_network_relative_link_offset: u32,
    pub common_path_suffix_offset: u32,
    pub local_base_path_offset_unicode: Option<u32>,
    pub common_path_suffix_offset_unicode: Option<u32>,
    pub common_path_suffix: Option<String>,
    pub common_path_suffix_unicode: Option<String>,
    pub location: Option<LinkLocation>,
}

/// The two mutually exclusive shapes of LinkInfo.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub enum LinkLocation {
    VolumeIdAndLocalBasePath(LocalVolume),
    CommonNetworkRelativeLinkAndPathSuffix(NetworkShare),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LocalVolume {
    pub volume_id_size: u32,
    pub drive_type: DriveType,
    pub drive_serial_number: u32,
    pub volume_label_offset: u32,
    pub volume_label_offset_unicode: Option<u32>,
    pub volume_label: Option<String>,
    pub local_base_path: Option<String>,
    pub local_base_path_unicode: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkShare {
    pub size: u32,
    pub flags: u32,
    pub net_name_offset: u32,
    pub device_name_offset: u32,
    pub network_provider_type: Option<u32>,
    pub net_name_offset_unicode: Option<u32>,
    pub device_name_offset_unicode: Option<u32>,
    pub net_name: Option<String>,
    pub device_name: Option<String>,
    pub net_name_unicode: Option<String>,
    pub device_name_unicode: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum DriveType {
    Known(String),
    Raw(u32),
}

impl DriveType {
    pub fn from_raw(raw: u32) -> Self {
        match DRIVE_TYPES.get(raw as usize) {
            Some(name) => DriveType::Known(name.to_string()),
            None => DriveType::Raw(raw),
        }
    }
}

impl fmt::Display for DriveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriveType::Known(name) => f.write_str(name),
            DriveType::Raw(raw) => write!(f, "{}", raw),
        }
    }
}

/// Read the LinkInfo structure at `offset` (absolute). The next stage always
/// starts `LinkInfoSize` bytes further, whatever the structure's contents,
/// because trailing bytes are legal.
pub fn read_link_info(reader: &ByteReader<'_>, offset: usize) -> Decoded<LinkInfo> {
    debug!("Reading LinkInfo at 0x{:X}", offset);
    let size = match reader.u32(offset) {
        Ok(size) => size,
        Err(e) => {
            warn!("No room for LinkInfoSize: {}", e);
            return Decoded::degraded(e, reader.len());
        }
    };
    let next = offset.saturating_add(size as usize).min(reader.len());
    let available = reader.len() - offset;
    let mut warnings = Vec::new();
    if size as usize > available {
        warn!(
            "LinkInfo declares 0x{:X} bytes but only 0x{:X} remain.",
            size, available
        );
        warnings.push(LnkError::OutOfBounds {
            offset,
            len: size as usize,
            limit: reader.len(),
        });
    }

    let result = reader
        .window(offset, (size as usize).min(available))
        .and_then(|region| LinkInfo::parse(&region, &mut warnings));
    match result {
        Ok(link_info) => Decoded {
            value: Some(link_info),
            next,
            warnings,
        },
        Err(e) => {
            warn!("LinkInfo dropped: {}", e);
            warnings.push(e);
            Decoded {
                value: None,
                next,
                warnings,
            }
        }
    }
}

impl LinkInfo {
    /// `region` is anchored at the first byte of LinkInfo. An unreadable
    /// common path suffix only loses the suffix and is pushed to `warnings`.
    pub fn parse(
        region: &ByteReader<'_>,
        warnings: &mut Vec<LnkError>,
    ) -> Result<Self, LnkError> {
        let size = region.u32(0x00)?;
        let header_size = region.u32(0x04)?;
        let flags = region.u32(0x08)?;
        let volume_id_offset = region.u32(0x0C)?;
        let local_base_path_offset = region.u32(0x10)?;
        let common_network_relative_link_offset = region.u32(0x14)?;
        let common_path_suffix_offset = region.u32(0x18)?;

        let (local_base_path_offset_unicode, common_path_suffix_offset_unicode) =
            if header_size >= UNICODE_HEADER_SIZE {
                (Some(region.u32(0x1C)?), Some(region.u32(0x20)?))
            } else {
                (None, None)
            };

        let location = if flags & VOLUME_ID_AND_LOCAL_BASE_PATH != 0 {
            Some(LinkLocation::VolumeIdAndLocalBasePath(LocalVolume::parse(
                region,
                volume_id_offset,
                local_base_path_offset,
                local_base_path_offset_unicode,
            )?))
        } else if flags & COMMON_NETWORK_RELATIVE_LINK_AND_PATH_SUFFIX != 0 {
            Some(LinkLocation::CommonNetworkRelativeLinkAndPathSuffix(
                NetworkShare::parse(region, common_network_relative_link_offset)?,
            ))
        } else {
            debug!("LinkInfo flags 0x{:X} select neither location shape.", flags);
            None
        };

        let common_path_suffix = match common_path_suffix_offset {
            0 => None,
            off => keep_or_warn(region.ascii_z(off as usize), "CommonPathSuffix", warnings),
        };
        let common_path_suffix_unicode = match common_path_suffix_offset_unicode {
            None | Some(0) => None,
            Some(off) => keep_or_warn(
                region.utf16_z(off as usize),
                "CommonPathSuffixUnicode",
                warnings,
            ),
        };

        Ok(Self {
            size,
            header_size,
            flags,
            volume_id_offset,
            local_base_path_offset,
            common_network_relative_link_offset,
            common_path_suffix_offset,
            local_base_path_offset_unicode,
            common_path_suffix_offset_unicode,
            common_path_suffix,
            common_path_suffix_unicode,
            location,
        })
    }

    pub fn local_volume(&self) -> Option<&LocalVolume> {
        match &self.location {
            Some(LinkLocation::VolumeIdAndLocalBasePath(v)) => Some(v),
            _ => None,
        }
    }

    pub fn network_share(&self) -> Option<&NetworkShare> {
        match &self.location {
            Some(LinkLocation::CommonNetworkRelativeLinkAndPathSuffix(n)) => Some(n),
            _ => None,
        }
    }

    pub fn location_name(&self) -> &'static str {
        match &self.location {
            Some(LinkLocation::VolumeIdAndLocalBasePath(_)) => "VolumeIDAndLocalBasePath",
            Some(LinkLocation::CommonNetworkRelativeLinkAndPathSuffix(_)) => {
                "CommonNetworkRelativeLinkAndPathSuffix"
            }
            None => "None",
        }
    }
}

fn keep_or_warn(
    result: Result<String, LnkError>,
    field: &str,
    warnings: &mut Vec<LnkError>,
) -> Option<String> {
    match result {
        Ok(text) => Some(text),
        Err(e) => {
            warn!("LinkInfo {} unreadable: {}", field, e);
            warnings.push(e);
            None
        }
    }
}

impl LocalVolume {
    /// `link_info` is anchored at the start of LinkInfo, all offsets given
    /// here are relative to it.
    fn parse(
        link_info: &ByteReader<'_>,
        volume_id_offset: u32,
        local_base_path_offset: u32,
        local_base_path_offset_unicode: Option<u32>,
    ) -> Result<Self, LnkError> {
        let volume_id_size = link_info.u32(volume_id_offset as usize)?;
        // Label offsets below are relative to the VolumeID.
        let volume = link_info.window(volume_id_offset as usize, volume_id_size as usize)?;
        let drive_type = DriveType::from_raw(volume.u32(0x04)?);
        let drive_serial_number = volume.u32(0x08)?;
        let volume_label_offset = volume.u32(0x0C)?;

        let (volume_label, volume_label_offset_unicode) =
            if volume_label_offset == VOLUME_LABEL_UNICODE_SENTINEL {
                let off = volume.u32(0x10)?;
                (Some(volume.utf16_z(off as usize)?), Some(off))
            } else {
                let off = volume_label_offset as usize;
                let len = volume.len().saturating_sub(off);
                (Some(volume.fixed_ascii(off, len)?), None)
            };

        let local_base_path = match local_base_path_offset {
            0 => None,
            off => Some(link_info.ascii_z(off as usize)?),
        };
        let local_base_path_unicode = match local_base_path_offset_unicode {
            None | Some(0) => None,
            Some(off) => Some(link_info.utf16_z(off as usize)?),
        };

        Ok(Self {
            volume_id_size,
            drive_type,
            drive_serial_number,
            volume_label_offset,
            volume_label_offset_unicode,
            volume_label,
            local_base_path,
            local_base_path_unicode,
        })
    }
}

impl NetworkShare {
    /// `link_info` is anchored at the start of LinkInfo. Name offsets are
    /// relative to the CommonNetworkRelativeLink itself.
    fn parse(link_info: &ByteReader<'_>, offset: u32) -> Result<Self, LnkError> {
        let size = link_info.u32(offset as usize)?;
        let cnrl = link_info.window(offset as usize, size as usize)?;
        let flags = cnrl.u32(0x04)?;
        let net_name_offset = cnrl.u32(0x08)?;
        let device_name_offset = cnrl.u32(0x0C)?;
        let provider = cnrl.u32(0x10)?;
        let network_provider_type = (flags & VALID_NET_TYPE != 0).then_some(provider);

        let (net_name_offset_unicode, device_name_offset_unicode) =
            if net_name_offset > NET_NAME_UNICODE_THRESHOLD {
                (Some(cnrl.u32(0x14)?), Some(cnrl.u32(0x18)?))
            } else {
                (None, None)
            };

        let net_name = match net_name_offset {
            0 => None,
            off => Some(cnrl.ascii_z(off as usize)?),
        };
        let device_name = if flags & VALID_DEVICE != 0 && device_name_offset != 0 {
            Some(cnrl.ascii_z(device_name_offset as usize)?)
        } else {
            None
        };
        let net_name_unicode = match net_name_offset_unicode {
            None | Some(0) => None,
            Some(off) => Some(cnrl.utf16_z(off as usize)?),
        };
        let device_name_unicode = match device_name_offset_unicode {
            Some(off) if off != 0 && flags & VALID_DEVICE != 0 => {
                Some(cnrl.utf16_z(off as usize)?)
            }
            _ => None,
        };

        Ok(Self {
            size,
            flags,
            net_name_offset,
            device_name_offset,
            network_provider_type,
            net_name_offset_unicode,
            device_name_offset_unicode,
            net_name,
            device_name,
            net_name_unicode,
            device_name_unicode,
        })
    }
}

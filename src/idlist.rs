// Sources:
// - https://learn.microsoft.com/openspecs/windows_protocols/ms-shllink/881d7a83-07a5-4702-93e3-f9fc34c3e1e4

//! LinkTargetIDList: a size-prefixed shell item chain. The items are not
//! interpreted, only walked so their boundaries can be reported.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::Decoded;
use crate::reader::ByteReader;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IdList {
    pub size: u16,
    pub items: Vec<ItemId>,
}

/// One opaque shell item.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ItemId {
    pub offset: usize, // absolute
    pub size: u16,
    pub class_type: Option<u8>,
}

/// Read the ID list starting at `offset` (absolute). The next stage begins
/// right after the region declared by the size prefix.
pub fn read_id_list(reader: &ByteReader<'_>, offset: usize) -> Decoded<IdList> {
    debug!("Reading LinkTargetIDList at 0x{:X}", offset);
    let size = match reader.u16(offset) {
        Ok(size) => size,
        Err(e) => {
            warn!("No room for the IDList size: {}", e);
            return Decoded::degraded(e, reader.len());
        }
    };
    let region = match reader.window(offset + 2, size as usize) {
        Ok(region) => region,
        Err(e) => {
            warn!("IDList of {} bytes runs past the end of the buffer.", size);
            return Decoded::degraded(e, reader.len());
        }
    };
    let items = walk_items(&region);
    debug!("IDList holds {} item(s) in {} bytes", items.len(), size);
    Decoded::ok(IdList { size, items }, offset + 2 + size as usize)
}

pub(crate) fn walk_items(region: &ByteReader<'_>) -> Vec<ItemId> {
    let mut items = Vec::new();
    let mut pos = 0usize;
    while let Ok(size) = region.u16(pos) {
        if size == 0 {
            break; // TerminalID
        }
        if size < 2 || pos + size as usize > region.len() {
            debug!("Shell item at 0x{:X} is inconsistent, stop walking.", region.origin() + pos);
            break;
        }
        let class_type = if size > 2 { region.u8(pos + 2).ok() } else { None };
        items.push(ItemId {
            offset: region.origin() + pos,
            size,
            class_type,
        });
        pos += size as usize;
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_list_walk() {
        // 4 bytes of padding, then IDList: size 0x0A, two items, terminator.
        let mut buf = vec![0u8; 4];
        buf.extend_from_slice(&10u16.to_le_bytes());
        buf.extend_from_slice(&[0x05, 0x00, 0x1f, 0xaa, 0xbb]); // item 1
        buf.extend_from_slice(&[0x03, 0x00, 0x31]); // item 2
        buf.extend_from_slice(&[0x00, 0x00]); // terminal
        buf.extend_from_slice(&[0xee, 0xee]); // next stage

        let out = read_id_list(&ByteReader::new(&buf), 4);
        assert!(out.warnings.is_empty());
        assert_eq!(out.next, 16);
        assert_eq!(buf[out.next], 0xee);
        let list = out.value.unwrap();
        assert_eq!(list.size, 10);
        assert_eq!(list.items.len(), 2);
        assert_eq!(list.items[0].offset, 6);
        assert_eq!(list.items[0].class_type, Some(0x1f));
        assert_eq!(list.items[1].offset, 11);
        assert_eq!(list.items[1].class_type, Some(0x31));
    }

    #[test]
    fn test_id_list_overruns_buffer() {
        let mut buf = 0x40u16.to_le_bytes().to_vec();
        buf.extend_from_slice(&[0u8; 8]);
        let out = read_id_list(&ByteReader::new(&buf), 0);
        assert!(out.value.is_none());
        assert_eq!(out.next, buf.len());
        assert_eq!(out.warnings.len(), 1);
    }

    #[test]
    fn test_id_list_missing_size() {
        let buf = [0u8; 1];
        let out = read_id_list(&ByteReader::new(&buf), 0);
        assert!(out.value.is_none());
        assert_eq!(out.next, 1);
    }

    #[test]
    fn test_inconsistent_item_stops_walk() {
        let mut buf = 6u16.to_le_bytes().to_vec();
        buf.extend_from_slice(&[0x09, 0x00, 0x1f, 0x00, 0x00, 0x00]);
        let out = read_id_list(&ByteReader::new(&buf), 0);
        assert!(out.warnings.is_empty());
        assert!(out.value.unwrap().items.is_empty());
        assert_eq!(out.next, 8);
    }
}

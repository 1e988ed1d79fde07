// Sources:
// - https://learn.microsoft.com/openspecs/windows_protocols/ms-shllink/ae350202-3ba9-4790-9e9e-98935f4ee5af
// - https://learn.microsoft.com/windows/win32/fileio/file-attribute-constants

//! Named views over the two raw flag words of the header.

use serde::{Deserialize, Serialize};

// LinkFlags bits
pub const HAS_TARGET_ID_LIST: u32 = 0x0000_0001;
pub const HAS_LINK_INFO: u32 = 0x0000_0002;
pub const HAS_NAME: u32 = 0x0000_0004;
pub const HAS_RELATIVE_PATH: u32 = 0x0000_0008;
pub const HAS_WORKING_DIR: u32 = 0x0000_0010;
pub const HAS_ARGUMENTS: u32 = 0x0000_0020;
pub const HAS_ICON_LOCATION: u32 = 0x0000_0040;
pub const IS_UNICODE: u32 = 0x0000_0080;
pub const FORCE_NO_LINK_INFO: u32 = 0x0000_0100;
pub const HAS_EXP_STRING: u32 = 0x0000_0200;
pub const RUN_IN_SEPARATE_PROCESS: u32 = 0x0000_0400;
pub const RESERVED0: u32 = 0x0000_0800;
pub const HAS_DARWIN_ID: u32 = 0x0000_1000;
pub const RUN_AS_USER: u32 = 0x0000_2000;
pub const HAS_EXP_ICON: u32 = 0x0000_4000;
pub const NO_PIDL_ALIAS: u32 = 0x0000_8000;
pub const RESERVED1: u32 = 0x0001_0000;
pub const RUN_WITH_SHIM_LAYER: u32 = 0x0002_0000;
pub const FORCE_NO_LINK_TRACK: u32 = 0x0004_0000;
pub const ENABLE_TARGET_METADATA: u32 = 0x0008_0000;
pub const DISABLE_LINK_PATH_TRACKING: u32 = 0x0010_0000;
pub const DISABLE_KNOWN_FOLDER_TRACKING: u32 = 0x0020_0000;
pub const DISABLE_KNOWN_FOLDER_ALIAS: u32 = 0x0040_0000;
pub const ALLOW_LINK_TO_LINK: u32 = 0x0080_0000;
pub const UNALIAS_ON_SAVE: u32 = 0x0100_0000;
pub const PREFER_ENVIRONMENT_PATH: u32 = 0x0200_0000;
pub const KEEP_LOCAL_ID_LIST_FOR_UNC_TARGET: u32 = 0x0400_0000;

pub const LINK_FLAG_NAMES: [(u32, &str); 27] = [
    (HAS_TARGET_ID_LIST, "HasTargetIDList"),
    (HAS_LINK_INFO, "HasLinkInfo"),
    (HAS_NAME, "HasName"),
    (HAS_RELATIVE_PATH, "HasRelativePath"),
    (HAS_WORKING_DIR, "HasWorkingDir"),
    (HAS_ARGUMENTS, "HasArguments"),
    (HAS_ICON_LOCATION, "HasIconLocation"),
    (IS_UNICODE, "IsUnicode"),
    (FORCE_NO_LINK_INFO, "ForceNoLinkInfo"),
    (HAS_EXP_STRING, "HasExpString"),
    (RUN_IN_SEPARATE_PROCESS, "RunInSeparateProcess"),
    (RESERVED0, "Reserved0"),
    (HAS_DARWIN_ID, "HasDarwinID"),
    (RUN_AS_USER, "RunAsUser"),
    (HAS_EXP_ICON, "HasExpIcon"),
    (NO_PIDL_ALIAS, "NoPidlAlias"),
    (RESERVED1, "Reserved1"),
    (RUN_WITH_SHIM_LAYER, "RunWithShimLayer"),
    (FORCE_NO_LINK_TRACK, "ForceNoLinkTrack"),
    (ENABLE_TARGET_METADATA, "EnableTargetMetadata"),
    (DISABLE_LINK_PATH_TRACKING, "DisableLinkPathTracking"),
    (DISABLE_KNOWN_FOLDER_TRACKING, "DisableKnownFolderTracking"),
    (DISABLE_KNOWN_FOLDER_ALIAS, "DisableKnownFolderAlias"),
    (ALLOW_LINK_TO_LINK, "AllowLinkToLink"),
    (UNALIAS_ON_SAVE, "UnaliasOnSave"),
    (PREFER_ENVIRONMENT_PATH, "PreferEnvironmentPath"),
    (KEEP_LOCAL_ID_LIST_FOR_UNC_TARGET, "KeepLocalIDListForUNCTarget"),
];

// FileAttributes bits
pub const FILE_ATTRIBUTE_READONLY: u32 = 0x0000_0001;
pub const FILE_ATTRIBUTE_HIDDEN: u32 = 0x0000_0002;
pub const FILE_ATTRIBUTE_SYSTEM: u32 = 0x0000_0004;
pub const FILE_ATTRIBUTE_RESERVED1: u32 = 0x0000_0008;
pub const FILE_ATTRIBUTE_DIRECTORY: u32 = 0x0000_0010;
pub const FILE_ATTRIBUTE_ARCHIVE: u32 = 0x0000_0020;
pub const FILE_ATTRIBUTE_DEVICE: u32 = 0x0000_0040;
pub const FILE_ATTRIBUTE_NORMAL: u32 = 0x0000_0080;
pub const FILE_ATTRIBUTE_TEMPORARY: u32 = 0x0000_0100;
pub const FILE_ATTRIBUTE_SPARSE_FILE: u32 = 0x0000_0200;
pub const FILE_ATTRIBUTE_REPARSE_POINT: u32 = 0x0000_0400;
pub const FILE_ATTRIBUTE_COMPRESSED: u32 = 0x0000_0800;
pub const FILE_ATTRIBUTE_OFFLINE: u32 = 0x0000_1000;
pub const FILE_ATTRIBUTE_NOT_CONTENT_INDEXED: u32 = 0x0000_2000;
pub const FILE_ATTRIBUTE_ENCRYPTED: u32 = 0x0000_4000;
pub const FILE_ATTRIBUTE_UNKNOWN_FAT: u32 = 0x0000_8000; // seen on Windows 95 FAT
pub const FILE_ATTRIBUTE_VIRTUAL: u32 = 0x0001_0000;

pub const FILE_FLAG_NAMES: [(u32, &str); 17] = [
    (FILE_ATTRIBUTE_READONLY, "FILE_ATTRIBUTE_READONLY"),
    (FILE_ATTRIBUTE_HIDDEN, "FILE_ATTRIBUTE_HIDDEN"),
    (FILE_ATTRIBUTE_SYSTEM, "FILE_ATTRIBUTE_SYSTEM"),
    (FILE_ATTRIBUTE_RESERVED1, "FILE_ATTRIBUTE_RESERVED1"),
    (FILE_ATTRIBUTE_DIRECTORY, "FILE_ATTRIBUTE_DIRECTORY"),
    (FILE_ATTRIBUTE_ARCHIVE, "FILE_ATTRIBUTE_ARCHIVE"),
    (FILE_ATTRIBUTE_DEVICE, "FILE_ATTRIBUTE_DEVICE"),
    (FILE_ATTRIBUTE_NORMAL, "FILE_ATTRIBUTE_NORMAL"),
    (FILE_ATTRIBUTE_TEMPORARY, "FILE_ATTRIBUTE_TEMPORARY"),
    (FILE_ATTRIBUTE_SPARSE_FILE, "FILE_ATTRIBUTE_SPARSE_FILE"),
    (FILE_ATTRIBUTE_REPARSE_POINT, "FILE_ATTRIBUTE_REPARSE_POINT"),
    (FILE_ATTRIBUTE_COMPRESSED, "FILE_ATTRIBUTE_COMPRESSED"),
    (FILE_ATTRIBUTE_OFFLINE, "FILE_ATTRIBUTE_OFFLINE"),
    (FILE_ATTRIBUTE_NOT_CONTENT_INDEXED, "FILE_ATTRIBUTE_NOT_CONTENT_INDEXED"),
    (FILE_ATTRIBUTE_ENCRYPTED, "FILE_ATTRIBUTE_ENCRYPTED"),
    (FILE_ATTRIBUTE_UNKNOWN_FAT, "FILE_ATTRIBUTE_UNKNOWN_FAT"),
    (FILE_ATTRIBUTE_VIRTUAL, "FILE_ATTRIBUTE_VIRTUAL"),
];

fn enabled_names(raw: u32, table: &[(u32, &'static str)]) -> Vec<&'static str> {
    table
        .iter()
        .filter(|(bit, _)| raw & bit != 0)
        .map(|(_, name)| *name)
        .collect()
}

/// LinkFlags word from the header. Bits 27..31 carry no name and are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct LinkFlags(pub u32);

impl LinkFlags {
    pub fn contains(&self, flag: u32) -> bool {
        self.0 & flag != 0
    }

    pub fn names(&self) -> Vec<&'static str> {
        enabled_names(self.0, &LINK_FLAG_NAMES)
    }

    pub fn is_unicode(&self) -> bool {
        self.contains(IS_UNICODE)
    }

    /// LinkInfo is only read when advertised and not forced off.
    pub fn has_link_info(&self) -> bool {
        self.contains(HAS_LINK_INFO) && !self.contains(FORCE_NO_LINK_INFO)
    }
}

/// FileAttributes word from the header. Bits 17..31 are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct FileFlags(pub u32);

impl FileFlags {
    pub fn contains(&self, flag: u32) -> bool {
        self.0 & flag != 0
    }

    pub fn names(&self) -> Vec<&'static str> {
        enabled_names(self.0, &FILE_FLAG_NAMES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_flags_all_defined_bits() {
        let flags = LinkFlags(0x07FF_FFFF);
        let names = flags.names();
        assert_eq!(names.len(), 27);
        assert_eq!(names[0], "HasTargetIDList");
        assert_eq!(names[26], "KeepLocalIDListForUNCTarget");
    }

    #[test]
    fn test_link_flags_single_bits() {
        for (i, (bit, name)) in LINK_FLAG_NAMES.iter().enumerate() {
            assert_eq!(*bit, 1 << i);
            assert_eq!(LinkFlags(*bit).names(), vec![*name]);
        }
        // Undefined positions are silently ignored.
        assert!(LinkFlags(0xF800_0000).names().is_empty());
    }

    #[test]
    fn test_file_flags_bit_exact() {
        assert_eq!(FileFlags(0x0001_FFFF).names().len(), 17);
        for (i, (bit, name)) in FILE_FLAG_NAMES.iter().enumerate() {
            assert_eq!(*bit, 1 << i);
            assert_eq!(FileFlags(*bit).names(), vec![*name]);
        }
        assert!(FileFlags(0xFFFE_0000).names().is_empty());
        assert_eq!(
            FileFlags(FILE_ATTRIBUTE_ARCHIVE | FILE_ATTRIBUTE_HIDDEN).names(),
            vec!["FILE_ATTRIBUTE_HIDDEN", "FILE_ATTRIBUTE_ARCHIVE"]
        );
    }

    #[test]
    fn test_link_info_gate() {
        assert!(LinkFlags(HAS_LINK_INFO).has_link_info());
        assert!(!LinkFlags(HAS_LINK_INFO | FORCE_NO_LINK_INFO).has_link_info());
        assert!(!LinkFlags(0).has_link_info());
    }
}

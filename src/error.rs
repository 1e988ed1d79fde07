use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Everything that can go wrong while decoding a shortcut.
///
/// Only `MalformedHeader` (and an `OutOfBounds` hit while reading the fixed
/// header) abort a decode. Every other kind is absorbed by the stage that
/// raised it and recorded on the document as a [`DecodeWarning`].
#[derive(Error, Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub enum LnkError {
    #[error("malformed header: declared size {declared:#x}, expected 0x4c")]
    MalformedHeader { declared: u32 },

    #[error("read of {len} bytes at offset {offset:#x} goes past {limit:#x}")]
    OutOfBounds {
        offset: usize,
        len: usize,
        limit: usize,
    },

    #[error("unknown extra data signature {signature:#010x} at offset {offset:#x}")]
    UnknownExtraSignature { signature: u32, offset: usize },

    #[error("extra data block at offset {offset:#x} declares implausible size {size:#x}")]
    ImplausibleBlockSize { offset: usize, size: u32 },

    #[error("partial decode: {degraded} stage(s) degraded")]
    PartialDecode { degraded: usize },
}

/// Decode pipeline stages, used to say where a warning came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum Stage {
    Header,
    IdList,
    LinkInfo,
    StringData,
    ExtraData,
}

/// A non-fatal error absorbed by one stage of the decode.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DecodeWarning {
    pub stage: Stage,
    pub error: LnkError,
}

impl DecodeWarning {
    pub fn new(stage: Stage, error: LnkError) -> Self {
        Self { stage, error }
    }
}

impl std::fmt::Display for DecodeWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.stage, self.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let e = LnkError::MalformedHeader { declared: 0x50 };
        assert_eq!(e.to_string(), "malformed header: declared size 0x50, expected 0x4c");

        let e = LnkError::UnknownExtraSignature {
            signature: 0xA000_00FF,
            offset: 0x100,
        };
        assert_eq!(
            e.to_string(),
            "unknown extra data signature 0xa00000ff at offset 0x100"
        );
    }

    #[test]
    fn test_warning_display() {
        let w = DecodeWarning::new(
            Stage::LinkInfo,
            LnkError::OutOfBounds {
                offset: 0x60,
                len: 4,
                limit: 0x62,
            },
        );
        assert_eq!(
            w.to_string(),
            "LinkInfo: read of 4 bytes at offset 0x60 goes past 0x62"
        );
    }
}

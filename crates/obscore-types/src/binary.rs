use serde::{Deserialize, Serialize};

/// A reference to binary media, either carried inline or resolved through
/// the blob store. When both `inline` and `storage_ref` are present,
/// `inline` is authoritative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinaryPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_ref: Option<String>,
    pub mime_type: String,
    pub size: u64,
    /// Integrity checksum tagged with an algorithm prefix, e.g. `sha256:<hex>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

impl BinaryPayload {
    /// Construct a payload carrying its bytes inline.
    pub fn inline(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        let size = bytes.len() as u64;
        Self {
            inline: Some(bytes),
            storage_ref: None,
            mime_type: mime_type.into(),
            size,
            checksum: None,
        }
    }

    /// Construct a payload that resolves through a storage reference.
    pub fn reference(
        storage_ref: impl Into<String>,
        mime_type: impl Into<String>,
        size: u64,
        checksum: Option<String>,
    ) -> Self {
        Self {
            inline: None,
            storage_ref: Some(storage_ref.into()),
            mime_type: mime_type.into(),
            size,
            checksum,
        }
    }

    /// Prefix a raw hex digest with its algorithm tag.
    pub fn sha256_checksum(hex: impl AsRef<str>) -> String {
        format!("sha256:{}", hex.as_ref())
    }

    pub fn has_inline(&self) -> bool {
        self.inline.is_some()
    }
}

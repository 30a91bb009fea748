//! # Upload Commands
//!
//! Pre-flight checks for files the UI is about to upload (logo, ARCA
//! certificate and key, purchase attachments). Storage happens elsewhere;
//! only the declared MIME type and size are inspected here.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ApiError;
use mostrador_core::validation::{validate_upload, UploadKind};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadLimits {
    pub kind: UploadKind,
    pub max_bytes: u64,
    pub allowed_mime_types: Vec<String>,
}

/// Limits for a kind of upload, so the file picker can filter.
pub fn get_upload_limits(kind: UploadKind) -> UploadLimits {
    UploadLimits {
        kind,
        max_bytes: kind.max_bytes(),
        allowed_mime_types: kind.allowed_mime_types().iter().map(|m| m.to_string()).collect(),
    }
}

pub fn validate_file_upload(kind: UploadKind, mime_type: &str, size_bytes: u64) -> Result<(), ApiError> {
    debug!(kind = ?kind, mime_type = %mime_type, size_bytes, "validate_file_upload command");
    validate_upload(kind, mime_type, size_bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_rejects_wrong_type_and_size() {
        assert!(validate_file_upload(UploadKind::ArcaCertificate, "application/x-pem-file", 2_000).is_ok());

        let err = validate_file_upload(UploadKind::Logo, "image/gif", 1_000).unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        let limits = get_upload_limits(UploadKind::PurchaseAttachment);
        assert!(validate_file_upload(UploadKind::PurchaseAttachment, "application/pdf", limits.max_bytes + 1).is_err());
    }
}

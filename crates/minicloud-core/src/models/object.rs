use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::utils::{format_size_kb, FileKind};

/// An object stored in a bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    pub id: Option<i64>,
    #[serde(rename = "objectKey")]
    pub object_key: String,
    #[serde(rename = "bucketName")]
    pub bucket_name: Option<String>,
    #[serde(rename = "fileName")]
    pub file_name: String,
    #[serde(rename = "contentType")]
    pub content_type: Option<String>,
    pub size: Option<u64>,
    pub etag: Option<String>,
    pub version: Option<i32>,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<NaiveDateTime>,
}

impl StoredObject {
    pub fn display_size(&self) -> String {
        format_size_kb(self.size.unwrap_or(0))
    }

    pub fn kind(&self) -> FileKind {
        FileKind::from_file_name(&self.file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_object() {
        let json = r#"{"id": 7, "objectKey": "b1/3f2a-report.pdf", "bucketName": "b1",
                       "fileName": "report.pdf", "contentType": "application/pdf",
                       "size": 2048, "etag": "abc", "version": 1,
                       "createdAt": "2024-05-01T10:15:30"}"#;
        let object: StoredObject = serde_json::from_str(json).expect("Failed to parse object JSON");
        assert_eq!(object.object_key, "b1/3f2a-report.pdf");
        assert_eq!(object.display_size(), "2.00 KB");
        assert_eq!(object.kind(), FileKind::Pdf);
    }
}

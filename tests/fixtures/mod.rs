//! Canned upstream bodies and images for the pipeline tests
#![allow(dead_code)]

pub const API_TOKEN: &str = "test-token-wV1cRvip6IZ";

/// A 10 KB buffer that starts with a JPEG/JFIF header.
pub fn jpeg_bytes() -> Vec<u8> {
    let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00];
    bytes.resize(10 * 1024, 0x42);
    bytes
}

pub const UPLOAD_ACCEPTED: &str = r#"{"id_search": "789"}"#;

pub const UPLOAD_ACCEPTED_NUMERIC: &str =
    r#"{"error": null, "code": null, "id_search": 4815162342, "message": "Uploaded"}"#;

pub const UPLOAD_REJECTED: &str =
    r#"{"error": "Invalid or expired token", "code": "INVALID_TOKEN"}"#;

/// Older API versions answered the upload with the search page itself.
pub const UPLOAD_LEGACY_HTML: &str = r#"<!DOCTYPE html>
<html>
<head><title>FaceCheck.ID</title></head>
<body>
    <div class="upload-ok">Image uploaded.</div>
    <a id="results" href="https://facecheck.id/search?id_search=12345">View results</a>
</body>
</html>"#;

pub const UPLOAD_MAINTENANCE: &str = r#"<!DOCTYPE html>
<html><body><h1>We'll be back soon</h1><p>Scheduled maintenance.</p></body></html>"#;

pub const STATUS_PROGRESS: &str = r#"{"error": null, "code": "IN_PROGRESS", "progress": 40}"#;

pub const STATUS_COMPLETE: &str = r#"{
    "error": null,
    "progress": 100,
    "output": {
        "items": [
            {"score": 71, "group": 2, "url": "https://example.org/profile/b.jpg", "base64": "AAAA"},
            {"score": 92, "group": 1, "url": "https://example.org/profile/a.jpg", "base64": "AAAA"},
            {"score": 71, "group": 3, "url": "https://example.org/profile/c.jpg", "base64": "AAAA"}
        ]
    }
}"#;

pub const STATUS_ITEMS_TOP_LEVEL: &str =
    r#"{"items": [{"score": 0.92, "url": "https://example.org/profile/a.jpg"}]}"#;

pub const STATUS_FAILED: &str = r#"{"error": "Search was deleted", "code": "NOT_FOUND"}"#;

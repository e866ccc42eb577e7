use image::ImageFormat;
use reqwest::header::HeaderMap;
use reqwest::{Method, Url};

use crate::models::submission::FetchedResource;
use crate::services::auth::{self, AuthCredential};

/// Multipart field name FaceCheck.ID expects the image under.
pub const IMAGE_PART_NAME: &str = "images";

const DEFAULT_CONTENT_TYPE: &str = "image/jpeg";

/// A fully described request that has not been sent yet.
///
/// Kept as plain data so encoding and auth can be inspected in tests; the
/// upstream client turns it into a `reqwest` request at send time.
#[derive(Debug, Clone)]
pub struct OutgoingRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: RequestBody,
}

#[derive(Debug, Clone)]
pub enum RequestBody {
    Empty,
    Json(serde_json::Value),
    Multipart(FilePart),
}

/// The single file part of an upload.
#[derive(Debug, Clone)]
pub struct FilePart {
    pub name: &'static str,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl OutgoingRequest {
    pub fn post(url: Url) -> Self {
        Self {
            method: Method::POST,
            url,
            headers: HeaderMap::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn with_json(mut self, body: serde_json::Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }
}

/// Build the authenticated multipart upload for a fetched image.
///
/// Consumes the resource so its bytes move into the request without a copy.
pub fn encode(
    upload_url: &Url,
    resource: FetchedResource,
    credential: &AuthCredential,
) -> OutgoingRequest {
    let content_type = resolve_content_type(&resource);
    let file_name = format!("image.{}", extension_for(&content_type));

    let request = OutgoingRequest {
        method: Method::POST,
        url: upload_url.clone(),
        headers: HeaderMap::new(),
        body: RequestBody::Multipart(FilePart {
            name: IMAGE_PART_NAME,
            file_name,
            content_type,
            bytes: resource.bytes,
        }),
    };

    auth::apply(credential, request)
}

/// Sniffed format wins over the declared header; fall back to JPEG.
fn resolve_content_type(resource: &FetchedResource) -> String {
    if let Ok(format) = image::guess_format(&resource.bytes) {
        return format.to_mime_type().to_string();
    }

    resource
        .content_type
        .as_deref()
        .map(|ct| ct.split(';').next().unwrap_or(ct).trim().to_ascii_lowercase())
        .filter(|ct| ct.starts_with("image/"))
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string())
}

fn extension_for(content_type: &str) -> &'static str {
    ImageFormat::from_mime_type(content_type)
        .and_then(|format| format.extensions_str().first().copied())
        .unwrap_or("jpg")
}

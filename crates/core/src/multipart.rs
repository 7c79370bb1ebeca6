//! multipart/related framing.
//!
//! Builds outgoing multipart/related bodies for binary retrieval and splits
//! incoming multipart/related bodies for ingestion. The framer works on raw
//! bytes: part payloads are handed back exactly as they appeared on the
//! wire, with the part headers stripped.

use crate::{ArchiveError, ArchiveResult};

/// One part of an outgoing multipart/related body.
#[derive(Debug, Clone)]
pub struct RelatedPart {
    /// Media type of the payload, without parameters.
    pub content_type: String,
    /// Transfer syntax UID, appended to the content type as a parameter.
    pub transfer_syntax: Option<String>,
    /// Retrieval URL advertised in a `Content-Location` header.
    pub location: Option<String>,
    pub bytes: Vec<u8>,
}

/// A fully framed multipart/related body.
#[derive(Debug)]
pub struct RelatedBody {
    pub bytes: Vec<u8>,
    pub boundary: String,
    /// Value for the outer `Content-Type` response header.
    pub content_type: String,
}

/// Frame `parts` into a multipart/related body with a fresh boundary token.
///
/// Each part is framed as boundary marker, `Content-Location` (when known),
/// `Content-Type` (with the transfer syntax as a parameter when known),
/// `Content-Length`, a blank line, the payload and a trailing CRLF; the body
/// ends with the closing `--boundary--` marker. The outer content type
/// advertises `multipart/related` with the given `type` parameter and the
/// same boundary token.
pub fn build_related_body(parts: &[RelatedPart], type_parameter: &str) -> RelatedBody {
    let boundary = uuid::Uuid::new_v4().simple().to_string();
    let mut bytes = Vec::new();

    for part in parts {
        bytes.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        if let Some(location) = &part.location {
            bytes.extend_from_slice(format!("Content-Location: {location}\r\n").as_bytes());
        }
        let media_type = match &part.transfer_syntax {
            Some(ts) => format!("{}; transfer-syntax={ts}", part.content_type),
            None => part.content_type.clone(),
        };
        bytes.extend_from_slice(format!("Content-Type: {media_type}\r\n").as_bytes());
        bytes.extend_from_slice(format!("Content-Length: {}\r\n\r\n", part.bytes.len()).as_bytes());
        bytes.extend_from_slice(&part.bytes);
        bytes.extend_from_slice(b"\r\n");
    }
    bytes.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

    let content_type =
        format!("multipart/related; type=\"{type_parameter}\"; boundary={boundary}");
    RelatedBody {
        bytes,
        boundary,
        content_type,
    }
}

/// Whether a request content type is multipart/related at all.
pub fn is_multipart_related(content_type: &str) -> bool {
    content_type
        .to_ascii_lowercase()
        .contains("multipart/related")
}

/// Extract the boundary token from a multipart content type header value.
///
/// Quoted and unquoted tokens are both accepted; `None` means the request
/// carries no boundary at all and must be rejected as a whole.
pub fn boundary_from_content_type(content_type: &str) -> Option<String> {
    for parameter in content_type.split(';') {
        let trimmed = parameter.trim();
        if let Some(raw) = trimmed.strip_prefix("boundary=") {
            let token = raw.trim().trim_matches('"');
            if !token.is_empty() {
                return Some(token.to_string());
            }
        }
    }
    None
}

/// Split a multipart/related body into its raw part payloads.
///
/// # Errors
///
/// Returns `ArchiveError::MalformedMultipart` when the body contains no
/// boundary delimiter at all, a part is not terminated by another delimiter,
/// or a part lacks the blank line separating headers from payload.
pub fn split_related_body(body: &[u8], boundary: &str) -> ArchiveResult<Vec<Vec<u8>>> {
    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();

    let mut cursor = find_subslice(body, delimiter, 0).ok_or_else(|| {
        ArchiveError::MalformedMultipart("no boundary delimiter in body".to_string())
    })?;

    let mut parts = Vec::new();
    loop {
        let section_start = cursor + delimiter.len();
        if body[section_start..].starts_with(b"--") {
            break;
        }

        let section_end = find_subslice(body, delimiter, section_start).ok_or_else(|| {
            ArchiveError::MalformedMultipart("part not terminated by a boundary".to_string())
        })?;
        let section = &body[section_start..section_end];

        // A section is "\r\n<headers>\r\n\r\n<payload>\r\n"; headers may be
        // absent, leaving the blank line in place.
        let header_end = find_subslice(section, b"\r\n\r\n", 0).ok_or_else(|| {
            ArchiveError::MalformedMultipart("part without header terminator".to_string())
        })?;
        let payload = &section[header_end + 4..];
        let payload = payload.strip_suffix(b"\r\n").unwrap_or(payload);
        parts.push(payload.to_vec());

        cursor = section_end;
    }

    Ok(parts)
}

fn find_subslice(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from > haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|position| from + position)
}

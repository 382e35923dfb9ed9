use std::collections::HashSet;

use axum::http::{header, HeaderMap};

use crate::errors::AppError;

use super::{GuardStage, InboundCall, TransportKind};

pub const PROTOCOL_VERSION_HEADER: &str = "mcp-protocol-version";
pub const DEFAULT_PROTOCOL_VERSION: &str = "2025-06-18";
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2025-06-18"];

/// Streamable-HTTP header checks. WebSocket frames carry no headers and skip this stage.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderValidator;

impl GuardStage for HeaderValidator {
    fn name(&self) -> &'static str {
        "header_validator"
    }

    fn check(&self, call: &mut InboundCall) -> Result<(), AppError> {
        if call.transport != TransportKind::Http {
            return Ok(());
        }

        let accept = joined_header_values(&call.headers, header::ACCEPT.as_str());
        if !contains_all_media_types(accept.as_deref(), &["application/json", "text/event-stream"]) {
            return Err(AppError::invalid_headers(
                "invalid_accept",
                "Accept header must include application/json and text/event-stream",
            ));
        }

        let content_type = joined_header_values(&call.headers, header::CONTENT_TYPE.as_str());
        if !contains_any_media_type(content_type.as_deref(), &["application/json"]) {
            return Err(AppError::invalid_headers(
                "invalid_content_type",
                "Content-Type must be application/json",
            ));
        }

        call.protocol_version = Some(
            resolve_protocol_version(header_text(&call.headers, PROTOCOL_VERSION_HEADER))
                .to_string(),
        );
        Ok(())
    }
}

/// Unsupported or absent versions fall back to the default instead of failing.
pub fn resolve_protocol_version(offered: Option<&str>) -> &'static str {
    offered
        .map(str::trim)
        .and_then(|version| {
            SUPPORTED_PROTOCOL_VERSIONS
                .iter()
                .copied()
                .find(|supported| *supported == version)
        })
        .unwrap_or(DEFAULT_PROTOCOL_VERSION)
}

fn header_text<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Every line of a repeated header, comma-joined the way a single line would list them.
fn joined_header_values(headers: &HeaderMap, name: &str) -> Option<String> {
    let values: Vec<&str> = headers
        .get_all(name)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect();
    if values.is_empty() {
        None
    } else {
        Some(values.join(","))
    }
}

fn media_types(header: Option<&str>) -> HashSet<String> {
    header
        .unwrap_or_default()
        .split(',')
        .filter_map(|value| value.split(';').next())
        .map(|value| value.trim().to_ascii_lowercase())
        .filter(|value| !value.is_empty())
        .collect()
}

fn contains_all_media_types(header: Option<&str>, required: &[&str]) -> bool {
    let values = media_types(header);
    required
        .iter()
        .all(|media_type| values.contains(&media_type.to_ascii_lowercase()))
}

fn contains_any_media_type(header: Option<&str>, expected: &[&str]) -> bool {
    let values = media_types(header);
    expected
        .iter()
        .any(|media_type| values.contains(&media_type.to_ascii_lowercase()))
}

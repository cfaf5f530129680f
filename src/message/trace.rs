//! Trace-id generation, inheritance, and HTTP-header interop.

use std::collections::HashMap;

use crate::clock::IdGen;

/// Header name checked case-insensitively before falling back to `traceparent`.
pub const TRACE_HEADER: &str = "X-Trace-Id";

/// W3C trace-context header name.
pub const TRACEPARENT_HEADER: &str = "traceparent";

/// Generates a fresh trace id using the supplied [`IdGen`].
pub fn generate_trace_id(id_gen: &dyn IdGen) -> String {
    id_gen.new_uuid_v4().to_string()
}

/// Returns the parent's trace id, if any, for inheritance into a child message.
pub fn inherit_trace_id(parent_trace: Option<&str>) -> Option<String> {
    parent_trace.map(|t| t.to_string())
}

/// Extracts a trace id from a header map, preferring `X-Trace-Id` (any case)
/// over a W3C `traceparent` header.
///
/// `traceparent` format: `00-<32 hex>-<16 hex>-<2 hex>`; the trace id is the
/// 32-hex middle segment.
pub fn extract_trace_id_from_headers(headers: &HashMap<String, String>) -> Option<String> {
    if let Some(value) = find_header_ci(headers, TRACE_HEADER) {
        return Some(value.clone());
    }
    let traceparent = find_header_ci(headers, TRACEPARENT_HEADER)?;
    parse_traceparent(traceparent)
}

/// Writes `X-Trace-Id` into `headers` unless a value is already present.
pub fn inject_trace_id_into_headers(headers: &mut HashMap<String, String>, trace_id: &str) {
    if find_header_ci(headers, TRACE_HEADER).is_none() {
        headers.insert(TRACE_HEADER.to_string(), trace_id.to_string());
    }
}

fn find_header_ci<'a>(headers: &'a HashMap<String, String>, name: &str) -> Option<&'a String> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v)
}

fn parse_traceparent(value: &str) -> Option<String> {
    let parts: Vec<&str> = value.split('-').collect();
    if parts.len() != 4 {
        return None;
    }
    let trace_id = parts[1];
    if trace_id.len() != 32 || !trace_id.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    Some(trace_id.to_ascii_lowercase())
}

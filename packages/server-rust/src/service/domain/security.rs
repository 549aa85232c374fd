//! `jwt-*` operations.
//!
//! `jwt-read` decodes a token for display only; signatures are never checked.
//! Decoding failures are reported inside the result, not as call errors, so
//! the UI can render them next to the input.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use serde_json::{json, Value};

use crate::service::operation::{OperationDescriptor, ParameterSpec};

const SEGMENT_DECODER: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

pub(super) fn operations() -> Vec<OperationDescriptor> {
    vec![OperationDescriptor::builder("jwt-read")
        .documentation("Reads a JWT in clear text.")
        .ui_metadata("Security", "jwt-")
        .param(ParameterSpec::string("value").required().documentation("Token to read."))
        .native(|args| async move { Ok(read(args.require_string(0)?)) })]
}

fn read(token: &str) -> Value {
    match decode(token) {
        Ok((header, payload)) => json!({
            "ui": element("div", "jwt-read-result", vec![
                section("jwt-read-result-header", "Header", "header"),
                section("jwt-read-result-payload", "Payload", "payload"),
            ]),
            "data": {"error": null, "header": header, "payload": payload},
        }),
        Err(error) => json!({
            "ui": element("div", "jwt-read-result", vec![json!({
                "type": "alert",
                "props": {"type": "error", "message": {"$eval": "error"}},
            })]),
            "data": {"error": error, "header": null, "payload": null},
        }),
    }
}

fn decode(token: &str) -> Result<(Value, Value), String> {
    let mut segments = token.trim().split('.');
    let header = segments.next().ok_or("empty token")?;
    let payload = segments
        .next()
        .ok_or("token has no payload segment")?;
    Ok((decode_segment("header", header)?, decode_segment("payload", payload)?))
}

fn decode_segment(name: &str, segment: &str) -> Result<Value, String> {
    let bytes = SEGMENT_DECODER
        .decode(segment)
        .map_err(|e| format!("invalid {name} encoding: {e}"))?;
    let value: Value = serde_json::from_slice(&bytes).map_err(|e| format!("invalid {name} JSON: {e}"))?;
    if value.is_object() {
        Ok(value)
    } else {
        Err(format!("{name} is not a JSON object"))
    }
}

/// UI tree node rendered by catalog-driven frontends.
fn element(kind: &str, class_name: &str, children: Vec<Value>) -> Value {
    json!({"type": kind, "props": {"className": class_name}, "children": children})
}

fn section(class_name: &str, title: &str, field: &str) -> Value {
    element("div", class_name, vec![
        json!({"type": "h2", "children": [title]}),
        json!({"$eval": field}),
    ])
}

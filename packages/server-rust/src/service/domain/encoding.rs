//! `base64-*` and `hex-*` operations over UTF-8 text.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use serde_json::Value;

use crate::service::operation::{Arguments, OperationDescriptor, OperationError, ParameterSpec};

const ENCODING: &str = "Encoding";

/// MIME output is wrapped at this many characters per line.
const MIME_LINE_LENGTH: usize = 76;

/// URL-safe decoder that accepts input with or without padding.
const URL_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

const ENCODE_MODES: &[&str] = &["DEFAULT", "URL", "URL_NO_PADDING", "MIME", "MIME_NO_PADDING"];
const DECODE_MODES: &[&str] = &["DEFAULT", "URL", "MIME"];

pub(super) fn operations() -> Vec<OperationDescriptor> {
    vec![
        OperationDescriptor::builder("base64-encode")
            .documentation("Encodes a string in base64.")
            .ui_metadata(ENCODING, "base64-")
            .param(
                ParameterSpec::string("mode")
                    .documentation("Base64 mode (DEFAULT, URL, URL_NO_PADDING, MIME, MIME_NO_PADDING).")
                    .one_of(ENCODE_MODES),
            )
            .param(ParameterSpec::string("value").required().documentation("Value to encode."))
            .native(|args| async move { base64_encode(&args) }),
        OperationDescriptor::builder("base64-decode")
            .documentation("Decodes a base64 string.")
            .ui_metadata(ENCODING, "base64-")
            .param(
                ParameterSpec::string("mode")
                    .documentation("Base64 mode (DEFAULT, URL, MIME).")
                    .one_of(DECODE_MODES),
            )
            .param(ParameterSpec::string("value").required().documentation("Value to decode."))
            .native(|args| async move { base64_decode(&args) }),
        OperationDescriptor::builder("hex-encode")
            .documentation("Encodes a string in hexadecimal.")
            .ui_metadata(ENCODING, "hex-")
            .param(ParameterSpec::string("value").required().documentation("Value to encode."))
            .native(|args| async move { Ok(Value::String(hex::encode(args.require_string(0)?))) }),
        OperationDescriptor::builder("hex-decode")
            .documentation("Decodes a hexadecimal string.")
            .ui_metadata(ENCODING, "hex-")
            .param(ParameterSpec::string("value").required().documentation("Value to decode."))
            .native(|args| async move {
                let bytes = hex::decode(args.require_string(0)?.trim()).map_err(|e| args.invalid(0, e.to_string()))?;
                utf8(&args, 0, bytes)
            }),
    ]
}

fn base64_encode(args: &Arguments) -> Result<Value, OperationError> {
    let value = args.require_string(1)?.as_bytes();
    let encoded = match args.string(0)?.unwrap_or("DEFAULT") {
        "DEFAULT" => STANDARD.encode(value),
        "URL" => URL_SAFE.encode(value),
        "URL_NO_PADDING" => URL_SAFE_NO_PAD.encode(value),
        "MIME" => wrap_lines(&STANDARD.encode(value)),
        "MIME_NO_PADDING" => wrap_lines(&STANDARD_NO_PAD.encode(value)),
        other => return Err(args.invalid(0, format!("unknown mode `{other}`"))),
    };
    Ok(Value::String(encoded))
}

fn base64_decode(args: &Arguments) -> Result<Value, OperationError> {
    let value = args.require_string(1)?;
    let decoded = match args.string(0)?.unwrap_or("DEFAULT") {
        "DEFAULT" => STANDARD.decode(value),
        "URL" => URL_LENIENT.decode(value),
        "MIME" => {
            let compact: String = value.chars().filter(|c| !c.is_ascii_whitespace()).collect();
            STANDARD_LENIENT.decode(compact)
        }
        other => return Err(args.invalid(0, format!("unknown mode `{other}`"))),
    }
    .map_err(|e| args.invalid(1, e.to_string()))?;
    utf8(args, 1, decoded)
}

fn wrap_lines(encoded: &str) -> String {
    // base64 output is ASCII, so byte chunks are char boundaries.
    encoded
        .as_bytes()
        .chunks(MIME_LINE_LENGTH)
        .map(|line| String::from_utf8_lossy(line).into_owned())
        .collect::<Vec<_>>()
        .join("\r\n")
}

fn utf8(args: &Arguments, position: usize, bytes: Vec<u8>) -> Result<Value, OperationError> {
    String::from_utf8(bytes)
        .map(Value::String)
        .map_err(|_| args.invalid(position, "decoded bytes are not valid UTF-8"))
}

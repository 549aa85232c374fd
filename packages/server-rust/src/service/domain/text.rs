//! `regex-*` operations.

use regex::{Captures, Regex};
use serde_json::{json, Value};

use super::TEXTAREA;
use crate::service::operation::{Arguments, OperationDescriptor, OperationError, ParameterSpec};

const TEXT: &str = "Text";

pub(super) fn operations() -> Vec<OperationDescriptor> {
    vec![
        OperationDescriptor::builder("regex-matches")
            .documentation("Tests whether a regex matches the whole text.")
            .ui_metadata(TEXT, "regex-")
            .param(ParameterSpec::string("regex").required().documentation("Regex to test."))
            .param(
                ParameterSpec::string("text")
                    .required()
                    .documentation("Text to test the regex against.")
                    .ui_hint(TEXTAREA),
            )
            .native(|args| async move { matches(&args) }),
        OperationDescriptor::builder("regex-find")
            .documentation("Lists every match of a regex in the text.")
            .ui_metadata(TEXT, "regex-")
            .param(ParameterSpec::string("regex").required().documentation("Regex to test."))
            .param(
                ParameterSpec::string("text")
                    .required()
                    .documentation("Text to test the regex against.")
                    .ui_hint(TEXTAREA),
            )
            .native(|args| async move { find(&args) }),
    ]
}

fn compile(args: &Arguments, pattern: &str) -> Result<Regex, OperationError> {
    Regex::new(pattern).map_err(|e| args.invalid(0, e.to_string()))
}

fn matches(args: &Arguments) -> Result<Value, OperationError> {
    let pattern = args.require_string(0)?;
    let text = args.require_string(1)?;
    // Anchored so the whole text has to match, not a substring.
    let regex = compile(args, &format!(r"\A(?:{pattern})\z"))?;

    Ok(match regex.captures(text) {
        Some(captures) => json!({"matches": true, "groups": groups(&captures)}),
        None => json!({"matches": false, "groups": null}),
    })
}

fn find(args: &Arguments) -> Result<Value, OperationError> {
    let regex = compile(args, args.require_string(0)?)?;
    let text = args.require_string(1)?;

    let finds: Vec<Value> = regex
        .captures_iter(text)
        .filter_map(|captures| {
            let whole = captures.get(0)?;
            let start = text[..whole.start()].chars().count();
            Some(json!({"start": start, "groups": groups(&captures)}))
        })
        .collect();
    Ok(json!({ "finds": finds }))
}

/// Explicit capture groups in order; `null` when the regex declares none.
/// Groups that did not participate in the match are `null` entries.
fn groups(captures: &Captures<'_>) -> Value {
    if captures.len() <= 1 {
        return Value::Null;
    }
    captures
        .iter()
        .skip(1)
        .map(|group| group.map_or(Value::Null, |m| Value::String(m.as_str().to_string())))
        .collect()
}

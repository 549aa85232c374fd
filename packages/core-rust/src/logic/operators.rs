//! Baseline operator library: lookups, arithmetic, comparison, strings,
//! short-circuit logic and array iteration.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Number, Value};

use super::engine::{LogicEngine, Operator, RawOperator};
use super::error::{LogicError, LogicResult};
use crate::context::lookup_path;

static NULL: Value = Value::Null;

/// Builds the baseline operator table.
pub(crate) fn baseline() -> HashMap<String, Operator> {
    let eager: [(&str, super::engine::EagerOperator); 23] = [
        ("var", op_var),
        ("missing", op_missing),
        ("missing_some", op_missing_some),
        ("==", op_loose_eq),
        ("!=", op_loose_neq),
        ("===", op_strict_eq),
        ("!==", op_strict_neq),
        ("!", op_not),
        ("!!", op_truthy),
        ("<", op_lt),
        ("<=", op_lte),
        (">", op_gt),
        (">=", op_gte),
        ("+", op_add),
        ("-", op_sub),
        ("*", op_mul),
        ("/", op_div),
        ("%", op_mod),
        ("min", op_min),
        ("max", op_max),
        ("cat", op_cat),
        ("substr", op_substr),
        ("in", op_in),
    ];

    let mut ops: HashMap<String, Operator> = eager
        .into_iter()
        .map(|(name, op)| (name.to_string(), Operator::Eager(op)))
        .collect();
    ops.insert("merge".into(), Operator::Eager(op_merge));
    ops.insert("log".into(), Operator::Eager(op_log));

    ops.insert("if".into(), Operator::Raw(Arc::new(If)));
    ops.insert("?:".into(), Operator::Raw(Arc::new(If)));
    ops.insert("and".into(), Operator::Raw(Arc::new(And)));
    ops.insert("or".into(), Operator::Raw(Arc::new(Or)));
    ops.insert("map".into(), Operator::Raw(Arc::new(Iterate::Map)));
    ops.insert("filter".into(), Operator::Raw(Arc::new(Iterate::Filter)));
    ops.insert("all".into(), Operator::Raw(Arc::new(Iterate::All)));
    ops.insert("some".into(), Operator::Raw(Arc::new(Iterate::Some)));
    ops.insert("none".into(), Operator::Raw(Arc::new(Iterate::None)));
    ops.insert("reduce".into(), Operator::Raw(Arc::new(Reduce)));
    ops
}

// ---------------------------------------------------------------------------
// Value helpers
// ---------------------------------------------------------------------------

fn arg(args: &[Value], index: usize) -> &Value {
    args.get(index).unwrap_or(&NULL)
}

/// Truthiness: `null`, `false`, `0`, `""` and `[]` are false.
pub(crate) fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(_) => true,
    }
}

fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Null => Some(0.0),
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// Builds a JSON number, keeping integral values integral. Non-finite results become `null`.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn number(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < (i64::MAX as f64) {
        return Value::Number(Number::from(value as i64));
    }
    Number::from_f64(value).map_or(Value::Null, Value::Number)
}

/// Renders a value the way string concatenation sees it.
pub(crate) fn to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() => number(f).to_string(),
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}

fn numbers(operator: &str, args: &[Value]) -> Result<Vec<f64>, LogicError> {
    args.iter()
        .map(|v| {
            to_number(v)
                .ok_or_else(|| LogicError::malformed(operator, format!("non-numeric operand {v}")))
        })
        .collect()
}

fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Array(_) | Value::Object(_), _) | (_, Value::Array(_) | Value::Object(_)) => a == b,
        _ => match (to_number(a), to_number(b)) {
            (Some(x), Some(y)) => (x - y).abs() < f64::EPSILON,
            _ => false,
        },
    }
}

fn strict_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    if let (Value::String(x), Value::String(y)) = (a, b) {
        return Some(x.cmp(y));
    }
    to_number(a)?.partial_cmp(&to_number(b)?)
}

/// `<` / `<=` with two operands, or a "between" check with three.
fn ordered(args: &[Value], accept: fn(Ordering) -> bool) -> Value {
    let holds = |a: &Value, b: &Value| compare(a, b).is_some_and(accept);
    let result = if args.len() >= 3 {
        holds(arg(args, 0), arg(args, 1)) && holds(arg(args, 1), arg(args, 2))
    } else {
        holds(arg(args, 0), arg(args, 1))
    };
    Value::Bool(result)
}

// ---------------------------------------------------------------------------
// Eager operators
// ---------------------------------------------------------------------------

fn op_var(args: &[Value], data: &Value) -> LogicResult {
    let found = match arg(args, 0) {
        Value::Null => Some(data),
        Value::String(path) => lookup_path(data, path),
        Value::Number(n) => lookup_path(data, &n.to_string()),
        other => {
            return Err(LogicError::malformed(
                "var",
                format!("path must be a string or number, got {other}"),
            ))
        }
    };
    Ok(match found {
        Some(value) if !value.is_null() => value.clone(),
        _ => arg(args, 1).clone(),
    })
}

fn is_missing(data: &Value, key: &Value) -> bool {
    let path = match key {
        Value::String(s) => s.clone(),
        other => to_text(other),
    };
    match lookup_path(data, &path) {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

fn op_missing(args: &[Value], data: &Value) -> LogicResult {
    let keys = match args.first() {
        Some(Value::Array(keys)) => keys.as_slice(),
        _ => args,
    };
    Ok(Value::Array(
        keys.iter().filter(|k| is_missing(data, k)).cloned().collect(),
    ))
}

fn op_missing_some(args: &[Value], data: &Value) -> LogicResult {
    let need = to_number(arg(args, 0))
        .ok_or_else(|| LogicError::malformed("missing_some", "minimum must be a number"))?;
    let Value::Array(keys) = arg(args, 1) else {
        return Err(LogicError::malformed("missing_some", "keys must be an array"));
    };
    let missing: Vec<Value> = keys.iter().filter(|k| is_missing(data, k)).cloned().collect();
    #[allow(clippy::cast_precision_loss)]
    let present = (keys.len() - missing.len()) as f64;
    Ok(if present >= need {
        json!([])
    } else {
        Value::Array(missing)
    })
}

fn op_loose_eq(args: &[Value], _data: &Value) -> LogicResult {
    Ok(Value::Bool(loose_eq(arg(args, 0), arg(args, 1))))
}

fn op_loose_neq(args: &[Value], _data: &Value) -> LogicResult {
    Ok(Value::Bool(!loose_eq(arg(args, 0), arg(args, 1))))
}

fn op_strict_eq(args: &[Value], _data: &Value) -> LogicResult {
    Ok(Value::Bool(strict_eq(arg(args, 0), arg(args, 1))))
}

fn op_strict_neq(args: &[Value], _data: &Value) -> LogicResult {
    Ok(Value::Bool(!strict_eq(arg(args, 0), arg(args, 1))))
}

fn op_not(args: &[Value], _data: &Value) -> LogicResult {
    Ok(Value::Bool(!truthy(arg(args, 0))))
}

fn op_truthy(args: &[Value], _data: &Value) -> LogicResult {
    Ok(Value::Bool(truthy(arg(args, 0))))
}

fn op_lt(args: &[Value], _data: &Value) -> LogicResult {
    Ok(ordered(args, Ordering::is_lt))
}

fn op_lte(args: &[Value], _data: &Value) -> LogicResult {
    Ok(ordered(args, Ordering::is_le))
}

fn op_gt(args: &[Value], _data: &Value) -> LogicResult {
    Ok(Value::Bool(
        compare(arg(args, 0), arg(args, 1)).is_some_and(Ordering::is_gt),
    ))
}

fn op_gte(args: &[Value], _data: &Value) -> LogicResult {
    Ok(Value::Bool(
        compare(arg(args, 0), arg(args, 1)).is_some_and(Ordering::is_ge),
    ))
}

fn op_add(args: &[Value], _data: &Value) -> LogicResult {
    Ok(number(numbers("+", args)?.iter().sum()))
}

fn op_sub(args: &[Value], _data: &Value) -> LogicResult {
    let values = numbers("-", args)?;
    match values.as_slice() {
        [single] => Ok(number(-single)),
        [a, b, ..] => Ok(number(a - b)),
        [] => Err(LogicError::malformed("-", "expected one or two operands")),
    }
}

fn op_mul(args: &[Value], _data: &Value) -> LogicResult {
    Ok(number(numbers("*", args)?.iter().product()))
}

fn op_div(args: &[Value], _data: &Value) -> LogicResult {
    let values = numbers("/", args)?;
    match values.as_slice() {
        [a, b, ..] => Ok(number(a / b)),
        _ => Err(LogicError::malformed("/", "expected two operands")),
    }
}

fn op_mod(args: &[Value], _data: &Value) -> LogicResult {
    let values = numbers("%", args)?;
    match values.as_slice() {
        [a, b, ..] => Ok(number(a % b)),
        _ => Err(LogicError::malformed("%", "expected two operands")),
    }
}

fn op_min(args: &[Value], _data: &Value) -> LogicResult {
    let values = numbers("min", args)?;
    Ok(values.into_iter().reduce(f64::min).map_or(Value::Null, number))
}

fn op_max(args: &[Value], _data: &Value) -> LogicResult {
    let values = numbers("max", args)?;
    Ok(values.into_iter().reduce(f64::max).map_or(Value::Null, number))
}

fn op_cat(args: &[Value], _data: &Value) -> LogicResult {
    Ok(Value::String(args.iter().map(to_text).collect()))
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss
)]
fn op_substr(args: &[Value], _data: &Value) -> LogicResult {
    let chars: Vec<char> = to_text(arg(args, 0)).chars().collect();
    let len = chars.len() as i64;
    let clamp = |i: i64| i.clamp(0, len) as usize;

    let start = to_number(arg(args, 1)).unwrap_or(0.0) as i64;
    let from = clamp(if start < 0 { len.saturating_add(start) } else { start });
    let to = match args.get(2).and_then(to_number) {
        None => chars.len(),
        Some(n) if n < 0.0 => clamp(len.saturating_add(n as i64)),
        Some(n) => clamp((from as i64).saturating_add(n as i64)),
    };
    Ok(Value::String(chars[from..to.max(from)].iter().collect()))
}

fn op_in(args: &[Value], _data: &Value) -> LogicResult {
    let needle = arg(args, 0);
    Ok(Value::Bool(match arg(args, 1) {
        Value::String(haystack) => haystack.contains(&to_text(needle)),
        Value::Array(items) => items.iter().any(|item| strict_eq(item, needle)),
        _ => false,
    }))
}

fn op_merge(args: &[Value], _data: &Value) -> LogicResult {
    let mut out = Vec::new();
    for value in args {
        match value {
            Value::Array(items) => out.extend(items.iter().cloned()),
            other => out.push(other.clone()),
        }
    }
    Ok(Value::Array(out))
}

fn op_log(args: &[Value], _data: &Value) -> LogicResult {
    let value = arg(args, 0).clone();
    tracing::debug!(%value, "logic log");
    Ok(value)
}

// ---------------------------------------------------------------------------
// Raw operators
// ---------------------------------------------------------------------------

fn raw_args(args: &Value) -> &[Value] {
    match args {
        Value::Array(items) => items.as_slice(),
        single => std::slice::from_ref(single),
    }
}

/// `if` / `?:`: `[cond, then, cond, then, ..., else]`, evaluated lazily.
struct If;

#[async_trait]
impl RawOperator for If {
    async fn apply(&self, engine: &LogicEngine, args: &Value, data: &Value) -> LogicResult {
        let branches = raw_args(args);
        let mut rest = branches;
        while let [condition, then, tail @ ..] = rest {
            if truthy(&engine.apply(condition, data).await?) {
                return engine.apply(then, data).await;
            }
            rest = tail;
        }
        match rest {
            [otherwise] => engine.apply(otherwise, data).await,
            _ => Ok(Value::Null),
        }
    }
}

/// Returns the first falsy operand, or the last one.
struct And;

#[async_trait]
impl RawOperator for And {
    async fn apply(&self, engine: &LogicEngine, args: &Value, data: &Value) -> LogicResult {
        let mut last = Value::Bool(true);
        for operand in raw_args(args) {
            last = engine.apply(operand, data).await?;
            if !truthy(&last) {
                break;
            }
        }
        Ok(last)
    }
}

/// Returns the first truthy operand, or the last one.
struct Or;

#[async_trait]
impl RawOperator for Or {
    async fn apply(&self, engine: &LogicEngine, args: &Value, data: &Value) -> LogicResult {
        let mut last = Value::Bool(false);
        for operand in raw_args(args) {
            last = engine.apply(operand, data).await?;
            if truthy(&last) {
                break;
            }
        }
        Ok(last)
    }
}

/// Array iteration where the inner expression runs with each item as its data.
enum Iterate {
    Map,
    Filter,
    All,
    Some,
    None,
}

impl Iterate {
    fn name(&self) -> &'static str {
        match self {
            Self::Map => "map",
            Self::Filter => "filter",
            Self::All => "all",
            Self::Some => "some",
            Self::None => "none",
        }
    }
}

async fn source_items(
    engine: &LogicEngine,
    operator: &str,
    args: &[Value],
    data: &Value,
) -> Result<Vec<Value>, LogicError> {
    match engine.apply(arg(args, 0), data).await? {
        Value::Array(items) => Ok(items),
        Value::Null => Ok(Vec::new()),
        other => Err(LogicError::malformed(
            operator,
            format!("expected an array, got {other}"),
        )),
    }
}

#[async_trait]
impl RawOperator for Iterate {
    async fn apply(&self, engine: &LogicEngine, args: &Value, data: &Value) -> LogicResult {
        let args = raw_args(args);
        let items = source_items(engine, self.name(), args, data).await?;
        let logic = arg(args, 1);

        match self {
            Self::Map => {
                let mut out = Vec::with_capacity(items.len());
                for item in &items {
                    out.push(engine.apply(logic, item).await?);
                }
                Ok(Value::Array(out))
            }
            Self::Filter => {
                let mut out = Vec::new();
                for item in items {
                    if truthy(&engine.apply(logic, &item).await?) {
                        out.push(item);
                    }
                }
                Ok(Value::Array(out))
            }
            Self::All => {
                if items.is_empty() {
                    return Ok(Value::Bool(false));
                }
                for item in &items {
                    if !truthy(&engine.apply(logic, item).await?) {
                        return Ok(Value::Bool(false));
                    }
                }
                Ok(Value::Bool(true))
            }
            Self::Some | Self::None => {
                let mut found = false;
                for item in &items {
                    if truthy(&engine.apply(logic, item).await?) {
                        found = true;
                        break;
                    }
                }
                Ok(Value::Bool(matches!(self, Self::Some) == found))
            }
        }
    }
}

/// `reduce`: `[array, logic, initial]`; the logic sees `current` and `accumulator`.
struct Reduce;

#[async_trait]
impl RawOperator for Reduce {
    async fn apply(&self, engine: &LogicEngine, args: &Value, data: &Value) -> LogicResult {
        let args = raw_args(args);
        let items = source_items(engine, "reduce", args, data).await?;
        let logic = arg(args, 1);
        let mut accumulator = engine.apply(arg(args, 2), data).await?;
        for current in items {
            let mut scope = Map::new();
            scope.insert("current".to_string(), current);
            scope.insert("accumulator".to_string(), accumulator);
            accumulator = engine.apply(logic, &Value::Object(scope)).await?;
        }
        Ok(accumulator)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

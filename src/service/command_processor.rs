//! Arithmetic command evaluation.
//!
//! A client sends `{"command":"add","a":10,"b":5}` and receives either
//! `{"result":15,"command":"add"}` or `{"command":"divide","error":"..."}`.
//! Evaluation is pure: no state, no side effects, and every failure is a
//! response value rather than an error.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Largest magnitude at which every integer is exactly representable in
/// an `f64` (2^53).
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Structured arithmetic request. Missing and `null` fields take their
/// zero value.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CommandRequest {
    /// Operation name (`add`, `subtract`, `multiply`, `divide`).
    #[serde(deserialize_with = "null_as_default")]
    pub command: String,
    /// Left operand.
    #[serde(deserialize_with = "null_as_default")]
    pub a: f64,
    /// Right operand.
    #[serde(deserialize_with = "null_as_default")]
    pub b: f64,
}

/// Structured arithmetic response. Exactly one of `result` and `error` is
/// set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandResponse {
    /// Numeric result; integral values serialize without a fraction.
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_result"
    )]
    pub result: Option<f64>,
    /// Echo of the requested operation, or `"unknown"` if unparsable.
    pub command: String,
    /// Failure description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommandResponse {
    /// Successful evaluation.
    #[must_use]
    pub fn success(command: impl Into<String>, result: f64) -> Self {
        Self {
            result: Some(result),
            command: command.into(),
            error: None,
        }
    }

    /// Failed evaluation.
    #[must_use]
    pub fn failure(command: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            result: None,
            command: command.into(),
            error: Some(error.into()),
        }
    }
}

/// Supported arithmetic operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// `a + b`
    Add,
    /// `a - b`
    Subtract,
    /// `a * b`
    Multiply,
    /// `a / b`, rejected when `b` is zero.
    Divide,
}

impl Operation {
    /// Applies the operation.
    ///
    /// # Errors
    ///
    /// Returns a message for division by zero or a non-finite result.
    pub fn apply(self, a: f64, b: f64) -> Result<f64, String> {
        let value = match self {
            Self::Add => a + b,
            Self::Subtract => a - b,
            Self::Multiply => a * b,
            Self::Divide => {
                if b == 0.0 {
                    return Err("division by zero".to_string());
                }
                a / b
            }
        };
        if value.is_finite() {
            Ok(value)
        } else {
            Err("result is not a finite number".to_string())
        }
    }
}

/// Unrecognised operation name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown command: {0}")]
pub struct UnknownOperation(pub String);

impl FromStr for Operation {
    type Err = UnknownOperation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add" => Ok(Self::Add),
            "subtract" => Ok(Self::Subtract),
            "multiply" => Ok(Self::Multiply),
            "divide" => Ok(Self::Divide),
            other => Err(UnknownOperation(other.to_string())),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Add => "add",
            Self::Subtract => "subtract",
            Self::Multiply => "multiply",
            Self::Divide => "divide",
        };
        f.write_str(name)
    }
}

/// Stateless evaluator for [`CommandRequest`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandProcessor;

impl CommandProcessor {
    /// Evaluates a parsed request.
    #[must_use]
    pub fn evaluate(request: &CommandRequest) -> CommandResponse {
        let outcome = request
            .command
            .parse::<Operation>()
            .map_err(|e| e.to_string())
            .and_then(|op| op.apply(request.a, request.b));

        match outcome {
            Ok(value) => CommandResponse::success(&request.command, value),
            Err(message) => CommandResponse::failure(&request.command, message),
        }
    }

    /// Parses and evaluates a raw JSON payload.
    #[must_use]
    pub fn process(payload: &str) -> CommandResponse {
        match serde_json::from_str::<CommandRequest>(payload) {
            Ok(request) => Self::evaluate(&request),
            Err(e) => CommandResponse::failure("unknown", format!("invalid JSON: {e}")),
        }
    }

    /// Parses, evaluates and renders the response as JSON text.
    #[must_use]
    pub fn process_to_json(payload: &str) -> String {
        let response = Self::process(payload);
        serde_json::to_string(&response).unwrap_or_else(|e| {
            serde_json::json!({ "error": e.to_string() }).to_string()
        })
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[allow(clippy::ref_option, clippy::cast_possible_truncation)]
fn serialize_result<S: Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
    match *value {
        Some(v) if v.fract() == 0.0 && v.abs() < MAX_EXACT_INTEGER => {
            serializer.serialize_i64(v as i64)
        }
        Some(v) => serializer.serialize_f64(v),
        None => serializer.serialize_none(),
    }
}

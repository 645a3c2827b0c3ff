//! The endpoint invocation seam used by `<?call?>`.
//!
//! The renderer never talks to endpoints itself. The embedding application
//! supplies an [`EndpointInvoker`] that dispatches `(endpoint, method, args)`
//! however it likes (in-process handlers, HTTP, a subprocess) and enforces
//! its own timeouts. A timeout is reported like any other failure.

use std::collections::BTreeMap;
use std::fmt;

use hrml_types::Value;
use serde::Serialize;

/// Dispatches `<?call?>` invocations.
pub trait EndpointInvoker: Send + Sync {
    fn call(
        &self,
        endpoint: &str,
        method: &str,
        args: &BTreeMap<String, Value>,
    ) -> Result<Value, InvocationError>;
}

impl<F> EndpointInvoker for F
where
    F: Fn(&str, &str, &BTreeMap<String, Value>) -> Result<Value, InvocationError> + Send + Sync,
{
    fn call(
        &self,
        endpoint: &str,
        method: &str,
        args: &BTreeMap<String, Value>,
    ) -> Result<Value, InvocationError> {
        self(endpoint, method, args)
    }
}

/// Invoker used when none is configured: every call fails as unavailable.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoInvoker;

impl EndpointInvoker for NoInvoker {
    fn call(
        &self,
        endpoint: &str,
        _method: &str,
        _args: &BTreeMap<String, Value>,
    ) -> Result<Value, InvocationError> {
        Err(InvocationError::new(InvocationErrorKind::Unavailable)
            .with_message(format!("no endpoint invoker configured for {endpoint}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationErrorKind {
    /// The endpoint ran and reported an error.
    Failed,
    /// The endpoint answered with a non-success status.
    Status,
    /// The endpoint did not answer in time.
    Timeout,
    /// No handler exists for the endpoint.
    Unavailable,
}

impl InvocationErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Failed => "failed",
            Self::Status => "status",
            Self::Timeout => "timeout",
            Self::Unavailable => "unavailable",
        }
    }
}

/// Why an endpoint invocation did not produce a value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvocationError {
    pub kind: InvocationErrorKind,
    pub status: Option<u16>,
    pub message: Option<String>,
}

impl InvocationError {
    pub fn new(kind: InvocationErrorKind) -> Self {
        Self {
            kind,
            status: None,
            message: None,
        }
    }

    /// A non-success status answer.
    pub fn status(status: u16) -> Self {
        Self {
            status: Some(status),
            ..Self::new(InvocationErrorKind::Status)
        }
    }

    pub fn timeout() -> Self {
        Self::new(InvocationErrorKind::Timeout)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// The `error` binding seen by a call's `<?error?>` branch:
    /// `{kind, status, message}`, absent parts as null.
    pub fn to_value(&self) -> Value {
        let mut fields = BTreeMap::new();
        fields.insert("kind".to_string(), Value::from(self.kind.as_str()));
        fields.insert(
            "status".to_string(),
            self.status
                .map_or(Value::Null, |status| Value::Number(f64::from(status))),
        );
        fields.insert(
            "message".to_string(),
            self.message.clone().map_or(Value::Null, Value::String),
        );
        Value::Map(fields)
    }
}

impl fmt::Display for InvocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind.as_str())?;
        if let Some(status) = self.status {
            write!(f, " {status}")?;
        }
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        Ok(())
    }
}

impl std::error::Error for InvocationError {}

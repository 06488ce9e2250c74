//! Wire envelopes exchanged with the caller.
//!
//! A caller sends a [`CommandEnvelope`] and eventually receives exactly one
//! terminal [`Delivery`] on the command's channel. Listener channels are the
//! exception: they stay open and receive any number of keep-open deliveries.

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::{Error, ErrorCode};
use crate::types::{ChannelId, Handle, ObjectKind, Target};

/// One command from the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandEnvelope {
    /// What the command is addressed to.
    pub target: Target,
    /// The target handle; absent for manager operations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<Handle>,
    /// Operation name.
    pub operation: String,
    /// Positional arguments.
    #[serde(default)]
    pub args: Vec<Value>,
    /// Where the result goes.
    pub channel: ChannelId,
}

impl CommandEnvelope {
    /// Builds a manager-level command.
    pub fn manager(operation: impl Into<String>, args: Vec<Value>, channel: ChannelId) -> Self {
        Self {
            target: Target::Manager,
            handle: None,
            operation: operation.into(),
            args,
            channel,
        }
    }

    /// Builds a command addressed to a handle.
    pub fn object(
        target: Target,
        handle: Handle,
        operation: impl Into<String>,
        args: Vec<Value>,
        channel: ChannelId,
    ) -> Self {
        Self {
            target,
            handle: Some(handle),
            operation: operation.into(),
            args,
            channel,
        }
    }

    /// Parses a command from its JSON form.
    ///
    /// # Errors
    /// - [`Error::Serialization`] if the JSON is not a command
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// The outcome of one command, or one listener event.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Success with a JSON value.
    Ok(Value),
    /// Failure with a stable code.
    Err {
        /// Machine-checkable code.
        code: ErrorCode,
        /// Human-readable message.
        message: String,
    },
}

impl Reply {
    /// Whether this is a success.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    /// The success value, if any.
    #[must_use]
    pub const fn value(&self) -> Option<&Value> {
        match self {
            Self::Ok(value) => Some(value),
            Self::Err { .. } => None,
        }
    }

    /// The error code, if any.
    #[must_use]
    pub const fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Ok(_) => None,
            Self::Err { code, .. } => Some(*code),
        }
    }
}

impl From<Error> for Reply {
    fn from(err: Error) -> Self {
        Self::Err {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

impl From<crate::Result<Value>> for Reply {
    fn from(result: crate::Result<Value>) -> Self {
        match result {
            Ok(value) => Self::Ok(value),
            Err(err) => err.into(),
        }
    }
}

/// A reply addressed to a caller channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    /// The channel to deliver on.
    pub channel: ChannelId,
    /// The payload.
    pub reply: Reply,
    /// Whether the channel stays open afterwards.
    pub keep_open: bool,
}

impl Delivery {
    /// A terminal delivery.
    #[must_use]
    pub const fn terminal(channel: ChannelId, reply: Reply) -> Self {
        Self {
            channel,
            reply,
            keep_open: false,
        }
    }

    /// A keep-open success delivery, used for listener events.
    #[must_use]
    pub const fn event(channel: ChannelId, value: Value) -> Self {
        Self {
            channel,
            reply: Reply::Ok(value),
            keep_open: true,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireDelivery<'a> {
    channel: ChannelId,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<ErrorCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    keep_open: bool,
}

impl Serialize for Delivery {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let wire = match &self.reply {
            Reply::Ok(value) => WireDelivery {
                channel: self.channel,
                ok: true,
                value: Some(value),
                code: None,
                message: None,
                keep_open: self.keep_open,
            },
            Reply::Err { code, message } => WireDelivery {
                channel: self.channel,
                ok: false,
                value: None,
                code: Some(*code),
                message: Some(message),
                keep_open: self.keep_open,
            },
        };
        wire.serialize(serializer)
    }
}

/// A handle returned to the caller, with descriptive metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRef {
    /// The new handle.
    pub handle: Handle,
    /// Its kind.
    pub kind: ObjectKind,
    /// Kind-specific metadata, flattened into the object.
    #[serde(flatten)]
    pub meta: Map<String, Value>,
}

impl ObjectRef {
    /// Creates a reference without metadata.
    #[must_use]
    pub fn new(handle: Handle, kind: ObjectKind) -> Self {
        Self {
            handle,
            kind,
            meta: Map::new(),
        }
    }

    /// Adds a metadata field.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.meta.insert(key.to_owned(), value.into());
        self
    }

    /// Converts into the JSON value sent on the wire.
    #[must_use]
    pub fn into_value(self) -> Value {
        let mut object = self.meta;
        object.insert("handle".into(), Value::from(self.handle.value()));
        object.insert("kind".into(), Value::from(self.kind.as_str()));
        Value::Object(object)
    }
}

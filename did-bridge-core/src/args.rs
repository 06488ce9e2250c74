//! Positional argument access for command handlers.

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::types::Handle;

/// The arguments of one command, already checked against the declared arity.
#[derive(Debug, Clone, Copy)]
pub struct Args<'a> {
    values: &'a [Value],
}

impl<'a> Args<'a> {
    /// Checks the argument count and wraps the values.
    ///
    /// # Errors
    /// - [`Error::InvalidArgumentCount`] if `values.len() != arity`
    pub fn new(operation: &str, values: &'a [Value], arity: usize) -> Result<Self> {
        if values.len() != arity {
            return Err(Error::InvalidArgumentCount {
                operation: operation.to_owned(),
                expected: arity,
                actual: values.len(),
            });
        }
        Ok(Self { values })
    }

    /// Raw value at `index`.
    ///
    /// # Errors
    /// - [`Error::InvalidArgumentType`] if the index is out of range
    pub fn value(&self, index: usize) -> Result<&'a Value> {
        self.values
            .get(index)
            .ok_or_else(|| Error::invalid_argument(index, "a value"))
    }

    /// String at `index`.
    ///
    /// # Errors
    /// - [`Error::InvalidArgumentType`] if the value is not a string
    pub fn str(&self, index: usize) -> Result<&'a str> {
        self.value(index)?
            .as_str()
            .ok_or_else(|| Error::invalid_argument(index, "a string"))
    }

    /// Non-empty string at `index`.
    ///
    /// # Errors
    /// - [`Error::InvalidArgumentType`] if the value is not a non-empty string
    pub fn non_empty_str(&self, index: usize) -> Result<&'a str> {
        match self.str(index)? {
            "" => Err(Error::invalid_argument(index, "a non-empty string")),
            value => Ok(value),
        }
    }

    /// String at `index`; `null` and `""` read as `None`.
    ///
    /// # Errors
    /// - [`Error::InvalidArgumentType`] if the value is neither string nor null
    pub fn opt_str(&self, index: usize) -> Result<Option<&'a str>> {
        match self.value(index)? {
            Value::Null => Ok(None),
            Value::String(value) if value.is_empty() => Ok(None),
            Value::String(value) => Ok(Some(value)),
            _ => Err(Error::invalid_argument(index, "a string or null")),
        }
    }

    /// Boolean at `index`.
    ///
    /// # Errors
    /// - [`Error::InvalidArgumentType`] if the value is not a boolean
    pub fn bool(&self, index: usize) -> Result<bool> {
        self.value(index)?
            .as_bool()
            .ok_or_else(|| Error::invalid_argument(index, "a boolean"))
    }

    /// Integer at `index`.
    ///
    /// # Errors
    /// - [`Error::InvalidArgumentType`] if the value is not an integer
    pub fn i64(&self, index: usize) -> Result<i64> {
        self.value(index)?
            .as_i64()
            .ok_or_else(|| Error::invalid_argument(index, "an integer"))
    }

    /// Non-negative 32-bit integer at `index`.
    ///
    /// # Errors
    /// - [`Error::InvalidArgumentType`] if the value does not fit
    pub fn u32(&self, index: usize) -> Result<u32> {
        self.value(index)?
            .as_u64()
            .and_then(|value| u32::try_from(value).ok())
            .ok_or_else(|| Error::invalid_argument(index, "a non-negative integer"))
    }

    /// Handle at `index`.
    ///
    /// # Errors
    /// - [`Error::InvalidArgumentType`] if the value is not a handle number
    pub fn handle(&self, index: usize) -> Result<Handle> {
        self.value(index)?
            .as_u64()
            .map(Handle)
            .ok_or_else(|| Error::invalid_argument(index, "a handle"))
    }

    /// JSON object at `index`.
    ///
    /// # Errors
    /// - [`Error::InvalidArgumentType`] if the value is not an object
    pub fn object(&self, index: usize) -> Result<&'a Map<String, Value>> {
        self.value(index)?
            .as_object()
            .ok_or_else(|| Error::invalid_argument(index, "an object"))
    }

    /// JSON text at `index`: a string is taken as-is, an object or array is
    /// serialised.
    ///
    /// # Errors
    /// - [`Error::InvalidArgumentType`] for any other value
    pub fn json_text(&self, index: usize) -> Result<String> {
        match self.value(index)? {
            Value::String(text) => Ok(text.clone()),
            value @ (Value::Object(_) | Value::Array(_)) => Ok(value.to_string()),
            _ => Err(Error::invalid_argument(index, "JSON text or an object")),
        }
    }

    /// Array of strings at `index`.
    ///
    /// # Errors
    /// - [`Error::InvalidArgumentType`] if the value is not an array of strings
    pub fn string_list(&self, index: usize) -> Result<Vec<String>> {
        let expected = || Error::invalid_argument(index, "an array of strings");
        self.value(index)?
            .as_array()
            .ok_or_else(expected)?
            .iter()
            .map(|item| item.as_str().map(str::to_owned).ok_or_else(expected))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use serde_json::json;

    #[test]
    fn test_arity_is_checked_first() {
        let values = vec![json!("a")];
        let err = Args::new("sign", &values, 2).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidArgumentCount);
        assert_eq!(err.to_string(), "sign: 2 parameters are expected, got 1");
    }

    #[test]
    fn test_typed_getters() {
        let values = vec![
            json!("pw"),
            json!(null),
            json!(true),
            json!(30),
            json!(["a", "b"]),
            json!({"k": 1}),
            json!(-1),
        ];
        let args = Args::new("op", &values, 7).unwrap();

        assert_eq!(args.str(0).unwrap(), "pw");
        assert_eq!(args.opt_str(1).unwrap(), None);
        assert!(args.bool(2).unwrap());
        assert_eq!(args.u32(3).unwrap(), 30);
        assert_eq!(args.handle(3).unwrap(), Handle(30));
        assert_eq!(args.string_list(4).unwrap(), vec!["a", "b"]);
        assert_eq!(args.json_text(5).unwrap(), r#"{"k":1}"#);
        assert_eq!(args.i64(6).unwrap(), -1);

        assert!(matches!(
            args.str(2),
            Err(Error::InvalidArgumentType { index: 2, .. })
        ));
        assert!(args.u32(6).is_err());
        assert!(args.string_list(5).is_err());
        assert!(args.bool(7).is_err());
    }
}

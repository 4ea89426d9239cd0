//! Field descriptors for create/edit style commands
//!
//! Every bulk-capable command declares its inputs as an ordered list of
//! [`Field`]s. The same list drives:
//!
//! - registration of one command-line flag per field
//! - interactive prompting for mandatory fields that were not supplied
//! - coercion of loosely typed file input (CSV cells, JSON strings)
//!
//! Values are applied to the command's target type through positional
//! [`Setter`]s: the Nth setter receives the Nth field's value.

use std::fmt;
use std::io::{BufRead, Write};

use serde_json::{Map, Number, Value as Json};

use crate::error::InputError;

/// Validator for an int field; returns a human-readable reason on failure
pub type IntValidator = fn(&i64) -> Result<(), String>;

/// Validator for a string field or for each element of a string list
pub type StrValidator = fn(&str) -> Result<(), String>;

/// A typed field value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Str(String),
    IntList(Vec<i64>),
    StrList(Vec<String>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Str(v) => f.write_str(v),
            Value::IntList(v) => {
                let parts: Vec<String> = v.iter().map(i64::to_string).collect();
                f.write_str(&parts.join(","))
            }
            Value::StrList(v) => f.write_str(&v.join(",")),
        }
    }
}

/// Declared type of a field, with its default and optional validator
#[derive(Debug, Clone)]
pub enum FieldKind {
    Bool {
        default: bool,
    },
    Int {
        default: i64,
        validate: Option<IntValidator>,
    },
    Str {
        default: String,
        validate: Option<StrValidator>,
    },
    IntList {
        default: Vec<i64>,
    },
    StrList {
        default: Vec<String>,
        validate: Option<StrValidator>,
    },
}

/// Kind tag without payload, used for mismatch diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarType {
    Bool,
    Int,
    Str,
    IntList,
    StrList,
}

impl FieldKind {
    pub fn var_type(&self) -> VarType {
        match self {
            FieldKind::Bool { .. } => VarType::Bool,
            FieldKind::Int { .. } => VarType::Int,
            FieldKind::Str { .. } => VarType::Str,
            FieldKind::IntList { .. } => VarType::IntList,
            FieldKind::StrList { .. } => VarType::StrList,
        }
    }

    pub fn default_value(&self) -> Value {
        match self {
            FieldKind::Bool { default } => Value::Bool(*default),
            FieldKind::Int { default, .. } => Value::Int(*default),
            FieldKind::Str { default, .. } => Value::Str(default.clone()),
            FieldKind::IntList { default } => Value::IntList(default.clone()),
            FieldKind::StrList { default, .. } => Value::StrList(default.clone()),
        }
    }
}

/// One declared input of a command
#[derive(Debug, Clone)]
pub struct Field {
    pub name: &'static str,
    pub help: &'static str,
    pub mandatory: bool,
    pub kind: FieldKind,
}

impl Field {
    pub fn bool(name: &'static str, help: &'static str, default: bool) -> Self {
        Self {
            name,
            help,
            mandatory: false,
            kind: FieldKind::Bool { default },
        }
    }

    pub fn int(name: &'static str, help: &'static str, default: i64) -> Self {
        Self {
            name,
            help,
            mandatory: false,
            kind: FieldKind::Int {
                default,
                validate: None,
            },
        }
    }

    pub fn string(name: &'static str, help: &'static str) -> Self {
        Self {
            name,
            help,
            mandatory: false,
            kind: FieldKind::Str {
                default: String::new(),
                validate: None,
            },
        }
    }

    pub fn int_list(name: &'static str, help: &'static str) -> Self {
        Self {
            name,
            help,
            mandatory: false,
            kind: FieldKind::IntList {
                default: Vec::new(),
            },
        }
    }

    pub fn string_list(name: &'static str, help: &'static str) -> Self {
        Self {
            name,
            help,
            mandatory: false,
            kind: FieldKind::StrList {
                default: Vec::new(),
                validate: None,
            },
        }
    }

    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    /// Replaces the default of a string field
    pub fn default_str(mut self, value: &str) -> Self {
        if let FieldKind::Str { default, .. } = &mut self.kind {
            *default = value.to_string();
        }
        self
    }

    pub fn validate_int(mut self, f: IntValidator) -> Self {
        if let FieldKind::Int { validate, .. } = &mut self.kind {
            *validate = Some(f);
        }
        self
    }

    /// Validator for a string field, or for each element of a string list
    pub fn validate_str(mut self, f: StrValidator) -> Self {
        match &mut self.kind {
            FieldKind::Str { validate, .. } | FieldKind::StrList { validate, .. } => {
                *validate = Some(f);
            }
            _ => {}
        }
        self
    }

    pub fn var_type(&self) -> VarType {
        self.kind.var_type()
    }

    pub fn default_value(&self) -> Value {
        self.kind.default_value()
    }

    /// Runs the field's validator, if any, against `value`
    pub fn check(&self, value: &Value) -> Result<(), InputError> {
        let result = match (&self.kind, value) {
            (FieldKind::Int { validate: Some(f), .. }, Value::Int(v)) => f(v),
            (FieldKind::Str { .. }, Value::Str(v)) if v.trim().is_empty() && self.mandatory => {
                Err("a value is required".to_string())
            }
            // optional strings may stay blank
            (FieldKind::Str { .. }, Value::Str(v)) if v.is_empty() => Ok(()),
            (FieldKind::Str { validate: Some(f), .. }, Value::Str(v)) => f(v.as_str()),
            (FieldKind::StrList { validate: Some(f), .. }, Value::StrList(items)) => {
                items.iter().try_for_each(|item| f(item.as_str()))
            }
            _ => Ok(()),
        };
        result.map_err(|reason| InputError::InvalidValue {
            field: self.name.to_string(),
            value: value.to_string(),
            reason,
        })
    }

    /// Parses user-typed text into this field's type and validates it
    pub fn parse(&self, text: &str) -> Result<Value, InputError> {
        let text = text.trim();
        let invalid = |reason: &str| InputError::InvalidValue {
            field: self.name.to_string(),
            value: text.to_string(),
            reason: reason.to_string(),
        };

        let value = match self.var_type() {
            VarType::Bool => Value::Bool(parse_bool(text).ok_or_else(|| invalid("expected true or false"))?),
            VarType::Int => Value::Int(text.parse().map_err(|_| invalid("expected an integer"))?),
            VarType::Str => Value::Str(text.to_string()),
            VarType::IntList => Value::IntList(
                split_list(text)
                    .map(|item| item.parse().map_err(|_| invalid("expected comma-separated integers")))
                    .collect::<Result<_, _>>()?,
            ),
            VarType::StrList => Value::StrList(split_list(text).map(str::to_string).collect()),
        };
        self.check(&value)?;
        Ok(value)
    }

    /// Coerces a loosely typed JSON value into the shape this field declares
    ///
    /// Strings become numbers or booleans, numbers become strings, scalars
    /// become single-element lists and comma strings become lists. Only the
    /// shape is checked here; see [`Field::check_json`] for the validator.
    pub fn coerce(&self, raw: &Json) -> Result<Json, InputError> {
        let invalid = |reason: &str| InputError::InvalidValue {
            field: self.name.to_string(),
            value: raw.to_string(),
            reason: reason.to_string(),
        };

        let coerced = match (self.var_type(), raw) {
            (_, Json::Null) => Json::Null,
            // blank CSV cells leave the seed value in place
            (t, Json::String(s)) if t != VarType::Str && s.trim().is_empty() => Json::Null,
            (VarType::Bool, Json::Bool(_)) => raw.clone(),
            (VarType::Bool, Json::Number(n)) => Json::Bool(n.as_i64().unwrap_or(0) != 0),
            (VarType::Bool, Json::String(s)) => {
                Json::Bool(parse_bool(s).ok_or_else(|| invalid("expected true or false"))?)
            }
            (VarType::Int, Json::Number(_)) => raw.clone(),
            (VarType::Int, Json::Bool(b)) => Json::from(i64::from(*b)),
            (VarType::Int, Json::String(s)) => {
                Json::from(s.trim().parse::<i64>().map_err(|_| invalid("expected an integer"))?)
            }
            (VarType::Str, Json::String(_)) => raw.clone(),
            (VarType::Str, Json::Number(n)) => Json::String(n.to_string()),
            (VarType::Str, Json::Bool(b)) => Json::String(b.to_string()),
            (VarType::IntList, Json::Array(items)) => Json::Array(
                items
                    .iter()
                    .map(|item| coerce_int(item).ok_or_else(|| invalid("expected a list of integers")))
                    .collect::<Result<_, _>>()?,
            ),
            (VarType::IntList, Json::String(s)) => Json::Array(
                split_list(s)
                    .map(|item| {
                        item.parse::<i64>()
                            .map(Json::from)
                            .map_err(|_| invalid("expected comma-separated integers"))
                    })
                    .collect::<Result<_, _>>()?,
            ),
            (VarType::IntList, Json::Number(n)) => Json::Array(vec![Json::Number(n.clone())]),
            (VarType::StrList, Json::Array(items)) => Json::Array(
                items
                    .iter()
                    .map(|item| match item {
                        Json::String(_) => item.clone(),
                        other => Json::String(other.to_string()),
                    })
                    .collect(),
            ),
            (VarType::StrList, Json::String(s)) => {
                Json::Array(split_list(s).map(|item| Json::String(item.to_string())).collect())
            }
            (VarType::StrList, Json::Number(n)) => Json::Array(vec![Json::String(n.to_string())]),
            _ => return Err(invalid("unexpected type")),
        };

        Ok(coerced)
    }

    /// Runs the validator against an already coerced JSON value
    pub fn check_json(&self, json: &Json) -> Result<(), InputError> {
        match json_to_value(self.var_type(), json) {
            Some(value) => self.check(&value),
            None => Ok(()),
        }
    }
}

fn coerce_int(item: &Json) -> Option<Json> {
    match item {
        Json::Number(n) if n.is_i64() => Some(item.clone()),
        Json::String(s) => s.trim().parse::<i64>().ok().map(Json::from),
        _ => None,
    }
}

fn json_to_value(var_type: VarType, json: &Json) -> Option<Value> {
    match (var_type, json) {
        (VarType::Int, Json::Number(n)) => n.as_i64().map(Value::Int),
        (VarType::Str, Json::String(s)) => Some(Value::Str(s.clone())),
        (VarType::StrList, Json::Array(items)) => Some(Value::StrList(
            items
                .iter()
                .filter_map(|i| i.as_str().map(str::to_string))
                .collect(),
        )),
        _ => None,
    }
}

impl From<Value> for Json {
    fn from(value: Value) -> Self {
        match value {
            Value::Bool(v) => Json::Bool(v),
            Value::Int(v) => Json::Number(Number::from(v)),
            Value::Str(v) => Json::String(v),
            Value::IntList(v) => Json::Array(v.into_iter().map(Json::from).collect()),
            Value::StrList(v) => Json::Array(v.into_iter().map(Json::String).collect()),
        }
    }
}

/// Weak-decodes `raw` against `fields`, overlaying it on `seed`
///
/// Keys naming a declared field are coerced to that field's type and
/// validated; other keys are passed through untouched. Missing keys keep the
/// seed's values, but a mandatory field must still end up with a valid value.
pub fn weak_decode<T>(fields: &[Field], seed: &T, raw: &Map<String, Json>) -> anyhow::Result<T>
where
    T: serde::Serialize + serde::de::DeserializeOwned,
{
    decode(fields, seed, raw, true)
}

/// Like [`weak_decode`], but only coerces; nothing is validated
///
/// Used for server-side state, which is taken as it is.
pub fn weak_decode_lenient<T>(fields: &[Field], seed: &T, raw: &Map<String, Json>) -> anyhow::Result<T>
where
    T: serde::Serialize + serde::de::DeserializeOwned,
{
    decode(fields, seed, raw, false)
}

fn decode<T>(fields: &[Field], seed: &T, raw: &Map<String, Json>, validate: bool) -> anyhow::Result<T>
where
    T: serde::Serialize + serde::de::DeserializeOwned,
{
    let mut base = match serde_json::to_value(seed)? {
        Json::Object(map) => map,
        _ => Map::new(),
    };

    for (key, value) in raw {
        let coerced = match fields.iter().find(|f| f.name == key) {
            Some(field) => {
                let coerced = field.coerce(value)?;
                if validate && !coerced.is_null() {
                    field.check_json(&coerced)?;
                }
                coerced
            }
            None => value.clone(),
        };
        if !coerced.is_null() {
            base.insert(key.clone(), coerced);
        }
    }

    if validate {
        for field in fields.iter().filter(|f| f.mandatory) {
            let supplied = raw.get(field.name).is_some_and(|v| !v.is_null());
            if supplied {
                continue;
            }
            match base.get(field.name).filter(|v| !v.is_null()) {
                Some(value) => field.check_json(value)?,
                None => {
                    return Err(InputError::InvalidValue {
                        field: field.name.to_string(),
                        value: String::new(),
                        reason: "a value is required".to_string(),
                    }
                    .into())
                }
            }
        }
    }

    Ok(serde_json::from_value(Json::Object(base))?)
}

/// Strongly typed positional setter for a target `T`
pub enum Setter<T> {
    Bool(Box<dyn Fn(&mut T, bool) + Send + Sync>),
    Int(Box<dyn Fn(&mut T, i64) + Send + Sync>),
    Str(Box<dyn Fn(&mut T, String) + Send + Sync>),
    IntList(Box<dyn Fn(&mut T, Vec<i64>) + Send + Sync>),
    StrList(Box<dyn Fn(&mut T, Vec<String>) + Send + Sync>),
}

impl<T> Setter<T> {
    pub fn bool(f: impl Fn(&mut T, bool) + Send + Sync + 'static) -> Self {
        Setter::Bool(Box::new(f))
    }

    pub fn int(f: impl Fn(&mut T, i64) + Send + Sync + 'static) -> Self {
        Setter::Int(Box::new(f))
    }

    pub fn string(f: impl Fn(&mut T, String) + Send + Sync + 'static) -> Self {
        Setter::Str(Box::new(f))
    }

    pub fn int_list(f: impl Fn(&mut T, Vec<i64>) + Send + Sync + 'static) -> Self {
        Setter::IntList(Box::new(f))
    }

    pub fn string_list(f: impl Fn(&mut T, Vec<String>) + Send + Sync + 'static) -> Self {
        Setter::StrList(Box::new(f))
    }

    pub fn var_type(&self) -> VarType {
        match self {
            Setter::Bool(_) => VarType::Bool,
            Setter::Int(_) => VarType::Int,
            Setter::Str(_) => VarType::Str,
            Setter::IntList(_) => VarType::IntList,
            Setter::StrList(_) => VarType::StrList,
        }
    }

    /// Applies `value` to `target`
    ///
    /// # Panics
    ///
    /// Panics when the value's type does not match the setter's; that is a
    /// wiring bug in the command, not a user error.
    pub fn apply(&self, target: &mut T, value: Value) {
        match (self, value) {
            (Setter::Bool(f), Value::Bool(v)) => f(target, v),
            (Setter::Int(f), Value::Int(v)) => f(target, v),
            (Setter::Str(f), Value::Str(v)) => f(target, v),
            (Setter::IntList(f), Value::IntList(v)) => f(target, v),
            (Setter::StrList(f), Value::StrList(v)) => f(target, v),
            (setter, value) => panic!(
                "setter of type {:?} received a value of a different type: {:?}",
                setter.var_type(),
                value
            ),
        }
    }
}

/// Checks that `setters` line up with `fields` one-to-one by type
///
/// # Panics
///
/// Panics on an arity or type mismatch.
pub fn assert_wiring<T>(fields: &[Field], setters: &[Setter<T>]) {
    assert_eq!(
        fields.len(),
        setters.len(),
        "{} fields declared but {} setters supplied",
        fields.len(),
        setters.len()
    );
    for (field, setter) in fields.iter().zip(setters) {
        assert_eq!(
            field.var_type(),
            setter.var_type(),
            "field `{}` is declared as {:?} but its setter takes {:?}",
            field.name,
            field.var_type(),
            setter.var_type()
        );
    }
}

/// Where explicitly supplied field values come from (usually parsed flags)
pub trait FieldSource {
    /// The value given for `field`, or `None` if the user did not supply one
    fn explicit(&self, field: &Field) -> Option<Value>;
}

/// No explicit values at all; every field falls back to prompt or default
pub struct NoFlags;

impl FieldSource for NoFlags {
    fn explicit(&self, _field: &Field) -> Option<Value> {
        None
    }
}

/// Asks the user for a field value
pub trait Prompt {
    fn ask(&mut self, field: &Field) -> Result<Value, InputError>;
}

/// Line-oriented prompt over any reader/writer pair
///
/// Re-asks until the answer parses and validates; read errors and end of
/// input are fatal.
pub struct LinePrompt<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> LinePrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl LinePrompt<std::io::StdinLock<'static>, std::io::Stderr> {
    pub fn stdio() -> Self {
        Self::new(std::io::stdin().lock(), std::io::stderr())
    }
}

impl<R: BufRead, W: Write> Prompt for LinePrompt<R, W> {
    fn ask(&mut self, field: &Field) -> Result<Value, InputError> {
        let read_error = |source| InputError::PromptRead {
            field: field.name.to_string(),
            source,
        };

        loop {
            write!(self.output, "{} ({}): ", field.name, field.help).map_err(read_error)?;
            self.output.flush().map_err(read_error)?;

            let mut line = String::new();
            let read = self.input.read_line(&mut line).map_err(read_error)?;
            if read == 0 {
                return Err(InputError::PromptEof(field.name.to_string()));
            }

            match field.parse(&line) {
                Ok(value) => return Ok(value),
                Err(e) => {
                    writeln!(self.output, "{}", e).map_err(read_error)?;
                }
            }
        }
    }
}

pub(crate) fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "y" => Some(true),
        "false" | "0" | "no" | "n" => Some(false),
        _ => None,
    }
}

fn split_list(text: &str) -> impl Iterator<Item = &str> {
    text.split(',').map(str::trim).filter(|s| !s.is_empty())
}

//! # Prototype / schema bridge
//!
//! A [`Prototype`] is the declarative description of a handler signature:
//! ordered keyword parameters, each with a semantic type, a required flag
//! and an optional default. It is the single source of truth for
//!
//! - the advertised `inputSchema` ([`Prototype::input_schema`]),
//! - incoming argument validation ([`Prototype::validate`], failures become
//!   `INVALID_PARAMS`),
//! - client-side coercion of string inputs ([`Prototype::coerce`]), and
//! - the reverse direction, rebuilding a prototype from an advertised
//!   schema ([`Prototype::from_input_schema`]).
//!
//! Return types are described separately by [`ReturnShape`], which drives
//! both the advertised `outputSchema` and the `structuredContent` wrapping.

use serde_json::{json, Map, Value};

use crate::error::ProtocolError;

/// Semantic type of a prototype parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// JSON integer
    Integer,
    /// JSON number
    Number,
    /// JSON boolean
    Boolean,
    /// JSON string
    String,
    /// JSON array
    Array,
    /// JSON object; also the fallback for undeclared types
    Object,
}

impl ParamKind {
    /// JSON-Schema type name
    pub fn json_name(&self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::String => "string",
            Self::Array => "array",
            Self::Object => "object",
        }
    }

    /// Kind for a JSON-Schema type name; unknown names fall back to object
    pub fn from_json_name(name: &str) -> Self {
        match name {
            "integer" => Self::Integer,
            "number" => Self::Number,
            "boolean" => Self::Boolean,
            "string" => Self::String,
            "array" => Self::Array,
            _ => Self::Object,
        }
    }

    /// Short Python-style name used in rendered signatures
    pub fn short_name(&self) -> &'static str {
        match self {
            Self::Integer => "int",
            Self::Number => "float",
            Self::Boolean => "bool",
            Self::String => "str",
            Self::Array => "list",
            Self::Object => "object",
        }
    }

    /// Whether a JSON value inhabits this kind
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::String => value.is_string(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }

    /// Coerce a raw string (CLI input) into a value of this kind.
    ///
    /// Kinds without a coercion rule pass the string through unchanged.
    pub fn coerce(&self, raw: &str) -> Result<Value, String> {
        match self {
            Self::Integer => raw
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| format!("`{raw}` is not an integer")),
            Self::Number => raw
                .parse::<f64>()
                .map(Value::from)
                .map_err(|_| format!("`{raw}` is not a number")),
            Self::Boolean => Ok(Value::Bool(raw == "true")),
            Self::String | Self::Array | Self::Object => Ok(Value::from(raw)),
        }
    }
}

/// One keyword parameter of a prototype
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    /// Parameter name
    pub name: String,
    /// Semantic type
    pub kind: ParamKind,
    /// Whether the argument must be supplied
    pub required: bool,
    /// Whether `null` is accepted in place of a value
    pub nullable: bool,
    /// Default value advertised in the schema
    pub default: Option<Value>,
    /// Human description advertised in the schema
    pub description: Option<String>,
}

impl Param {
    /// Required parameter of the given kind
    pub fn required(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
            nullable: false,
            default: None,
            description: None,
        }
    }

    /// Optional parameter; without a concrete default the advertised
    /// schema admits `null`
    pub fn optional(name: impl Into<String>, kind: ParamKind, default: Option<Value>) -> Self {
        let nullable = !matches!(default, Some(ref value) if !value.is_null());
        Self {
            name: name.into(),
            kind,
            required: false,
            nullable,
            default,
            description: None,
        }
    }

    /// Attach a description
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    fn property_schema(&self) -> Value {
        let mut schema = if self.nullable && !self.required {
            json!({"anyOf": [{"type": self.kind.json_name()}, {"type": "null"}]})
        } else {
            json!({"type": self.kind.json_name()})
        };
        if let Some(default) = &self.default {
            schema["default"] = default.clone();
        }
        if let Some(description) = &self.description {
            schema["description"] = Value::from(description.clone());
        }

        schema
    }
}

/// Declarative handler signature
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Prototype {
    /// Handler name
    pub name: String,
    /// Handler description
    pub description: String,
    /// Ordered keyword parameters
    pub params: Vec<Param>,
    /// Declared return shape, if any
    pub returns: Option<ReturnShape>,
}

impl Prototype {
    /// Empty prototype with a name and description
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            params: Vec::new(),
            returns: None,
        }
    }

    /// Append a parameter
    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    /// Append a required parameter of the given kind
    pub fn required(self, name: impl Into<String>, kind: ParamKind) -> Self {
        self.param(Param::required(name, kind))
    }

    /// Append an optional parameter with an advertised default
    pub fn optional(
        self,
        name: impl Into<String>,
        kind: ParamKind,
        default: Option<Value>,
    ) -> Self {
        self.param(Param::optional(name, kind, default))
    }

    /// Declare the return shape
    pub fn returning(mut self, shape: ReturnShape) -> Self {
        self.returns = Some(shape);
        self
    }

    /// Advertised `inputSchema` object.
    ///
    /// `required` is omitted when empty, matching the wire format clients
    /// expect from schema-less handlers.
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for param in &self.params {
            properties.insert(param.name.clone(), param.property_schema());
            if param.required {
                required.push(Value::from(param.name.clone()));
            }
        }

        let mut schema = Map::new();
        schema.insert("properties".to_owned(), Value::Object(properties));
        if !required.is_empty() {
            schema.insert("required".to_owned(), Value::Array(required));
        }
        schema.insert("type".to_owned(), Value::from("object"));

        Value::Object(schema)
    }

    /// Full advertised description: name, description, `inputSchema`, and
    /// `outputSchema` when a return shape is declared.
    pub fn describe(&self) -> Value {
        let mut schema = json!({
            "name": self.name,
            "description": self.description,
            "inputSchema": self.input_schema(),
        });
        if let Some(returns) = &self.returns {
            schema["outputSchema"] = returns.output_schema();
        }

        schema
    }

    /// Rebuild a validating prototype from an advertised schema.
    pub fn from_input_schema(
        name: &str,
        description: &str,
        input_schema: &Value,
    ) -> Result<Self, ProtocolError> {
        let no_properties = Map::new();
        let properties = match input_schema.get("properties") {
            Some(Value::Object(properties)) => properties,
            Some(other) => {
                return Err(ProtocolError::InvalidSchema(format!(
                    "properties of `{name}` is not an object: {other}"
                )));
            }
            None => &no_properties,
        };
        let required: Vec<&str> = input_schema
            .get("required")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let mut proto = Prototype::new(name, description);
        for (param_name, prop) in properties {
            let (kind, nullable) = property_kind(prop);

            proto = proto.param(Param {
                name: param_name.clone(),
                kind,
                required: required.contains(&param_name.as_str()),
                nullable,
                default: prop.get("default").cloned(),
                description: prop.get("description").and_then(Value::as_str).map(String::from),
            });
        }

        Ok(proto)
    }

    /// Validate an argument map against the prototype.
    ///
    /// The error message is suitable as an `INVALID_PARAMS` message.
    pub fn validate(&self, args: &Map<String, Value>) -> Result<(), String> {
        for name in args.keys() {
            if !self.params.iter().any(|param| param.name == *name) {
                return Err(format!("unexpected argument `{name}`"));
            }
        }

        for param in &self.params {
            match args.get(&param.name) {
                None => {
                    if param.required {
                        return Err(format!("missing required argument `{}`", param.name));
                    }
                }
                Some(Value::Null) if param.nullable || !param.required => {}
                Some(value) if param.kind.matches(value) => {}
                Some(value) => {
                    return Err(format!(
                        "argument `{}` is not of type {}: {value}",
                        param.name,
                        param.kind.json_name(),
                    ));
                }
            }
        }

        Ok(())
    }

    /// Coerce a raw string argument (CLI `-p name=value` input) through the
    /// parameter's kind. Unknown names are rejected client-side.
    pub fn coerce(&self, name: &str, raw: &str) -> Result<Value, String> {
        let param = self
            .params
            .iter()
            .find(|param| param.name == name)
            .ok_or_else(|| format!("unexpected argument `{name}`"))?;

        param.kind.coerce(raw)
    }

    /// Rendered signature, e.g. `get_temperature(city: str) -> float`
    pub fn signature(&self) -> String {
        let params: Vec<String> = self
            .params
            .iter()
            .map(|param| {
                let mut rendered = format!("{}: {}", param.name, param.kind.short_name());
                if !param.required {
                    match &param.default {
                        Some(default) => rendered.push_str(&format!(" = {default}")),
                        None => rendered.push_str(" = None"),
                    }
                }
                rendered
            })
            .collect();

        let mut signature = format!("{}({})", self.name, params.join(", "));
        if let Some(returns) = &self.returns {
            signature.push_str(&format!(" -> {}", returns.title()));
        }

        signature
    }
}

fn property_kind(prop: &Value) -> (ParamKind, bool) {
    if let Some(variants) = prop.get("anyOf").and_then(Value::as_array) {
        let nullable = variants
            .iter()
            .any(|v| v.get("type").and_then(Value::as_str) == Some("null"));
        let kind = variants
            .iter()
            .filter_map(|v| v.get("type").and_then(Value::as_str))
            .find(|name| *name != "null")
            .map(ParamKind::from_json_name)
            .unwrap_or(ParamKind::Object);

        return (kind, nullable);
    }

    match prop.get("type").and_then(Value::as_str) {
        Some(name) => (ParamKind::from_json_name(name), false),
        None => (ParamKind::Object, false),
    }
}

/// Declared return shape of a handler.
///
/// Drives the advertised `outputSchema` and the wrapping of handler return
/// values into `structuredContent`:
///
/// - a primitive value is wrapped as `{"result": value}`;
/// - a record or uniform mapping is emitted as-is.
#[derive(Debug, Clone, PartialEq)]
pub enum ReturnShape {
    /// Primitive (or array) value, wrapped under a `result` property
    Value {
        /// Advertised schema title (the type name)
        title: String,
        /// Schema of the value itself
        schema: Value,
    },
    /// Record with typed fields, advertised as-is
    Record {
        /// Complete object schema (properties, required, title)
        schema: Value,
    },
    /// Mapping with uniformly typed values
    Mapping {
        /// Schema of the mapping values
        value: Value,
    },
}

impl ReturnShape {
    /// Integer return
    pub fn integer() -> Self {
        Self::Value {
            title: "int".to_owned(),
            schema: json!({"type": "integer"}),
        }
    }

    /// Float return
    pub fn number() -> Self {
        Self::Value {
            title: "float".to_owned(),
            schema: json!({"type": "number"}),
        }
    }

    /// Boolean return
    pub fn boolean() -> Self {
        Self::Value {
            title: "bool".to_owned(),
            schema: json!({"type": "boolean"}),
        }
    }

    /// String return
    pub fn string() -> Self {
        Self::Value {
            title: "str".to_owned(),
            schema: json!({"type": "string"}),
        }
    }

    /// Binary return, advertised as a base64 string
    pub fn bytes() -> Self {
        Self::Value {
            title: "bytes".to_owned(),
            schema: json!({"format": "binary", "type": "string"}),
        }
    }

    /// Homogeneous array return
    pub fn array(items: Value) -> Self {
        Self::Value {
            title: "list".to_owned(),
            schema: json!({"items": items, "type": "array"}),
        }
    }

    /// Record return; use [`RecordShape`] to build the schema
    pub fn record(schema: Value) -> Self {
        Self::Record { schema }
    }

    /// Uniform mapping return
    pub fn mapping(value: Value) -> Self {
        Self::Mapping { value }
    }

    /// Advertised `outputSchema` object
    pub fn output_schema(&self) -> Value {
        match self {
            Self::Value { title, schema } => json!({
                "properties": {"result": schema},
                "required": ["result"],
                "title": title,
                "type": "object",
            }),
            Self::Record { schema } => schema.clone(),
            Self::Mapping { value } => json!({
                "additionalProperties": value,
                "type": "object",
            }),
        }
    }

    /// Wrap a handler return value into the `structuredContent` payload
    pub fn wrap_structured(&self, value: Value) -> Value {
        match self {
            Self::Value { .. } => json!({"result": value}),
            Self::Record { .. } | Self::Mapping { .. } => value,
        }
    }

    /// Title used in rendered signatures
    pub fn title(&self) -> &str {
        match self {
            Self::Value { title, .. } => title,
            Self::Record { schema } => schema
                .get("title")
                .and_then(Value::as_str)
                .unwrap_or("object"),
            Self::Mapping { .. } => "dict",
        }
    }
}

/// Builder for record return shapes
#[derive(Debug, Clone, Default)]
pub struct RecordShape {
    title: String,
    description: Option<String>,
    properties: Map<String, Value>,
    required: Vec<String>,
}

impl RecordShape {
    /// Record schema with the given title
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Attach a description
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Add a typed field
    pub fn field(mut self, name: impl Into<String>, schema: Value, required: bool) -> Self {
        let name = name.into();
        if required {
            self.required.push(name.clone());
        }
        self.properties.insert(name, schema);

        self
    }

    /// Finish building
    pub fn build(self) -> ReturnShape {
        let mut schema = Map::new();
        if let Some(description) = self.description {
            schema.insert("description".to_owned(), Value::from(description));
        }
        schema.insert("properties".to_owned(), Value::Object(self.properties));
        if !self.required.is_empty() {
            schema.insert(
                "required".to_owned(),
                Value::Array(self.required.into_iter().map(Value::from).collect()),
            );
        }
        schema.insert("title".to_owned(), Value::from(self.title));
        schema.insert("type".to_owned(), Value::from("object"));

        ReturnShape::Record {
            schema: Value::Object(schema),
        }
    }
}

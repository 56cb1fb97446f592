//! Property kinds, rule descriptors and property definitions.
//!
//! Validation rules and transforms are stored as tagged descriptors rather
//! than closures so a definition survives any serialization round-trip; the
//! executable behavior lives in [`super::validation`] and [`Transform::apply`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A bag of property values keyed by property key.
pub type PropertyMap = serde_json::Map<String, Value>;

/// Semantic type of a property value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyKind {
    /// Free text.
    Text,
    /// Numeric value (integer or float).
    Number,
    /// Boolean value.
    Boolean,
    /// Date in YYYY-MM-DD format (an ISO 8601 datetime is also accepted).
    Date,
    /// List of text values.
    List,
    /// One value out of the select options.
    Select,
    /// One value out of a fixed enumeration.
    Enum,
    /// Reference(s) to documents of another note type.
    Association,
    /// Nested key/value structure.
    Object,
}

impl PropertyKind {
    /// Get the display name for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::List => "list",
            Self::Select => "select",
            Self::Enum => "enum",
            Self::Association => "association",
            Self::Object => "object",
        }
    }

    /// Whether values of this kind are picked from a list of options.
    pub fn is_choice(&self) -> bool {
        matches!(self, Self::Select | Self::Enum)
    }
}

impl std::fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PropertyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "string" | "str" => Ok(Self::Text),
            "number" | "num" | "int" | "integer" | "float" => Ok(Self::Number),
            "boolean" | "bool" | "checkbox" => Ok(Self::Boolean),
            "date" | "datetime" => Ok(Self::Date),
            "list" | "array" | "tags" => Ok(Self::List),
            "select" | "status" => Ok(Self::Select),
            "enum" | "enumerated" => Ok(Self::Enum),
            "association" | "relation" => Ok(Self::Association),
            "object" | "map" => Ok(Self::Object),
            _ => Err(format!("unknown property kind: {}", s)),
        }
    }
}

/// Declarative validation rule, tagged by the kind of value it checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationRule {
    Text {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_length: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_length: Option<usize>,
        /// Regex the value must match; anchor it to match the whole value.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pattern: Option<String>,
    },
    Number {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
        #[serde(default)]
        integer: bool,
    },
    Boolean,
    Date,
    List {
        /// Rule applied to every item.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        items: Option<Box<ValidationRule>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_items: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_items: Option<usize>,
    },
    Enum {
        values: Vec<String>,
    },
    Association {
        #[serde(default)]
        multiple: bool,
    },
    Object,
    Any,
}

impl ValidationRule {
    /// The unconstrained rule for a property kind.
    pub fn default_for(kind: PropertyKind) -> Self {
        match kind {
            PropertyKind::Text => Self::Text { min_length: None, max_length: None, pattern: None },
            PropertyKind::Number => Self::Number { min: None, max: None, integer: false },
            PropertyKind::Boolean => Self::Boolean,
            PropertyKind::Date => Self::Date,
            PropertyKind::List => Self::List {
                items: Some(Box::new(Self::Text {
                    min_length: None,
                    max_length: None,
                    pattern: None,
                })),
                min_items: None,
                max_items: None,
            },
            PropertyKind::Select | PropertyKind::Enum => Self::Enum { values: vec![] },
            PropertyKind::Association => Self::Association { multiple: false },
            PropertyKind::Object => Self::Object,
        }
    }

    /// Short tag naming the rule variant.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Number { .. } => "number",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::List { .. } => "list",
            Self::Enum { .. } => "enum",
            Self::Association { .. } => "association",
            Self::Object => "object",
            Self::Any => "any",
        }
    }

    /// Whether this rule can check values of the given kind.
    pub fn fits(&self, kind: PropertyKind) -> bool {
        match (self, kind) {
            (Self::Any, _) => true,
            (Self::Text { .. }, PropertyKind::Text) => true,
            (Self::Number { .. }, PropertyKind::Number) => true,
            (Self::Boolean, PropertyKind::Boolean) => true,
            (Self::Date, PropertyKind::Date) => true,
            (Self::List { .. }, PropertyKind::List) => true,
            (Self::Enum { .. }, PropertyKind::Select | PropertyKind::Enum) => true,
            (Self::Association { .. }, PropertyKind::Association) => true,
            (Self::Object, PropertyKind::Object) => true,
            _ => false,
        }
    }
}

/// Pure value transform applied after a value passes validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Transform {
    Trim,
    Lowercase,
    Uppercase,
    /// Lowercase, collapse non-alphanumerics into single dashes.
    Slugify,
    /// Parse a textual number.
    ToNumber,
    /// Split a delimited string into a list of trimmed, non-empty items.
    SplitList {
        #[serde(default = "default_separator")]
        separator: String,
    },
    /// Round a number to a fixed number of decimals.
    Round {
        #[serde(default)]
        decimals: u32,
    },
}

fn default_separator() -> String {
    ",".to_string()
}

impl Transform {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Trim => "trim",
            Self::Lowercase => "lowercase",
            Self::Uppercase => "uppercase",
            Self::Slugify => "slugify",
            Self::ToNumber => "to_number",
            Self::SplitList { .. } => "split_list",
            Self::Round { .. } => "round",
        }
    }

    /// Whether this transform's output is still a value of the given kind.
    pub fn fits(&self, kind: PropertyKind) -> bool {
        use PropertyKind as K;
        match self {
            Self::Trim | Self::Lowercase | Self::Uppercase | Self::Slugify => matches!(
                kind,
                K::Text | K::Select | K::Enum | K::List | K::Date | K::Association
            ),
            Self::ToNumber | Self::Round { .. } => kind == K::Number,
            Self::SplitList { .. } => kind == K::List,
        }
    }

    /// Apply the transform. Text transforms map over lists of strings.
    pub fn apply(&self, value: &Value) -> Result<Value, String> {
        match self {
            Self::Trim => map_strings(value, |s| s.trim().to_string()),
            Self::Lowercase => map_strings(value, str::to_lowercase),
            Self::Uppercase => map_strings(value, str::to_uppercase),
            Self::Slugify => map_strings(value, slugify),
            Self::ToNumber => match value {
                Value::Number(_) => Ok(value.clone()),
                Value::String(s) => parse_number(s.trim())
                    .ok_or_else(|| format!("'{}' is not a number", s)),
                other => Err(format!("cannot convert {} to a number", json_type_name(other))),
            },
            Self::SplitList { separator } => match value {
                Value::Array(_) => Ok(value.clone()),
                Value::String(s) => Ok(Value::Array(
                    s.split(separator.as_str())
                        .map(str::trim)
                        .filter(|part| !part.is_empty())
                        .map(|part| Value::String(part.to_string()))
                        .collect(),
                )),
                other => Err(format!("cannot split {}", json_type_name(other))),
            },
            Self::Round { decimals } => match value.as_f64() {
                Some(f) => {
                    let factor = 10f64.powi(*decimals as i32);
                    let rounded = (f * factor).round() / factor;
                    if *decimals == 0 {
                        whole_number(rounded)
                    } else {
                        serde_json::Number::from_f64(rounded)
                            .map(Value::Number)
                            .ok_or_else(|| format!("{} cannot be represented", rounded))
                    }
                }
                None => Err(format!("cannot round {}", json_type_name(value))),
            },
        }
    }
}

/// An integral float as an integer value, when it fits in `i64`.
fn whole_number(f: f64) -> Result<Value, String> {
    if f.is_finite() && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Ok(Value::from(f as i64))
    } else {
        serde_json::Number::from_f64(f)
            .map(Value::Number)
            .ok_or_else(|| format!("{} cannot be represented", f))
    }
}

fn map_strings(value: &Value, f: impl Fn(&str) -> String) -> Result<Value, String> {
    match value {
        Value::String(s) => Ok(Value::String(f(s))),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(Value::String(f(s))),
                other => Err(format!("list item is {}, not text", json_type_name(other))),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        other => Err(format!("expected text, got {}", json_type_name(other))),
    }
}

pub(crate) fn slugify(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut pending_dash = false;
    for c in s.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    out
}

pub(crate) fn parse_number(s: &str) -> Option<Value> {
    if let Ok(i) = s.parse::<i64>() {
        return Some(Value::from(i));
    }
    if let Ok(u) = s.parse::<u64>() {
        return Some(Value::from(u));
    }
    s.parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
}

/// Get a human-readable type name for a JSON value.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "text",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

/// An option of a select/status property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectOption {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub is_done: bool,
    #[serde(default)]
    pub is_in_progress: bool,
}

impl SelectOption {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            color: None,
            is_default: false,
            is_done: false,
            is_in_progress: false,
        }
    }

    pub fn default_choice(mut self) -> Self {
        self.is_default = true;
        self
    }

    pub fn done(mut self) -> Self {
        self.is_done = true;
        self
    }

    pub fn in_progress(mut self) -> Self {
        self.is_in_progress = true;
        self
    }
}

/// Configuration of an association property.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AssociationConfig {
    /// Id of the note type the references point at.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_type: Option<String>,
    #[serde(default)]
    pub multiple: bool,
    #[serde(default)]
    pub allow_create: bool,
}

/// Schema definition for a single property of a note type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDefinition {
    /// Internal (logical) key.
    #[serde(default)]
    pub key: String,

    /// Key used in the stored header; may differ from `key`.
    #[serde(default)]
    pub external_key: String,

    /// Display name.
    #[serde(default)]
    pub name: String,

    pub kind: PropertyKind,

    #[serde(default)]
    pub required: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<Transform>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<ValidationRule>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default = "default_visible")]
    pub visible: bool,

    #[serde(default)]
    pub order: i32,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub select_options: Vec<SelectOption>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub association: Option<AssociationConfig>,

    /// Marks computed/derived values (e.g. `"computed"`, `"file.created"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Whether the value should render as a reference to another document.
    #[serde(default)]
    pub link: bool,
}

fn default_visible() -> bool {
    true
}

impl PropertyDefinition {
    /// Create a property whose external key equals its key, with the kind's
    /// unconstrained rule.
    pub fn new(key: impl Into<String>, name: impl Into<String>, kind: PropertyKind) -> Self {
        let key = key.into();
        Self {
            external_key: key.clone(),
            key,
            name: name.into(),
            kind,
            required: false,
            default_value: None,
            transform: None,
            rule: Some(ValidationRule::default_for(kind)),
            description: None,
            visible: true,
            order: 0,
            select_options: vec![],
            association: None,
            source: None,
            link: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn with_external_key(mut self, external_key: impl Into<String>) -> Self {
        self.external_key = external_key.into();
        self
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn with_rule(mut self, rule: ValidationRule) -> Self {
        self.rule = Some(rule);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    /// Set select options; the rule is kept in sync with the option values.
    pub fn with_options(mut self, options: Vec<SelectOption>) -> Self {
        self.rule = Some(ValidationRule::Enum {
            values: options.iter().map(|o| o.value.clone()).collect(),
        });
        self.select_options = options;
        self
    }

    pub fn with_association(mut self, config: AssociationConfig) -> Self {
        self.rule = Some(ValidationRule::Association { multiple: config.multiple });
        self.association = Some(config);
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn linked(mut self) -> Self {
        self.link = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// The rule to execute, falling back to the kind's default.
    pub fn effective_rule(&self) -> ValidationRule {
        self.rule.clone().unwrap_or_else(|| ValidationRule::default_for(self.kind))
    }

    /// Whether the property is reference-like without being association-typed.
    pub fn is_unconverted_reference(&self) -> bool {
        self.link && self.kind != PropertyKind::Association
    }
}

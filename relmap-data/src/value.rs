use chrono::NaiveDateTime;

/// Storage type of a mapped column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Short,
    Int,
    Long,
    Float,
    Double,
    Decimal,
    Bool,
    String,
    DateTime,
    Binary,
}

impl ValueType {
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            ValueType::Short
                | ValueType::Int
                | ValueType::Long
                | ValueType::Float
                | ValueType::Double
                | ValueType::Decimal
        )
    }

    pub fn is_integer(self) -> bool {
        matches!(self, ValueType::Short | ValueType::Int | ValueType::Long)
    }

    /// The "unset" value of this type, used to blank out keys and foreign keys.
    pub fn zero(self) -> Value {
        match self {
            ValueType::Short => Value::Short(0),
            ValueType::Int => Value::Int(0),
            ValueType::Long => Value::Long(0),
            ValueType::Float => Value::Float(0.0),
            ValueType::Double => Value::Double(0.0),
            ValueType::Decimal => Value::Decimal(0.0),
            ValueType::Bool => Value::Bool(false),
            ValueType::String => Value::Null,
            ValueType::DateTime => Value::DateTime(None),
            ValueType::Binary => Value::Binary(Vec::new()),
        }
    }
}

/// A field value read from, or written into, an entity instance.
///
/// `Null` stands for an absent optional field. `DateTime(None)` is the
/// minimum-date sentinel.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Decimal(f64),
    Bool(bool),
    Text(String),
    DateTime(Option<NaiveDateTime>),
    Binary(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// True when the value is its type's default, the convention for
    /// "no constraint" in filter-by-example instances.
    pub fn is_unset(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Short(v) => *v == 0 || *v == i16::MIN,
            Value::Int(v) => *v == 0 || *v == i32::MIN,
            Value::Long(v) => *v == 0 || *v == i64::MIN,
            Value::Float(v) => *v == 0.0,
            Value::Double(v) | Value::Decimal(v) => *v == 0.0,
            Value::Bool(v) => !*v,
            Value::Text(s) => s.trim().is_empty(),
            Value::DateTime(dt) => dt.map_or(true, |dt| dt == NaiveDateTime::MIN),
            Value::Binary(b) => b.is_empty(),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Short(v) => Some(i64::from(*v)),
            Value::Int(v) => Some(i64::from(*v)),
            Value::Long(v) => Some(*v),
            Value::Bool(v) => Some(i64::from(*v)),
            Value::Float(v) => Some(*v as i64),
            Value::Double(v) | Value::Decimal(v) => Some(*v as i64),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(f64::from(*v)),
            Value::Double(v) | Value::Decimal(v) => Some(*v),
            Value::Text(s) => s.trim().replace(',', ".").parse().ok(),
            other => other.as_i64().map(|v| v as f64),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Coerce this value into `T`, used by entities when hydrating rows.
    pub fn take<T: FromValue>(self) -> Option<T> {
        T::from_value(self)
    }

    /// Convert this value to the representation of `target`, e.g. a key read
    /// as `Long` from the driver written into an `Int` column.
    pub fn coerce(self, target: ValueType) -> Value {
        match target {
            ValueType::Short => self.as_i64().and_then(|v| i16::try_from(v).ok()).map_or(Value::Null, Value::Short),
            ValueType::Int => self.as_i64().and_then(|v| i32::try_from(v).ok()).map_or(Value::Null, Value::Int),
            ValueType::Long => self.as_i64().map_or(Value::Null, Value::Long),
            ValueType::Float => self.as_f64().map_or(Value::Null, |v| Value::Float(v as f32)),
            ValueType::Double => self.as_f64().map_or(Value::Null, Value::Double),
            ValueType::Decimal => self.as_f64().map_or(Value::Null, Value::Decimal),
            ValueType::Bool => self.as_i64().map_or(Value::Null, |v| Value::Bool(v != 0)),
            ValueType::String | ValueType::DateTime | ValueType::Binary => self,
        }
    }
}

const DATE_TIME_PATTERNS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Parse the textual date forms drivers commonly hand back.
pub fn parse_date_time(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    DATE_TIME_PATTERNS
        .iter()
        .find_map(|pattern| NaiveDateTime::parse_from_str(text, pattern).ok())
        .or_else(|| {
            chrono::NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Conversion from a [`Value`] into a concrete field type.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Option<Self>;
}

macro_rules! impl_from_value_int {
    ($($ty:ty),+) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: Value) -> Option<Self> {
                    value.as_i64().and_then(|v| <$ty>::try_from(v).ok())
                }
            }
        )+
    };
}

impl_from_value_int!(i16, i32, i64);

impl FromValue for f32 {
    fn from_value(value: Value) -> Option<Self> {
        value.as_f64().map(|v| v as f32)
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Option<Self> {
        value.as_f64()
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(b),
            Value::Text(s) => match s.to_lowercase().as_str() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            },
            other => other.as_i64().map(|v| v != 0),
        }
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Text(s) => Some(s),
            Value::Null => None,
            Value::DateTime(dt) => dt.map(|dt| dt.to_string()),
            Value::Binary(b) => String::from_utf8(b).ok(),
            other => other.as_f64().map(|v| v.to_string()),
        }
    }
}

impl FromValue for Option<String> {
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Null => Some(None),
            other => String::from_value(other).map(Some),
        }
    }
}

impl FromValue for Option<NaiveDateTime> {
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::DateTime(dt) => Some(dt),
            Value::Null => Some(None),
            Value::Text(s) => Some(parse_date_time(&s)),
            _ => None,
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Binary(b) => Some(b),
            Value::Text(s) => Some(s.into_bytes()),
            Value::Null => Some(Vec::new()),
            _ => None,
        }
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::Short(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Option<String>> for Value {
    fn from(v: Option<String>) -> Self {
        v.map_or(Value::Null, Value::Text)
    }
}

impl From<Option<NaiveDateTime>> for Value {
    fn from(v: Option<NaiveDateTime>) -> Self {
        Value::DateTime(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Binary(v)
    }
}

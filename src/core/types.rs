use std::cmp::Ordering;
use std::fmt;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Serialize, Deserialize};
use crate::core::error::{Error, ErrorKind, Result};

/// Dense, table-scoped record identifier. Ids start at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId(pub u32);

impl RecordId {
    pub fn new(id: u32) -> Self {
        RecordId(id)
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    pub(crate) fn index(&self) -> usize {
        self.0 as usize
    }
}

impl From<u32> for RecordId {
    fn from(id: u32) -> Self {
        RecordId(id)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TableKind {
    Array,
    Hash,
    PatriciaTrie,
    DoubleArrayTrie,
}

impl TableKind {
    pub fn name(&self) -> &'static str {
        match self {
            TableKind::Array => "array",
            TableKind::Hash => "hash",
            TableKind::PatriciaTrie => "patricia_trie",
            TableKind::DoubleArrayTrie => "double_array_trie",
        }
    }

    pub fn is_keyed(&self) -> bool {
        !matches!(self, TableKind::Array)
    }

    pub fn is_ordered(&self) -> bool {
        matches!(self, TableKind::PatriciaTrie | TableKind::DoubleArrayTrie)
    }
}

/// Byte limits of the bounded text types. ShortText is the only text key
/// type, so its limit is also the key size limit.
pub const SHORT_TEXT_MAX: usize = 4096;
pub const TEXT_MAX: usize = 65536;

/// Column value types and key types.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Bool,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float,
    Time,
    ShortText,
    Text,
    LongText,
    /// Foreign key into the named table.
    Reference(String),
}

impl DataType {
    pub fn name(&self) -> &str {
        match self {
            DataType::Bool => "Bool",
            DataType::Int32 => "Int32",
            DataType::UInt32 => "UInt32",
            DataType::Int64 => "Int64",
            DataType::UInt64 => "UInt64",
            DataType::Float => "Float",
            DataType::Time => "Time",
            DataType::ShortText => "ShortText",
            DataType::Text => "Text",
            DataType::LongText => "LongText",
            DataType::Reference(table) => table,
        }
    }

    /// Resolves builtin type names; anything else is taken as a table name.
    pub fn parse(name: &str) -> DataType {
        match name {
            "Bool" => DataType::Bool,
            "Int32" => DataType::Int32,
            "UInt32" => DataType::UInt32,
            "Int64" => DataType::Int64,
            "UInt64" => DataType::UInt64,
            "Float" => DataType::Float,
            "Time" => DataType::Time,
            "ShortText" => DataType::ShortText,
            "Text" => DataType::Text,
            "LongText" => DataType::LongText,
            other => DataType::Reference(other.to_string()),
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, DataType::ShortText | DataType::Text | DataType::LongText)
    }

    pub fn reference_table(&self) -> Option<&str> {
        match self {
            DataType::Reference(table) => Some(table),
            _ => None,
        }
    }

    /// Checks that this type may key a table of `kind`.
    pub fn check_key_type(&self, kind: TableKind) -> Result<()> {
        let keyable = match self {
            DataType::Text | DataType::LongText => false,
            DataType::Float | DataType::Bool | DataType::Reference(_) => !kind.is_ordered(),
            _ => true,
        };
        if keyable {
            Ok(())
        } else {
            Err(Error::new(
                ErrorKind::InvalidKeyType,
                format!("{} cannot be used as a key of a {} table", self.name(), kind.name()),
            ))
        }
    }

    /// Validates and normalizes a value for storage under this type.
    /// References are passed through; the owning column resolves keys.
    pub fn cast(&self, value: Value) -> Result<Value> {
        match (self, value) {
            (DataType::Bool, Value::Bool(b)) => Ok(Value::Bool(b)),
            (DataType::Bool, Value::Int(i)) => Ok(Value::Bool(i != 0)),
            (DataType::Bool, Value::UInt(u)) => Ok(Value::Bool(u != 0)),
            (DataType::Int32, v) => {
                let i = v.to_i64()?;
                i32::try_from(i)
                    .map(|_| Value::Int(i))
                    .map_err(|_| Error::new(ErrorKind::OutOfRange, format!("{} overflows Int32", i)))
            }
            (DataType::Int64, v) => v.to_i64().map(Value::Int),
            (DataType::UInt32, v) => {
                let u = v.to_u64()?;
                u32::try_from(u)
                    .map(|_| Value::UInt(u))
                    .map_err(|_| Error::new(ErrorKind::OutOfRange, format!("{} overflows UInt32", u)))
            }
            (DataType::UInt64, v) => v.to_u64().map(Value::UInt),
            (DataType::Float, Value::Float(f)) => Ok(Value::Float(f)),
            (DataType::Float, Value::Int(i)) => Ok(Value::Float(i as f64)),
            (DataType::Float, Value::UInt(u)) => Ok(Value::Float(u as f64)),
            (DataType::Time, Value::Time(t)) => Ok(Value::Time(truncate_micros(t))),
            (DataType::Time, Value::Int(secs)) => Utc
                .timestamp_opt(secs, 0)
                .single()
                .map(Value::Time)
                .ok_or_else(|| Error::new(ErrorKind::OutOfRange, format!("{} is not a valid time", secs))),
            (DataType::Time, Value::Float(secs)) => {
                let micros = (secs * 1_000_000.0).round() as i64;
                time_from_micros(micros).map(Value::Time)
            }
            (t, Value::Text(s)) if t.is_text() => {
                let max = match t {
                    DataType::ShortText => SHORT_TEXT_MAX,
                    DataType::Text => TEXT_MAX,
                    _ => usize::MAX,
                };
                if s.len() > max {
                    return Err(Error::invalid_argument(format!(
                        "{} bytes exceed {} limit of {} bytes", s.len(), t.name(), max
                    )));
                }
                Ok(Value::Text(s))
            }
            (t, v @ (Value::Int(_) | Value::UInt(_) | Value::Float(_) | Value::Bool(_))) if t.is_text() => {
                t.cast(Value::Text(v.to_string()))
            }
            (DataType::Reference(_), v @ (Value::Record(_) | Value::Text(_) | Value::Int(_) | Value::UInt(_))) => Ok(v),
            (t, v) => Err(Error::invalid_argument(format!(
                "cannot store {} as {}", v.type_name(), t.name()
            ))),
        }
    }

    /// Order-preserving byte encoding used for table keys.
    pub fn encode_key(&self, value: &Value) -> Result<Vec<u8>> {
        let value = self.cast(value.clone())?;
        let bytes = match (self, &value) {
            (DataType::Bool, Value::Bool(b)) => vec![*b as u8],
            (DataType::Int32, Value::Int(i)) => ((*i as i32 as u32) ^ 0x8000_0000).to_be_bytes().to_vec(),
            (DataType::Int64, Value::Int(i)) => ((*i as u64) ^ 0x8000_0000_0000_0000).to_be_bytes().to_vec(),
            (DataType::UInt32, Value::UInt(u)) => (*u as u32).to_be_bytes().to_vec(),
            (DataType::UInt64, Value::UInt(u)) => u.to_be_bytes().to_vec(),
            (DataType::Float, Value::Float(f)) => {
                let bits = f.to_bits();
                let ordered = if bits >> 63 == 1 { !bits } else { bits ^ 0x8000_0000_0000_0000 };
                ordered.to_be_bytes().to_vec()
            }
            (DataType::Time, Value::Time(t)) => {
                ((t.timestamp_micros() as u64) ^ 0x8000_0000_0000_0000).to_be_bytes().to_vec()
            }
            (DataType::Reference(_), Value::Record(id)) => id.0.to_be_bytes().to_vec(),
            (DataType::Reference(table), other) => {
                return Err(Error::invalid_argument(format!(
                    "key of a table keyed by {} must be a record id, got {}", table, other.type_name()
                )));
            }
            (_, Value::Text(s)) => s.as_bytes().to_vec(),
            (t, v) => {
                return Err(Error::invalid_argument(format!(
                    "cannot encode {} as {} key", v.type_name(), t.name()
                )));
            }
        };
        Ok(bytes)
    }

    pub fn decode_key(&self, bytes: &[u8]) -> Result<Value> {
        fn fixed<const N: usize>(bytes: &[u8]) -> Result<[u8; N]> {
            bytes.try_into().map_err(|_| Error::new(ErrorKind::Corrupt, "malformed key bytes"))
        }
        Ok(match self {
            DataType::Bool => Value::Bool(bytes.first().copied().unwrap_or(0) != 0),
            DataType::Int32 => Value::Int((u32::from_be_bytes(fixed(bytes)?) ^ 0x8000_0000) as i32 as i64),
            DataType::Int64 => Value::Int((u64::from_be_bytes(fixed(bytes)?) ^ 0x8000_0000_0000_0000) as i64),
            DataType::UInt32 => Value::UInt(u32::from_be_bytes(fixed(bytes)?) as u64),
            DataType::UInt64 => Value::UInt(u64::from_be_bytes(fixed(bytes)?)),
            DataType::Float => {
                let ordered = u64::from_be_bytes(fixed(bytes)?);
                let bits = if ordered >> 63 == 1 { ordered ^ 0x8000_0000_0000_0000 } else { !ordered };
                Value::Float(f64::from_bits(bits))
            }
            DataType::Time => {
                let micros = (u64::from_be_bytes(fixed(bytes)?) ^ 0x8000_0000_0000_0000) as i64;
                Value::Time(time_from_micros(micros)?)
            }
            DataType::Reference(_) => Value::Record(RecordId(u32::from_be_bytes(fixed(bytes)?))),
            DataType::ShortText | DataType::Text | DataType::LongText => {
                Value::Text(String::from_utf8_lossy(bytes).into_owned())
            }
        })
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Fixed-size per-record value slot of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueType {
    pub name: String,
    pub size: usize,
}

impl ValueType {
    pub fn new(name: &str, size: usize) -> Self {
        ValueType { name: name.to_string(), size }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Time(DateTime<Utc>),
    Text(String),
    Record(RecordId),
    Vector(Vec<Value>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::UInt(_) => "uint",
            Value::Float(_) => "float",
            Value::Time(_) => "time",
            Value::Text(_) => "text",
            Value::Record(_) => "record",
            Value::Vector(_) => "vector",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<RecordId> {
        match self {
            Value::Record(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.to_i64().ok()
    }

    pub fn as_time(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Time(t) => Some(*t),
            _ => None,
        }
    }

    fn to_i64(&self) -> Result<i64> {
        match self {
            Value::Int(i) => Ok(*i),
            Value::UInt(u) => i64::try_from(*u)
                .map_err(|_| Error::new(ErrorKind::OutOfRange, format!("{} overflows Int64", u))),
            Value::Bool(b) => Ok(*b as i64),
            Value::Text(s) => s.trim().parse::<i64>()
                .map_err(|_| Error::invalid_argument(format!("'{}' is not an integer", s))),
            other => Err(Error::invalid_argument(format!("{} is not an integer", other.type_name()))),
        }
    }

    fn to_u64(&self) -> Result<u64> {
        match self {
            Value::UInt(u) => Ok(*u),
            Value::Int(i) => u64::try_from(*i)
                .map_err(|_| Error::new(ErrorKind::OutOfRange, format!("{} is negative", i))),
            Value::Bool(b) => Ok(*b as u64),
            Value::Text(s) => s.trim().parse::<u64>()
                .map_err(|_| Error::invalid_argument(format!("'{}' is not an unsigned integer", s))),
            other => Err(Error::invalid_argument(format!("{} is not an integer", other.type_name()))),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Bool(_) => 0,
            Value::Int(_) | Value::UInt(_) | Value::Float(_) => 1,
            Value::Time(_) => 2,
            Value::Text(_) => 3,
            Value::Record(_) => 4,
            Value::Vector(_) => 5,
        }
    }

    /// Total order used by sort and grouping.
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::UInt(a), Value::UInt(b)) => a.cmp(b),
            (Value::Int(a), Value::UInt(b)) => (*a as i128).cmp(&(*b as i128)),
            (Value::UInt(a), Value::Int(b)) => (*a as i128).cmp(&(*b as i128)),
            (Value::Time(a), Value::Time(b)) => a.cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Record(a), Value::Record(b)) => a.cmp(b),
            (Value::Vector(a), Value::Vector(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    let ord = x.compare(y);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            (a, b) if a.rank() == 1 && b.rank() == 1 => a.as_f64().total_cmp(&b.as_f64()),
            (a, b) => a.rank().cmp(&b.rank()),
        }
    }

    fn as_f64(&self) -> f64 {
        match self {
            Value::Int(i) => *i as f64,
            Value::UInt(u) => *u as f64,
            Value::Float(f) => *f,
            _ => 0.0,
        }
    }

    /// Text used when the value is fed to a tokenizer.
    pub fn to_index_text(&self) -> Option<String> {
        match self {
            Value::Text(s) => Some(s.clone()),
            Value::Vector(_) | Value::Record(_) => None,
            other => Some(other.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::UInt(u) => write!(f, "{}", u),
            Value::Float(x) => write!(f, "{}", x),
            Value::Time(t) => write!(f, "{}", t.to_rfc3339()),
            Value::Text(s) => f.write_str(s),
            Value::Record(id) => write!(f, "#{}", id),
            Value::Vector(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<u32> for Value {
    fn from(u: u32) -> Self {
        Value::UInt(u as u64)
    }
}

impl From<u64> for Value {
    fn from(u: u64) -> Self {
        Value::UInt(u)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(t: DateTime<Utc>) -> Self {
        Value::Time(t)
    }
}

impl From<RecordId> for Value {
    fn from(id: RecordId) -> Self {
        Value::Record(id)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Vector(items.into_iter().map(Into::into).collect())
    }
}

fn truncate_micros(t: DateTime<Utc>) -> DateTime<Utc> {
    time_from_micros(t.timestamp_micros()).unwrap_or(t)
}

fn time_from_micros(micros: i64) -> Result<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_micros(micros)
        .ok_or_else(|| Error::new(ErrorKind::OutOfRange, format!("{} is not a valid time", micros)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_keys_sort_bytewise() {
        let t = DataType::Int32;
        let a = t.encode_key(&Value::Int(-5)).unwrap();
        let b = t.encode_key(&Value::Int(3)).unwrap();
        let c = t.encode_key(&Value::Int(300)).unwrap();
        assert!(a < b && b < c);
        assert_eq!(t.decode_key(&a).unwrap(), Value::Int(-5));
    }

    #[test]
    fn float_keys_sort_bytewise() {
        let t = DataType::Float;
        let keys: Vec<Vec<u8>> = [-2.5, -0.5, 0.0, 1.25, 10.0]
            .iter()
            .map(|f| t.encode_key(&Value::Float(*f)).unwrap())
            .collect();
        assert!(keys.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(t.decode_key(&keys[0]).unwrap(), Value::Float(-2.5));
    }

    #[test]
    fn cast_rejects_overflow_and_oversize_text() {
        assert_eq!(
            DataType::Int32.cast(Value::Int(i64::MAX)).unwrap_err().kind(),
            ErrorKind::OutOfRange
        );
        let long = "x".repeat(SHORT_TEXT_MAX + 1);
        assert_eq!(
            DataType::ShortText.cast(Value::Text(long)).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
    }

    #[test]
    fn short_text_keys_are_limited_to_4096_bytes() {
        let key = DataType::ShortText.encode_key(&Value::Text("k".repeat(4096))).unwrap();
        assert_eq!(key.len(), 4096);
        let err = DataType::ShortText.encode_key(&Value::Text("k".repeat(4097))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(DataType::Text.cast(Value::Text("t".repeat(TEXT_MAX))).is_ok());
    }

    #[test]
    fn trie_tables_reject_unsortable_keys() {
        assert!(DataType::ShortText.check_key_type(TableKind::PatriciaTrie).is_ok());
        assert_eq!(
            DataType::Float.check_key_type(TableKind::DoubleArrayTrie).unwrap_err().kind(),
            ErrorKind::InvalidKeyType
        );
        assert!(DataType::Float.check_key_type(TableKind::Hash).is_ok());
        assert_eq!(
            DataType::Text.check_key_type(TableKind::Hash).unwrap_err().kind(),
            ErrorKind::InvalidKeyType
        );
    }
}

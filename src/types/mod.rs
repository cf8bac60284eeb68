pub mod hash;
pub mod list;
pub mod set;
pub mod sorted_set;

use crate::resp::format_score;

/// The core value type stored in the keyspace.
///
/// `Null` is a creation sentinel: the keyspace inserts it when a write lock
/// is requested for a key that does not exist yet, and the dispatcher rolls
/// the entry back if the handler never commits a real value. Handlers never
/// observe it.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Str(Vec<u8>),
    Int(i64),
    Float(f64),
    List(list::ListValue),
    Hash(hash::HashValue),
    Set(set::SetValue),
    SortedSet(sorted_set::SortedSet),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Wire-level type name. Numeric scalars are strings on the wire.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "none",
            Value::Str(_) | Value::Int(_) | Value::Float(_) => "string",
            Value::List(_) => "list",
            Value::Hash(_) => "hash",
            Value::Set(_) => "set",
            Value::SortedSet(_) => "zset",
        }
    }

    /// The textual form of a scalar value, or None for container kinds.
    pub fn scalar_bytes(&self) -> Option<Vec<u8>> {
        match self {
            Value::Str(b) => Some(b.clone()),
            Value::Int(n) => Some(n.to_string().into_bytes()),
            Value::Float(f) => Some(format_score(*f).into_bytes()),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&list::ListValue> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_hash(&self) -> Option<&hash::HashValue> {
        match self {
            Value::Hash(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_set(&self) -> Option<&set::SetValue> {
        match self {
            Value::Set(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_sorted_set(&self) -> Option<&sorted_set::SortedSet> {
        match self {
            Value::SortedSet(z) => Some(z),
            _ => None,
        }
    }
}

impl From<Scalar> for Value {
    fn from(s: Scalar) -> Value {
        match s {
            Scalar::Str(b) => Value::Str(b),
            Scalar::Int(n) => Value::Int(n),
            Scalar::Float(f) => Value::Float(f),
        }
    }
}

/// A scalar: what `adapt_token` infers from a raw argument token, and what
/// hash fields hold.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Str(Vec<u8>),
    Int(i64),
    Float(f64),
}

impl Scalar {
    /// Textual form, as written to the wire.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Scalar::Str(b) => b.clone(),
            Scalar::Int(n) => n.to_string().into_bytes(),
            Scalar::Float(f) => format_score(*f).into_bytes(),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Scalar::Int(n) => Some(*n),
            Scalar::Str(b) => std::str::from_utf8(b).ok()?.parse().ok(),
            Scalar::Float(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(n) => Some(*n as f64),
            Scalar::Float(f) => Some(*f),
            Scalar::Str(b) => std::str::from_utf8(b).ok()?.parse().ok(),
        }
    }
}

/// Infer the scalar kind of a raw command token.
///
/// Integer-looking tokens become `Int`, finite float-looking tokens become
/// `Float`, everything else (including `inf`/`nan` spellings, which the
/// command boundary handles itself) stays a string.
pub fn adapt_token(token: &str) -> Scalar {
    if let Ok(n) = token.parse::<i64>() {
        return Scalar::Int(n);
    }
    if let Ok(f) = token.parse::<f64>() {
        if f.is_finite() {
            return Scalar::Float(f);
        }
    }
    Scalar::Str(token.as_bytes().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adapt_token() {
        assert_eq!(adapt_token("42"), Scalar::Int(42));
        assert_eq!(adapt_token("-7"), Scalar::Int(-7));
        assert_eq!(adapt_token("3.25"), Scalar::Float(3.25));
        assert_eq!(adapt_token("hello"), Scalar::Str(b"hello".to_vec()));
        // Non-finite spellings stay strings; the command boundary decides.
        assert_eq!(adapt_token("+inf"), Scalar::Str(b"+inf".to_vec()));
        assert_eq!(adapt_token("nan"), Scalar::Str(b"nan".to_vec()));
    }

    #[test]
    fn test_scalar_round_trip() {
        assert_eq!(Scalar::Int(42).to_bytes(), b"42");
        assert_eq!(Scalar::Float(1.5).to_bytes(), b"1.5");
        assert_eq!(adapt_token("42").as_f64(), Some(42.0));
    }

    #[test]
    fn test_type_names() {
        assert_eq!(Value::Str(vec![]).type_name(), "string");
        assert_eq!(Value::Int(1).type_name(), "string");
        assert_eq!(Value::List(list::ListValue::new()).type_name(), "list");
        assert_eq!(
            Value::SortedSet(sorted_set::SortedSet::new()).type_name(),
            "zset"
        );
    }
}

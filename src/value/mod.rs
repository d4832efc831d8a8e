use num_bigint::BigInt;
use num_rational::BigRational;
use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;
use uuid::Uuid;

pub mod datetime;
pub mod decimal;
pub mod mime;
pub mod network;
pub mod regex;

pub use decimal::Decimal;
pub use datetime::{DateTimeValue, DateValue};
pub use mime::MimeMessage;
pub use network::{IpAddressValue, IpNetworkValue};
pub use regex::RegexValue;

/// A node in a (possibly cyclic) value graph.
///
/// `Rc<RefCell<_>>` gives each node stable pointer identity, which is what
/// the shared-reference table keys on (§3, §4.2): two `Ref`s pointing at the
/// same allocation are the same shared value, independent of what they
/// currently hold.
pub type Ref = Rc<RefCell<Value>>;

pub fn new_ref(value: Value) -> Ref {
    Rc::new(RefCell::new(value))
}

/// The host value model the codec reads from and writes to (§3).
///
/// Integers up to `i64` stay inline; anything wider round-trips through
/// `BigInt` and tags 2/3 on the wire (§4.4 "Integer encoding").
#[derive(Clone)]
#[non_exhaustive]
pub enum Value {
    Int(i64),
    BigInt(BigInt),
    Float(f64),
    Bytes(Vec<u8>),
    Text(String),
    Array(Vec<Ref>),
    /// insertion-ordered key/value pairs; keys may be any value
    Map(Vec<(Ref, Ref)>),
    /// unordered collection, wire tag 258
    Set(Vec<Ref>),
    /// an unrecognised tag with no built-in or hook handler
    Tag(u64, Ref),
    /// major type 7 value in 0..19 ∪ 32..255
    Simple(u8),
    Bool(bool),
    Null,
    Undefined,
    Decimal(Decimal),
    Rational(BigRational),
    DateTime(DateTimeValue),
    Date(DateValue),
    Regex(RegexValue),
    Mime(MimeMessage),
    Uuid(Uuid),
    IpAddress(IpAddressValue),
    IpNetwork(IpNetworkValue),
    /// a host type with no built-in wire representation, routed through the
    /// type-dispatch registry (§4.3) instead of a fixed `Value` arm
    External(Rc<dyn Any>),
}

impl Value {
    pub fn array(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Array(items.into_iter().map(new_ref).collect())
    }

    pub fn map(pairs: impl IntoIterator<Item = (Value, Value)>) -> Self {
        Value::Map(
            pairs
                .into_iter()
                .map(|(k, v)| (new_ref(k), new_ref(v)))
                .collect(),
        )
    }

    pub fn set(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Set(items.into_iter().map(new_ref).collect())
    }

    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn bytes(b: impl Into<Vec<u8>>) -> Self {
        Value::Bytes(b.into())
    }

    pub fn into_ref(self) -> Ref {
        new_ref(self)
    }

    pub fn is_container(&self) -> bool {
        matches!(
            self,
            Value::Array(_) | Value::Map(_) | Value::Set(_) | Value::Tag(..)
        )
    }

    pub fn as_simple(&self) -> Option<u8> {
        if let Value::Simple(v) = self {
            Some(*v)
        } else {
            None
        }
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(n) => f.debug_tuple("Int").field(n).finish(),
            Value::BigInt(n) => f.debug_tuple("BigInt").field(n).finish(),
            Value::Float(n) => f.debug_tuple("Float").field(n).finish(),
            Value::Bytes(b) => f.debug_tuple("Bytes").field(b).finish(),
            Value::Text(s) => f.debug_tuple("Text").field(s).finish(),
            Value::Array(a) => f.debug_tuple("Array").field(a).finish(),
            Value::Map(m) => f.debug_tuple("Map").field(m).finish(),
            Value::Set(s) => f.debug_tuple("Set").field(s).finish(),
            Value::Tag(t, v) => f.debug_tuple("Tag").field(t).field(v).finish(),
            Value::Simple(s) => f.debug_tuple("Simple").field(s).finish(),
            Value::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Value::Null => write!(f, "Null"),
            Value::Undefined => write!(f, "Undefined"),
            Value::Decimal(d) => f.debug_tuple("Decimal").field(d).finish(),
            Value::Rational(r) => f.debug_tuple("Rational").field(r).finish(),
            Value::DateTime(d) => f.debug_tuple("DateTime").field(d).finish(),
            Value::Date(d) => f.debug_tuple("Date").field(d).finish(),
            Value::Regex(r) => f.debug_tuple("Regex").field(r).finish(),
            Value::Mime(m) => f.debug_tuple("Mime").field(m).finish(),
            Value::Uuid(u) => f.debug_tuple("Uuid").field(u).finish(),
            Value::IpAddress(a) => f.debug_tuple("IpAddress").field(a).finish(),
            Value::IpNetwork(n) => f.debug_tuple("IpNetwork").field(n).finish(),
            Value::External(_) => write!(f, "External(..)"),
        }
    }
}

/// Structural equality over the value graph.
///
/// This recurses through `Ref`s by value, so a genuinely cyclic graph will
/// overflow the stack here exactly as it would with a derived `PartialEq` —
/// tests over cyclic values should compare identity with `Rc::ptr_eq`
/// instead of `==`.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        use Value::*;
        match (self, other) {
            (Int(a), Int(b)) => a == b,
            (BigInt(a), BigInt(b)) => a == b,
            (Int(a), BigInt(b)) | (BigInt(b), Int(a)) => &BigInt::from(*a) == b,
            (Float(a), Float(b)) => a.to_bits() == b.to_bits(),
            (Bytes(a), Bytes(b)) => a == b,
            (Text(a), Text(b)) => a == b,
            (Array(a), Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| *x.borrow() == *y.borrow())
            }
            (Map(a), Map(b)) => {
                a.len() == b.len()
                    && a.iter().zip(b).all(|((ka, va), (kb, vb))| {
                        *ka.borrow() == *kb.borrow() && *va.borrow() == *vb.borrow()
                    })
            }
            (Set(a), Set(b)) => sets_equal(a, b),
            (Tag(ta, va), Tag(tb, vb)) => ta == tb && *va.borrow() == *vb.borrow(),
            (Simple(a), Simple(b)) => a == b,
            (Bool(a), Bool(b)) => a == b,
            (Null, Null) | (Undefined, Undefined) => true,
            (Decimal(a), Decimal(b)) => a == b,
            (Rational(a), Rational(b)) => a == b,
            (DateTime(a), DateTime(b)) => a == b,
            (Date(a), Date(b)) => a == b,
            (Regex(a), Regex(b)) => a == b,
            (Mime(a), Mime(b)) => a == b,
            (Uuid(a), Uuid(b)) => a == b,
            (IpAddress(a), IpAddress(b)) => a == b,
            (IpNetwork(a), IpNetwork(b)) => a == b,
            (External(a), External(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// RFC 8949 §8 diagnostic notation, e.g. `{1: "a", 2: [1, 2]}`.
impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::BigInt(n) => write!(f, "{n}"),
            Value::Float(x) if x.is_nan() => write!(f, "NaN"),
            Value::Float(x) if x.is_infinite() => {
                write!(f, "{}Infinity", if *x < 0.0 { "-" } else { "" })
            }
            Value::Float(x) => write!(f, "{x}"),
            Value::Bytes(b) => {
                write!(f, "h'")?;
                for byte in b {
                    write!(f, "{byte:02x}")?;
                }
                write!(f, "'")
            }
            Value::Text(s) => write!(f, "\"{}\"", s.escape_debug()),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item.borrow())?;
                }
                write!(f, "]")
            }
            Value::Map(pairs) => {
                write!(f, "{{")?;
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k.borrow(), v.borrow())?;
                }
                write!(f, "}}")
            }
            Value::Set(items) => {
                write!(f, "258([")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item.borrow())?;
                }
                write!(f, "])")
            }
            Value::Tag(t, child) => write!(f, "{t}({})", child.borrow()),
            Value::Simple(v) => write!(f, "simple({v})"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Null => write!(f, "null"),
            Value::Undefined => write!(f, "undefined"),
            Value::Decimal(d) => write!(f, "{d:?}"),
            Value::Rational(r) => write!(f, "{r}"),
            Value::DateTime(dt) => write!(f, "{}", dt.0.to_rfc3339()),
            Value::Date(d) => write!(f, "{}", d.0),
            Value::Regex(re) => write!(f, "/{}/", re.pattern()),
            Value::Mime(m) => write!(f, "{:?}", m.headers),
            Value::Uuid(u) => write!(f, "{u}"),
            Value::IpAddress(a) => write!(f, "{a:?}"),
            Value::IpNetwork(n) => write!(f, "{}", n.0),
            Value::External(_) => write!(f, "external(..)"),
        }
    }
}

/// Order-independent equality: every element of `a` matches a distinct,
/// not-yet-matched element of `b`.
fn sets_equal(a: &[Ref], b: &[Ref]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut used = vec![false; b.len()];
    'outer: for x in a {
        for (i, y) in b.iter().enumerate() {
            if !used[i] && *x.borrow() == *y.borrow() {
                used[i] = true;
                continue 'outer;
            }
        }
        return false;
    }
    true
}

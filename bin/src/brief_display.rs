use cbor_codec::value::Value;
use cbor_codec::Ref;
use std::fmt::{Display, Formatter};

/// A depth- and length-bounded rendering of a decoded [`Value`], in the same
/// spirit as the teacher's `BriefDisplay` over raw `Cbor` bytes: arrays and
/// maps below `max_depth` collapse to `[…]`/`{…}`, arrays longer than
/// `array_length` are truncated with a trailing `…`, text longer than
/// `text_length` is truncated mid-string, and named map keys in
/// `censored_properties` have their value replaced by `…`.
pub struct BriefDisplay<'a> {
    pub value: &'a Ref,
    pub max_depth: usize,
    pub array_length: usize,
    pub censored_properties: &'a [String],
    pub text_length: usize,
}

impl<'a> Display for BriefDisplay<'a> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        fmt_value(&self.value.borrow(), self, 0, f)
    }
}

fn fmt_value(
    value: &Value,
    opts: &BriefDisplay<'_>,
    depth: usize,
    f: &mut Formatter<'_>,
) -> std::fmt::Result {
    match value {
        Value::Text(s) if s.chars().count() > opts.text_length => {
            let end = s
                .char_indices()
                .nth(opts.text_length)
                .map(|(i, _)| i)
                .unwrap_or(s.len());
            write!(f, "\"{}\"…", s[..end].escape_debug())
        }
        Value::Array(items) => {
            if depth >= opts.max_depth {
                return write!(f, "[…]");
            }
            write!(f, "[")?;
            for (i, item) in items.iter().enumerate() {
                if i == opts.array_length {
                    write!(f, "…")?;
                    break;
                }
                if i > 0 {
                    write!(f, ", ")?;
                }
                fmt_value(&item.borrow(), opts, depth + 1, f)?;
            }
            write!(f, "]")
        }
        Value::Map(pairs) => {
            if depth >= opts.max_depth {
                return write!(f, "{{…}}");
            }
            write!(f, "{{")?;
            for (i, (k, v)) in pairs.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                let key = k.borrow();
                write!(f, "{}: ", key)?;
                if let Value::Text(name) = &*key {
                    if opts.censored_properties.iter().any(|c| c == name) {
                        write!(f, "…")?;
                        continue;
                    }
                }
                fmt_value(&v.borrow(), opts, depth + 1, f)?;
            }
            write!(f, "}}")
        }
        Value::Set(items) => {
            if depth >= opts.max_depth {
                return write!(f, "258([…])");
            }
            write!(f, "258([")?;
            for (i, item) in items.iter().enumerate() {
                if i == opts.array_length {
                    write!(f, "…")?;
                    break;
                }
                if i > 0 {
                    write!(f, ", ")?;
                }
                fmt_value(&item.borrow(), opts, depth + 1, f)?;
            }
            write!(f, "])")
        }
        Value::Tag(t, child) => {
            write!(f, "{t}(")?;
            fmt_value(&child.borrow(), opts, depth, f)?;
            write!(f, ")")
        }
        other => write!(f, "{other}"),
    }
}

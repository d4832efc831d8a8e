//! The decoder (§4.5): reads CBOR bytes, constructs values, resolves
//! shared references (including forward references for cycles), and
//! applies tag semantics.

use std::io::Read;
use std::str::Utf8Error;

use chrono::{DateTime, TimeZone};
use num_bigint::{BigInt, Sign};
use num_rational::BigRational;
use uuid::Uuid;

use crate::constants::*;
use crate::error::{DecodeError, DecodeErrorKind};
use crate::shared::DecodeSharedTable;
use crate::value::{
    new_ref, DateTimeValue, Decimal, IpAddressValue, IpNetworkValue, MimeMessage, Ref,
    RegexValue, Value,
};

/// UTF-8 decoding policy for major-type-3 items (§6 decoder options).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrErrorsPolicy {
    #[default]
    Strict,
    Replace,
    Ignore,
}

pub type TagHook = Box<dyn Fn(&mut Decoder, u64, Ref) -> Result<Ref, DecodeError>>;
pub type ObjectHook = Box<dyn Fn(&mut Decoder, Vec<(Ref, Ref)>) -> Result<Ref, DecodeError>>;

#[derive(Default)]
pub struct DecoderConfig {
    pub str_errors: StrErrorsPolicy,
    pub tag_hook: Option<TagHook>,
    pub object_hook: Option<ObjectHook>,
}

impl std::fmt::Debug for DecoderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoderConfig")
            .field("str_errors", &self.str_errors)
            .field("tag_hook", &self.tag_hook.as_ref().map(|_| "..."))
            .field("object_hook", &self.object_hook.as_ref().map(|_| "..."))
            .finish()
    }
}

/// Reads a byte stream one item at a time, constructing [`Value`]s (§4.5).
///
/// Not safe to share across threads (§5): a `Decoder` owns its stream, its
/// single-byte lookahead, and its shared-reference table.
pub struct Decoder {
    stream: Box<dyn Read>,
    pos: usize,
    item_start: usize,
    pending: Option<u8>,
    shared: DecodeSharedTable,
    config: DecoderConfig,
}

fn io_err(e: std::io::Error) -> DecodeError {
    DecodeError::new(0, DecodeErrorKind::Io(e.to_string()))
}

impl Decoder {
    pub fn new(stream: impl Read + 'static, config: DecoderConfig) -> Self {
        Self {
            stream: Box::new(stream),
            pos: 0,
            item_start: 0,
            pending: None,
            shared: DecodeSharedTable::new(),
            config,
        }
    }

    /// Swap the stream in-place for a one-shot buffer decode (§4.5).
    pub fn decode_from_bytes(&mut self, bytes: &[u8]) -> Result<Ref, DecodeError> {
        let saved_stream = std::mem::replace(&mut self.stream, Box::new(std::io::Cursor::new(bytes.to_vec())));
        let saved_pending = self.pending.take();
        let saved_pos = self.pos;
        self.pos = 0;
        let result = self.decode();
        self.stream = saved_stream;
        self.pending = saved_pending;
        self.pos = saved_pos;
        result
    }

    fn err(&self, kind: DecodeErrorKind) -> DecodeError {
        DecodeError::new(self.item_start, kind)
    }

    /// Exact read of `n` bytes; a short read is `PrematureEoS` (§4.5).
    pub fn read(&mut self, n: usize) -> Result<Vec<u8>, DecodeError> {
        let mut buf = vec![0u8; n];
        let mut filled = 0;
        if n > 0 {
            if let Some(b) = self.pending.take() {
                buf[0] = b;
                filled = 1;
            }
        }
        while filled < n {
            match self.stream.read(&mut buf[filled..]) {
                Ok(0) => {
                    return Err(self.err(DecodeErrorKind::PrematureEoS {
                        expected: n,
                        got: filled,
                    }))
                }
                Ok(k) => filled += k,
                Err(e) => return Err(io_err(e)),
            }
        }
        self.pos += n;
        Ok(buf)
    }

    fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.read(1)?[0])
    }

    /// Non-destructive 1-byte lookahead, needed for break detection and for
    /// peeking tag-28's wrapped item's major type.
    fn peek_u8(&mut self) -> Result<u8, DecodeError> {
        if let Some(b) = self.pending {
            return Ok(b);
        }
        let mut byte = [0u8; 1];
        match self.stream.read(&mut byte) {
            Ok(0) => Err(self.err(DecodeErrorKind::PrematureEoS {
                expected: 1,
                got: 0,
            })),
            Ok(_) => {
                self.pending = Some(byte[0]);
                Ok(byte[0])
            }
            Err(e) => Err(io_err(e)),
        }
    }

    /// Read the argument following an initial byte's `info` nibble
    /// (§4.5's `info ∈ {24,25,26,27}` 1/2/4/8-byte cases, plus the
    /// reserved/indefinite cases callers must check for separately).
    fn read_length_argument(&mut self, info: u8) -> Result<u64, DecodeError> {
        match info {
            0..=23 => Ok(info as u64),
            INFO_1 => Ok(self.read_u8()? as u64),
            INFO_2 => {
                let b = self.read(2)?;
                Ok(u16::from_be_bytes([b[0], b[1]]) as u64)
            }
            INFO_4 => {
                let b = self.read(4)?;
                Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]) as u64)
            }
            INFO_8 => {
                let b = self.read(8)?;
                Ok(u64::from_be_bytes(b.try_into().unwrap()))
            }
            _ => unreachable!("caller filters info before calling read_length_argument"),
        }
    }

    /// Decode one top-level item from the stream.
    pub fn decode(&mut self) -> Result<Ref, DecodeError> {
        self.item_start = self.pos;
        self.decode_item()
    }

    fn decode_item(&mut self) -> Result<Ref, DecodeError> {
        self.decode_item_inner(false)
    }

    /// Decode one item, but if it turns out to be a tag-28 wrapper around a
    /// container, do not pre-populate a forward-referenceable shared slot
    /// for it (§4.5's tag-258 set handling, via `decode_set`): the item
    /// being decoded is about to become an immutable collection, which per
    /// the reference implementation cannot be the target of a self-reference
    /// from within its own contents.
    fn decode_item_no_forward_ref(&mut self) -> Result<Ref, DecodeError> {
        self.decode_item_inner(true)
    }

    fn decode_item_inner(&mut self, suppress_forward_ref: bool) -> Result<Ref, DecodeError> {
        let start = self.pos;
        let initial = self.read_u8()?;
        let major = initial >> 5;
        let info = initial & 0x1f;
        self.decode_body(start, major, info, suppress_forward_ref)
    }

    fn decode_body(
        &mut self,
        item_start: usize,
        major: u8,
        info: u8,
        suppress_forward_ref: bool,
    ) -> Result<Ref, DecodeError> {
        match major {
            MAJOR_POS => {
                let arg = self.read_length_argument_checked(item_start, info)?;
                Ok(new_ref(Self::positive_int(arg)))
            }
            MAJOR_NEG => {
                let arg = self.read_length_argument_checked(item_start, info)?;
                Ok(new_ref(Self::negative_int(arg)))
            }
            MAJOR_BYTES => self.decode_bytes(item_start, info),
            MAJOR_STR => self.decode_text(item_start, info),
            MAJOR_ARRAY => self.decode_array(item_start, info),
            MAJOR_MAP => self.decode_map(item_start, info),
            MAJOR_TAG => self.decode_tag(item_start, info, suppress_forward_ref),
            MAJOR_LIT => self.decode_literal(item_start, info),
            _ => unreachable!("major type is 3 bits, all 8 values handled"),
        }
    }

    fn read_length_argument_checked(&mut self, item_start: usize, info: u8) -> Result<u64, DecodeError> {
        if info == INDEFINITE_SIZE || (28..=30).contains(&info) {
            return Err(DecodeError::new(item_start, DecodeErrorKind::UnknownSubtype(info)));
        }
        self.read_length_argument(info)
    }

    fn positive_int(arg: u64) -> Value {
        if arg <= i64::MAX as u64 {
            Value::Int(arg as i64)
        } else {
            Value::BigInt(BigInt::from(arg))
        }
    }

    fn negative_int(arg: u64) -> Value {
        match arg.checked_add(1) {
            Some(n) if n <= i64::MAX as u64 => Value::Int(-(n as i64)),
            _ => Value::BigInt(-BigInt::from(arg) - BigInt::from(1)),
        }
    }

    fn decode_bytes(&mut self, item_start: usize, info: u8) -> Result<Ref, DecodeError> {
        if info == INDEFINITE_SIZE {
            let chunks = self.decode_indefinite_chunks(MAJOR_BYTES)?;
            let mut out = Vec::new();
            for c in chunks {
                out.extend(c);
            }
            return Ok(new_ref(Value::Bytes(out)));
        }
        let len = self.read_length_argument_checked(item_start, info)?;
        let bytes = self.read(len as usize)?;
        Ok(new_ref(Value::Bytes(bytes)))
    }

    fn decode_text(&mut self, item_start: usize, info: u8) -> Result<Ref, DecodeError> {
        if info == INDEFINITE_SIZE {
            let chunks = self.decode_indefinite_chunks(MAJOR_STR)?;
            let mut out = Vec::new();
            for c in chunks {
                out.extend(c);
            }
            let text = self.bytes_to_string(item_start, out)?;
            return Ok(new_ref(Value::Text(text)));
        }
        let len = self.read_length_argument_checked(item_start, info)?;
        let bytes = self.read(len as usize)?;
        let text = self.bytes_to_string(item_start, bytes)?;
        Ok(new_ref(Value::Text(text)))
    }

    fn bytes_to_string(&self, item_start: usize, bytes: Vec<u8>) -> Result<String, DecodeError> {
        match String::from_utf8(bytes) {
            Ok(s) => Ok(s),
            Err(e) => match self.config.str_errors {
                StrErrorsPolicy::Strict => {
                    let utf8_err: Utf8Error = e.utf8_error();
                    Err(DecodeError::new(item_start, DecodeErrorKind::InvalidUtf8(utf8_err)))
                }
                StrErrorsPolicy::Replace => Ok(String::from_utf8_lossy(e.as_bytes()).into_owned()),
                StrErrorsPolicy::Ignore => {
                    let bytes = e.into_bytes();
                    Ok(bytes.iter().filter(|&&b| b < 0x80).map(|&b| b as char).collect())
                }
            },
        }
    }

    /// Read a sequence of definite-length chunks of major type `expected`
    /// until `break`; a chunk of a different major type is
    /// `HeterogeneousStreamChunks` (§4.5).
    fn decode_indefinite_chunks(&mut self, expected: u8) -> Result<Vec<Vec<u8>>, DecodeError> {
        let mut chunks = Vec::new();
        loop {
            if self.peek_u8()? == STOP_BYTE {
                self.read_u8()?;
                break;
            }
            let chunk_start = self.pos;
            let initial = self.read_u8()?;
            let major = initial >> 5;
            let info = initial & 0x1f;
            if major != expected || info == INDEFINITE_SIZE {
                return Err(DecodeError::new(chunk_start, DecodeErrorKind::HeterogeneousStreamChunks));
            }
            let len = self.read_length_argument_checked(chunk_start, info)?;
            chunks.push(self.read(len as usize)?);
        }
        Ok(chunks)
    }

    fn peek_break(&mut self) -> Result<bool, DecodeError> {
        Ok(self.peek_u8()? == STOP_BYTE)
    }

    fn decode_array(&mut self, item_start: usize, info: u8) -> Result<Ref, DecodeError> {
        if info == INDEFINITE_SIZE {
            let mut items = Vec::new();
            while !self.peek_break()? {
                items.push(self.decode_item()?);
            }
            self.read_u8()?; // consume break
            return Ok(new_ref(Value::Array(items)));
        }
        let len = self.read_length_argument_checked(item_start, info)?;
        let mut items = Vec::with_capacity(len as usize);
        for _ in 0..len {
            items.push(self.decode_item()?);
        }
        Ok(new_ref(Value::Array(items)))
    }

    fn decode_map(&mut self, item_start: usize, info: u8) -> Result<Ref, DecodeError> {
        let pairs = if info == INDEFINITE_SIZE {
            let mut pairs = Vec::new();
            while !self.peek_break()? {
                let k = self.decode_item()?;
                let v = self.decode_item()?;
                pairs.push((k, v));
            }
            self.read_u8()?;
            pairs
        } else {
            let len = self.read_length_argument_checked(item_start, info)?;
            let mut pairs = Vec::with_capacity(len as usize);
            for _ in 0..len {
                let k = self.decode_item()?;
                let v = self.decode_item()?;
                pairs.push((k, v));
            }
            pairs
        };
        if let Some(hook) = self.config.object_hook.take() {
            let result = hook(self, pairs);
            self.config.object_hook = Some(hook);
            return result;
        }
        Ok(new_ref(Value::Map(pairs)))
    }

    fn decode_literal(&mut self, item_start: usize, info: u8) -> Result<Ref, DecodeError> {
        match info {
            0..=19 => Ok(new_ref(Value::Simple(info))),
            LIT_FALSE => Ok(new_ref(Value::Bool(false))),
            LIT_TRUE => Ok(new_ref(Value::Bool(true))),
            LIT_NULL => Ok(new_ref(Value::Null)),
            LIT_UNDEFINED => Ok(new_ref(Value::Undefined)),
            LIT_SIMPLE_1 => {
                let v = self.read_u8()?;
                if v < 32 {
                    return Err(DecodeError::new(item_start, DecodeErrorKind::UnknownSubtype(v)));
                }
                Ok(new_ref(Value::Simple(v)))
            }
            LIT_FLOAT16 => {
                let b = self.read(2)?;
                let bits = u16::from_be_bytes([b[0], b[1]]);
                Ok(new_ref(Value::Float(crate::half_float::unpack_half(bits))))
            }
            LIT_FLOAT32 => {
                let b = self.read(4)?;
                let bits = u32::from_be_bytes([b[0], b[1], b[2], b[3]]);
                Ok(new_ref(Value::Float(f32::from_bits(bits) as f64)))
            }
            LIT_FLOAT64 => {
                let b = self.read(8)?;
                let bits = u64::from_be_bytes(b.try_into().unwrap());
                Ok(new_ref(Value::Float(f64::from_bits(bits))))
            }
            INDEFINITE_SIZE => Err(DecodeError::new(item_start, DecodeErrorKind::UnexpectedBreak)),
            _ => Err(DecodeError::new(item_start, DecodeErrorKind::UnknownSubtype(info))),
        }
    }

    fn decode_tag(
        &mut self,
        item_start: usize,
        info: u8,
        suppress_forward_ref: bool,
    ) -> Result<Ref, DecodeError> {
        let tag = self.read_length_argument_checked(item_start, info)?;
        match tag {
            TAG_DATETIME_TEXT => self.decode_datetime_text(item_start),
            TAG_DATETIME_EPOCH => self.decode_datetime_epoch(item_start),
            TAG_BIGNUM_POS => self.decode_bignum(item_start, false),
            TAG_BIGNUM_NEG => self.decode_bignum(item_start, true),
            TAG_DECIMAL => self.decode_decimal(item_start),
            TAG_BIGFLOAT => self.decode_bigfloat(item_start),
            TAG_SHAREABLE => self.decode_shareable(item_start, suppress_forward_ref),
            TAG_SHARED_REF => self.decode_shared_ref(item_start),
            TAG_RATIONAL => self.decode_rational(item_start),
            TAG_REGEX => self.decode_regex(item_start),
            TAG_MIME => self.decode_mime(item_start),
            TAG_UUID => self.decode_uuid(item_start),
            TAG_SELF_DESCRIBE => self.decode_item_inner(suppress_forward_ref),
            TAG_SET => self.decode_set(item_start),
            TAG_IP_ADDRESS => self.decode_ipaddress(item_start),
            TAG_IP_NETWORK => self.decode_ipnetwork(item_start),
            other => self.decode_unknown_tag(item_start, other),
        }
    }

    fn tag_argument_error(&self, item_start: usize, tag: u64, reason: impl Into<String>) -> DecodeError {
        DecodeError::new(
            item_start,
            DecodeErrorKind::InvalidTagArgument {
                tag,
                reason: reason.into(),
            },
        )
    }

    fn decode_datetime_text(&mut self, item_start: usize) -> Result<Ref, DecodeError> {
        let child = self.decode_item()?;
        let text = match &*child.borrow() {
            Value::Text(s) => s.clone(),
            _ => return Err(self.tag_argument_error(item_start, TAG_DATETIME_TEXT, "expected a text string")),
        };
        let dt = DateTime::parse_from_rfc3339(&text)
            .map_err(|_| DecodeError::new(item_start, DecodeErrorKind::InvalidDatetimeSyntax(text.clone())))?;
        Ok(new_ref(Value::DateTime(DateTimeValue::new(dt))))
    }

    fn decode_datetime_epoch(&mut self, item_start: usize) -> Result<Ref, DecodeError> {
        let child = self.decode_item()?;
        let borrowed = child.borrow();
        let dt = match &*borrowed {
            Value::Int(n) => chrono::Utc
                .timestamp_opt(*n, 0)
                .single()
                .ok_or_else(|| self.tag_argument_error(item_start, TAG_DATETIME_EPOCH, "out of range"))?
                .fixed_offset(),
            Value::Float(x) => {
                let secs = x.trunc() as i64;
                let nanos = ((x - x.trunc()) * 1_000_000_000.0).round() as u32;
                chrono::Utc
                    .timestamp_opt(secs, nanos)
                    .single()
                    .ok_or_else(|| self.tag_argument_error(item_start, TAG_DATETIME_EPOCH, "out of range"))?
                    .fixed_offset()
            }
            _ => return Err(self.tag_argument_error(item_start, TAG_DATETIME_EPOCH, "expected a number")),
        };
        drop(borrowed);
        Ok(new_ref(Value::DateTime(DateTimeValue::new(dt))))
    }

    fn decode_bignum(&mut self, item_start: usize, negative: bool) -> Result<Ref, DecodeError> {
        let child = self.decode_item()?;
        let bytes = match &*child.borrow() {
            Value::Bytes(b) => b.clone(),
            _ => return Err(DecodeError::new(item_start, DecodeErrorKind::InvalidBigInt)),
        };
        let magnitude = BigInt::from_bytes_be(Sign::Plus, &bytes);
        let n = if negative {
            -magnitude - BigInt::from(1)
        } else {
            magnitude
        };
        Ok(new_ref(Value::BigInt(n)))
    }

    fn decode_decimal(&mut self, item_start: usize) -> Result<Ref, DecodeError> {
        let child = self.decode_item()?;
        let borrowed = child.borrow();
        let items = match &*borrowed {
            Value::Array(items) if items.len() == 2 => items.clone(),
            _ => return Err(self.tag_argument_error(item_start, TAG_DECIMAL, "expected a 2-element array")),
        };
        drop(borrowed);
        let exponent = match &*items[0].borrow() {
            Value::Int(n) => *n,
            _ => return Err(self.tag_argument_error(item_start, TAG_DECIMAL, "exponent must be an integer")),
        };
        let mantissa = match &*items[1].borrow() {
            Value::Int(n) => BigInt::from(*n),
            Value::BigInt(n) => n.clone(),
            _ => return Err(self.tag_argument_error(item_start, TAG_DECIMAL, "mantissa must be an integer")),
        };
        Ok(new_ref(Value::Decimal(Decimal::Finite { exponent, mantissa })))
    }

    /// Tag 5 (bigfloat): `mantissa · 2^exponent`, base 2. `Decimal::Finite`
    /// is always a base-10 decimal fraction (`mantissa · 10^exponent`, as
    /// `encode_decimal` and `Display` read it), so the base-2 payload is
    /// converted exactly rather than reusing the tag-4 exponent/mantissa
    /// as-is: for `exponent >= 0` the mantissa absorbs `2^exponent` directly
    /// (base-10 exponent 0); for `exponent < 0`, `2^-n = 5^n / 10^n`, so the
    /// mantissa absorbs `5^n` and the base-10 exponent stays `-n` (mantissa
    /// 3, exponent -1 → mantissa 15, exponent -1 → 1.5, matching
    /// `examples/original_source/tests/test_decoder.py`'s `test_bigfloat`).
    fn decode_bigfloat(&mut self, item_start: usize) -> Result<Ref, DecodeError> {
        let child = self.decode_item()?;
        let borrowed = child.borrow();
        let items = match &*borrowed {
            Value::Array(items) if items.len() == 2 => items.clone(),
            _ => return Err(self.tag_argument_error(item_start, TAG_BIGFLOAT, "expected a 2-element array")),
        };
        drop(borrowed);
        let exponent = match &*items[0].borrow() {
            Value::Int(n) => *n,
            _ => return Err(self.tag_argument_error(item_start, TAG_BIGFLOAT, "exponent must be an integer")),
        };
        let mantissa = match &*items[1].borrow() {
            Value::Int(n) => BigInt::from(*n),
            Value::BigInt(n) => n.clone(),
            _ => return Err(self.tag_argument_error(item_start, TAG_BIGFLOAT, "mantissa must be an integer")),
        };
        let (decimal_exponent, decimal_mantissa) = if exponent >= 0 {
            (0i64, mantissa * Self::small_pow(2, exponent as u32))
        } else {
            let n = (-exponent) as u32;
            (exponent, mantissa * Self::small_pow(5, n))
        };
        Ok(new_ref(Value::Decimal(Decimal::Finite {
            exponent: decimal_exponent,
            mantissa: decimal_mantissa,
        })))
    }

    fn small_pow(base: i64, exponent: u32) -> BigInt {
        let base = BigInt::from(base);
        let mut result = BigInt::from(1);
        for _ in 0..exponent {
            result = result * &base;
        }
        result
    }

    /// Reserve a tag-28 slot before decoding the child; containers
    /// pre-populate the slot so their own contents can forward-reference it
    /// (§3 "Shared reference", §4.5) — unless `suppress_forward_ref` is set,
    /// in which case the wrapped value is decoded as an immutable item that
    /// cannot be the target of a self-reference from within its own contents
    /// (used by `decode_set`: §8's "set of recursive tuple" scenario must
    /// fail with `UninitialisedSharedRef` rather than succeed as a cycle).
    fn decode_shareable(&mut self, _item_start: usize, suppress_forward_ref: bool) -> Result<Ref, DecodeError> {
        let next = self.peek_u8()?;
        let major = next >> 5;
        let is_container = !suppress_forward_ref && matches!(major, MAJOR_ARRAY | MAJOR_MAP | MAJOR_TAG);
        let placeholder = if is_container {
            Some(new_ref(Value::Null))
        } else {
            None
        };
        let idx = match &placeholder {
            Some(slot) => self.set_shareable(slot.clone()),
            None => self.shared.reserve(None),
        };
        let real = self.decode_item()?;
        if let Some(slot) = placeholder {
            *slot.borrow_mut() = real.borrow().clone();
            self.finish_shareable(idx, slot.clone());
            Ok(slot)
        } else {
            self.finish_shareable(idx, real.clone());
            Ok(real)
        }
    }

    /// Register a partially-built value in the next shared slot (§4.2's
    /// decoder mirror of `encode_shared`, listed among §4.5's public
    /// operations). A caller — the built-in tag-28 handler above, or a
    /// `tag_hook` reconstructing a cyclic user-level type from a custom tag
    /// wrapped in tag 28 — constructs an empty container first, registers it
    /// here, then decodes the container's contents: a tag-29 reference to
    /// this same tag-28 definition, encountered anywhere in those contents,
    /// resolves to the placeholder `Ref` (the eventual real value, since
    /// both are the same `Rc` allocation) rather than failing as
    /// uninitialised.
    pub fn set_shareable(&mut self, placeholder: Ref) -> u64 {
        self.shared.reserve(Some(placeholder))
    }

    /// Finalise a slot reserved with [`set_shareable`](Self::set_shareable)
    /// or left empty for a non-container first occurrence.
    pub fn finish_shareable(&mut self, idx: u64, value: Ref) {
        self.shared.finish(idx, value)
    }

    fn decode_shared_ref(&mut self, item_start: usize) -> Result<Ref, DecodeError> {
        let idx_item = self.decode_item()?;
        let idx = match &*idx_item.borrow() {
            Value::Int(n) if *n >= 0 => *n as u64,
            _ => return Err(self.tag_argument_error(item_start, TAG_SHARED_REF, "expected a non-negative integer index")),
        };
        match self.shared.resolve(idx) {
            None => Err(DecodeError::new(item_start, DecodeErrorKind::BadSharedRef(idx))),
            Some(None) => Err(DecodeError::new(item_start, DecodeErrorKind::UninitialisedSharedRef(idx))),
            Some(Some(value)) => Ok(value),
        }
    }

    fn decode_rational(&mut self, item_start: usize) -> Result<Ref, DecodeError> {
        let child = self.decode_item()?;
        let borrowed = child.borrow();
        let items = match &*borrowed {
            Value::Array(items) if items.len() == 2 => items.clone(),
            _ => return Err(self.tag_argument_error(item_start, TAG_RATIONAL, "expected a 2-element array")),
        };
        drop(borrowed);
        let as_bigint = |r: &Ref| match &*r.borrow() {
            Value::Int(n) => Some(BigInt::from(*n)),
            Value::BigInt(n) => Some(n.clone()),
            _ => None,
        };
        let numer = as_bigint(&items[0])
            .ok_or_else(|| self.tag_argument_error(item_start, TAG_RATIONAL, "numerator must be an integer"))?;
        let denom = as_bigint(&items[1])
            .ok_or_else(|| self.tag_argument_error(item_start, TAG_RATIONAL, "denominator must be an integer"))?;
        Ok(new_ref(Value::Rational(BigRational::new(numer, denom))))
    }

    fn decode_regex(&mut self, item_start: usize) -> Result<Ref, DecodeError> {
        let child = self.decode_item()?;
        let pattern = match &*child.borrow() {
            Value::Text(s) => s.clone(),
            _ => return Err(self.tag_argument_error(item_start, TAG_REGEX, "expected a text string")),
        };
        Ok(new_ref(Value::Regex(RegexValue::new(pattern))))
    }

    fn decode_mime(&mut self, item_start: usize) -> Result<Ref, DecodeError> {
        let child = self.decode_item()?;
        let text = match &*child.borrow() {
            Value::Text(s) => s.clone(),
            _ => return Err(self.tag_argument_error(item_start, TAG_MIME, "expected a text string")),
        };
        Ok(new_ref(Value::Mime(MimeMessage::from_text(&text))))
    }

    fn decode_uuid(&mut self, item_start: usize) -> Result<Ref, DecodeError> {
        let child = self.decode_item()?;
        let bytes = match &*child.borrow() {
            Value::Bytes(b) if b.len() == 16 => b.clone(),
            _ => return Err(self.tag_argument_error(item_start, TAG_UUID, "expected 16 raw bytes")),
        };
        let arr: [u8; 16] = bytes.try_into().expect("length checked above");
        Ok(new_ref(Value::Uuid(Uuid::from_bytes(arr))))
    }

    fn decode_set(&mut self, item_start: usize) -> Result<Ref, DecodeError> {
        let child = self.decode_item_no_forward_ref()?;
        let items = match &*child.borrow() {
            Value::Array(items) => items.clone(),
            _ => return Err(self.tag_argument_error(item_start, TAG_SET, "expected an array")),
        };
        Ok(new_ref(Value::Set(items)))
    }

    fn decode_ipaddress(&mut self, item_start: usize) -> Result<Ref, DecodeError> {
        let child = self.decode_item()?;
        let bytes = match &*child.borrow() {
            Value::Bytes(b) => b.clone(),
            _ => return Err(self.tag_argument_error(item_start, TAG_IP_ADDRESS, "expected a byte string")),
        };
        let value = match bytes.len() {
            4 => {
                let arr: [u8; 4] = bytes.try_into().unwrap();
                IpAddressValue::Addr(std::net::IpAddr::V4(std::net::Ipv4Addr::from(arr)))
            }
            16 => {
                let arr: [u8; 16] = bytes.try_into().unwrap();
                IpAddressValue::Addr(std::net::IpAddr::V6(std::net::Ipv6Addr::from(arr)))
            }
            6 => {
                let arr: [u8; 6] = bytes.try_into().unwrap();
                IpAddressValue::Mac(arr)
            }
            n => return Err(self.tag_argument_error(item_start, TAG_IP_ADDRESS, format!("unexpected length {n}"))),
        };
        Ok(new_ref(Value::IpAddress(value)))
    }

    fn decode_ipnetwork(&mut self, item_start: usize) -> Result<Ref, DecodeError> {
        let child = self.decode_item()?;
        let borrowed = child.borrow();
        let pairs = match &*borrowed {
            Value::Map(pairs) if pairs.len() == 1 => pairs.clone(),
            _ => return Err(self.tag_argument_error(item_start, TAG_IP_NETWORK, "expected a single-entry map")),
        };
        drop(borrowed);
        let (addr_ref, prefix_ref) = &pairs[0];
        let addr_bytes = match &*addr_ref.borrow() {
            Value::Bytes(b) => b.clone(),
            _ => return Err(self.tag_argument_error(item_start, TAG_IP_NETWORK, "address key must be bytes")),
        };
        let prefix = match &*prefix_ref.borrow() {
            Value::Int(n) => *n as u8,
            _ => return Err(self.tag_argument_error(item_start, TAG_IP_NETWORK, "prefix must be an integer")),
        };
        let ip_addr = match addr_bytes.len() {
            4 => {
                let arr: [u8; 4] = addr_bytes.try_into().unwrap();
                std::net::IpAddr::V4(std::net::Ipv4Addr::from(arr))
            }
            16 => {
                let arr: [u8; 16] = addr_bytes.try_into().unwrap();
                std::net::IpAddr::V6(std::net::Ipv6Addr::from(arr))
            }
            n => return Err(self.tag_argument_error(item_start, TAG_IP_NETWORK, format!("unexpected address length {n}"))),
        };
        let network = ipnetwork::IpNetwork::new(ip_addr, prefix)
            .map_err(|e| self.tag_argument_error(item_start, TAG_IP_NETWORK, e.to_string()))?;
        Ok(new_ref(Value::IpNetwork(IpNetworkValue(network))))
    }

    fn decode_unknown_tag(&mut self, item_start: usize, tag: u64) -> Result<Ref, DecodeError> {
        let child = self.decode_item()?;
        if let Some(hook) = self.config.tag_hook.take() {
            let result = hook(self, tag, child);
            self.config.tag_hook = Some(hook);
            return result;
        }
        let _ = item_start;
        Ok(new_ref(Value::Tag(tag, child)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;
    use std::io::Cursor;

    fn decode(bytes: &[u8]) -> Result<Ref, DecodeError> {
        let mut dec = Decoder::new(Cursor::new(bytes.to_vec()), DecoderConfig::default());
        dec.decode()
    }

    #[test]
    fn large_positive_integer() {
        let r = decode(&hex!("1b000000e8d4a51000")).unwrap();
        assert_eq!(*r.borrow(), Value::Int(1_000_000_000_000));
    }

    #[test]
    fn large_negative_bigint() {
        let r = decode(&hex!("c349010000000000000000")).unwrap();
        let expected = -(BigInt::from(18_446_744_073_709_551_617_u128));
        assert_eq!(*r.borrow(), Value::BigInt(expected));
    }

    #[test]
    fn nested_arrays() {
        let r = decode(&hex!("8301820203820405")).unwrap();
        let expected = Value::array([
            Value::Int(1),
            Value::array([Value::Int(2), Value::Int(3)]),
            Value::array([Value::Int(4), Value::Int(5)]),
        ]);
        assert_eq!(*r.borrow(), expected);
    }

    #[test]
    fn simple_map() {
        let r = decode(&hex!("a201020304")).unwrap();
        let expected = Value::map([(Value::Int(1), Value::Int(2)), (Value::Int(3), Value::Int(4))]);
        assert_eq!(*r.borrow(), expected);
    }

    #[test]
    fn rational_value() {
        let r = decode(&hex!("d81e820205")).unwrap();
        assert_eq!(*r.borrow(), Value::Rational(BigRational::new(2.into(), 5.into())));
    }

    #[test]
    fn bigfloat_converts_base_2_exponent_to_base_10() {
        // tag 5 [exponent: -1, mantissa: 3] = 3 * 2^-1 = 1.5
        let r = decode(&hex!("c5822003")).unwrap();
        assert_eq!(*r.borrow(), Value::Decimal(Decimal::new(-1, 15)));
    }

    #[test]
    fn datetime_epoch_integer() {
        let r = decode(&hex!("c11a514b67b0")).unwrap();
        match &*r.borrow() {
            Value::DateTime(dt) => {
                assert_eq!(dt.0.timestamp(), 1_363_896_240);
            }
            other => panic!("expected DateTime, got {other:?}"),
        }
    }

    #[test]
    fn self_referential_array_forms_a_cycle() {
        let r = decode(&hex!("d81c81d81d00")).unwrap();
        match &*r.borrow() {
            Value::Array(items) => {
                assert_eq!(items.len(), 1);
                assert!(std::rc::Rc::ptr_eq(&items[0], &r));
            }
            other => panic!("expected Array, got {other:?}"),
        }
    }

    #[test]
    fn self_referential_map_forms_a_cycle() {
        let r = decode(&hex!("d81ca100d81d00")).unwrap();
        match &*r.borrow() {
            Value::Map(pairs) => {
                assert_eq!(pairs.len(), 1);
                assert!(std::rc::Rc::ptr_eq(&pairs[0].1, &r));
            }
            other => panic!("expected Map, got {other:?}"),
        }
    }

    #[test]
    fn unknown_subtype_is_rejected() {
        let err = decode(&hex!("1c")).unwrap_err();
        assert_eq!(err.kind(), &DecodeErrorKind::UnknownSubtype(28));
    }

    #[test]
    fn premature_end_of_stream() {
        let err = decode(&hex!("437879")).unwrap_err();
        assert_eq!(
            err.kind(),
            &DecodeErrorKind::PrematureEoS { expected: 3, got: 2 }
        );
    }

    #[test]
    fn bad_shared_ref() {
        let err = decode(&hex!("d81d05")).unwrap_err();
        assert_eq!(err.kind(), &DecodeErrorKind::BadSharedRef(5));
    }

    #[test]
    fn uninitialised_shared_ref_inside_a_set() {
        let err = decode(&hex!("d90102d81c81d81d00")).unwrap_err();
        assert_eq!(err.kind(), &DecodeErrorKind::UninitialisedSharedRef(0));
    }

    #[test]
    fn indefinite_length_text_concatenates_chunks() {
        // (_ "ab", "cd")
        let bytes = hex!("7f626162626364ff");
        let r = decode(&bytes).unwrap();
        assert_eq!(*r.borrow(), Value::Text("abcd".to_string()));
    }

    #[test]
    fn indefinite_length_array() {
        // [_ 1, 2]
        let bytes = hex!("9f0102ff");
        let r = decode(&bytes).unwrap();
        assert_eq!(*r.borrow(), Value::array([Value::Int(1), Value::Int(2)]));
    }

    #[test]
    fn heterogeneous_indefinite_chunks_rejected() {
        // (_ h'01', "ab")
        let bytes = hex!("7f416163abff");
        let err = decode(&bytes);
        assert!(err.is_err());
    }

    #[test]
    fn self_describe_tag_is_stripped() {
        let r = decode(&hex!("d9d9f701")).unwrap();
        assert_eq!(*r.borrow(), Value::Int(1));
    }

    #[test]
    fn unknown_tag_without_hook_becomes_value_tag() {
        let r = decode(&hex!("d86401")).unwrap();
        assert_eq!(*r.borrow(), Value::Tag(100, new_ref(Value::Int(1))));
    }
}

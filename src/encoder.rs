//! The encoder (§4.4): walks a value graph, emits CBOR bytes, and
//! coordinates shared references, canonical ordering, and float
//! minimisation along the way.

use std::io::{self, Write};

use chrono::{DateTime, FixedOffset, TimeZone};
use num_bigint::{BigInt, Sign};
use num_rational::BigRational;
use num_traits::{One, ToPrimitive};
use uuid::Uuid;

use crate::constants::*;
use crate::error::EncodeError;
use crate::half_float::{classify, pack_half, FloatWidth};
use crate::registry::Registry;
use crate::shared::{EncodeSharedTable, ShareOutcome};
use crate::value::{
    Decimal, IpAddressValue, IpNetworkValue, MimeMessage, Ref, RegexValue, Value,
};

/// Output target of an [`Encoder`]; generalises the
/// [`Bytes`](crate) owned/borrowed split the teacher's low-level builder
/// uses, but swappable so [`Encoder::encode_to_bytes`] and canonical map-key
/// measurement can redirect output to a scratch buffer and back.
enum Sink {
    Stream(Box<dyn Write>),
    Buffer(Vec<u8>),
}

impl Sink {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        match self {
            Sink::Stream(w) => w.write_all(bytes),
            Sink::Buffer(v) => {
                v.extend_from_slice(bytes);
                Ok(())
            }
        }
    }
}

/// How aggressively `canonical` mode normalises the wire form (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Canonical {
    #[default]
    Off,
    On,
    /// per the Open Question in §9: treated as `On` plus making built-ins
    /// user-overridable through the registry (the built-in bypass in
    /// [`Registry`] is what `Full` would additionally disable; since every
    /// [`Value`] arm here already goes through a fixed match rather than a
    /// bypassable table, `Full` and `On` behave identically).
    Full,
}

#[derive(Debug, Clone)]
pub struct EncoderConfig {
    pub datetime_as_timestamp: bool,
    pub timezone: Option<FixedOffset>,
    pub value_sharing: bool,
    pub canonical: Canonical,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            datetime_as_timestamp: false,
            timezone: None,
            value_sharing: false,
            canonical: Canonical::Off,
        }
    }
}

/// Walks a [`Value`] graph and writes RFC 8949 bytes to its stream (§4.4).
///
/// Not safe to share across threads (§5): an `Encoder` owns its stream, its
/// shared-reference table, and a per-instance copy of the dispatch registry.
pub struct Encoder {
    stream: Sink,
    config: EncoderConfig,
    registry: Registry,
    shared: EncodeSharedTable,
    pos: usize,
    item_start: usize,
}

fn io_err(e: io::Error) -> EncodeError {
    EncodeError::Io(e.to_string())
}

fn cbor_key_order(a: &[u8], b: &[u8]) -> std::cmp::Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

impl Encoder {
    pub fn new(stream: impl Write + 'static, config: EncoderConfig) -> Self {
        Self {
            stream: Sink::Stream(Box::new(stream)),
            config,
            registry: Registry::new(),
            shared: EncodeSharedTable::new(),
            pos: 0,
            item_start: 0,
        }
    }

    /// Construct an encoder whose stream is an in-memory buffer from the
    /// start, as used by [`crate::dumps`].
    pub fn to_vec(config: EncoderConfig) -> Self {
        Self {
            stream: Sink::Buffer(Vec::new()),
            config,
            registry: Registry::new(),
            shared: EncodeSharedTable::new(),
            pos: 0,
            item_start: 0,
        }
    }

    /// Consume an encoder built with [`Self::to_vec`], returning the bytes
    /// written so far.
    ///
    /// # Panics
    /// Panics if this encoder was constructed with [`Self::new`] over an
    /// external stream instead.
    pub fn into_bytes(self) -> Vec<u8> {
        match self.stream {
            Sink::Buffer(v) => v,
            Sink::Stream(_) => panic!("into_bytes called on an encoder over an external stream"),
        }
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// An error a user hook can return, carrying the byte offset of the
    /// outer item that was being encoded when the hook ran (§7).
    pub fn hook_error(&self, message: impl Into<String>) -> EncodeError {
        EncodeError::Hook {
            offset: self.item_start,
            message: message.into(),
        }
    }

    fn write_raw(&mut self, bytes: &[u8]) -> Result<(), EncodeError> {
        self.stream.write_all(bytes).map_err(io_err)?;
        self.pos += bytes.len();
        Ok(())
    }

    /// Emit the initial byte for major type `mt` with argument `arg`,
    /// choosing the smallest legal `info` (§4.4 "Initial byte length
    /// choice").
    pub fn encode_length(&mut self, major: u8, arg: u64) -> Result<(), EncodeError> {
        let mut buf = Vec::with_capacity(9);
        if arg < 24 {
            buf.push(major << 5 | arg as u8);
        } else if arg < 0x100 {
            buf.push(major << 5 | INFO_1);
            buf.push(arg as u8);
        } else if arg < 0x1_0000 {
            buf.push(major << 5 | INFO_2);
            buf.extend_from_slice(&(arg as u16).to_be_bytes());
        } else if arg < 0x1_0000_0000 {
            buf.push(major << 5 | INFO_4);
            buf.extend_from_slice(&(arg as u32).to_be_bytes());
        } else {
            buf.push(major << 5 | INFO_8);
            buf.extend_from_slice(&arg.to_be_bytes());
        }
        self.write_raw(&buf)
    }

    fn encode_tag_number(&mut self, tag: u64) -> Result<(), EncodeError> {
        self.encode_length(MAJOR_TAG, tag)
    }

    pub fn encode_int_i64(&mut self, n: i64) -> Result<(), EncodeError> {
        if n >= 0 {
            self.encode_length(MAJOR_POS, n as u64)
        } else {
            let arg = (-1i128 - n as i128) as u64;
            self.encode_length(MAJOR_NEG, arg)
        }
    }

    /// Integer encoding (§4.4): inline up to 64 bits, tag 2/3 big-integer
    /// fallback beyond that.
    pub fn encode_bigint(&mut self, n: &BigInt) -> Result<(), EncodeError> {
        if n.sign() != Sign::Minus {
            if let Some(u) = n.to_u64() {
                return self.encode_length(MAJOR_POS, u);
            }
            let bytes = n.to_bytes_be().1;
            self.encode_tag_number(TAG_BIGNUM_POS)?;
            self.encode_length(MAJOR_BYTES, bytes.len() as u64)?;
            self.write_raw(&bytes)
        } else {
            let arg = -(n.clone()) - BigInt::one();
            if let Some(u) = arg.to_u64() {
                return self.encode_length(MAJOR_NEG, u);
            }
            let bytes = arg.to_bytes_be().1;
            self.encode_tag_number(TAG_BIGNUM_NEG)?;
            self.encode_length(MAJOR_BYTES, bytes.len() as u64)?;
            self.write_raw(&bytes)
        }
    }

    /// Canonical: narrowest exact width (§4.1). Non-canonical: always 8
    /// bytes.
    pub fn encode_float(&mut self, x: f64) -> Result<(), EncodeError> {
        let minimise = matches!(self.config.canonical, Canonical::On | Canonical::Full);
        if minimise {
            match classify(x) {
                FloatWidth::Half => {
                    let mut buf = vec![MAJOR_LIT << 5 | LIT_FLOAT16];
                    buf.extend_from_slice(&pack_half(x).to_be_bytes());
                    self.write_raw(&buf)
                }
                FloatWidth::Single => {
                    let mut buf = vec![MAJOR_LIT << 5 | LIT_FLOAT32];
                    buf.extend_from_slice(&(x as f32).to_be_bytes());
                    self.write_raw(&buf)
                }
                FloatWidth::Double => self.encode_float_double(x),
            }
        } else {
            self.encode_float_double(x)
        }
    }

    fn encode_float_double(&mut self, x: f64) -> Result<(), EncodeError> {
        let mut buf = vec![MAJOR_LIT << 5 | LIT_FLOAT64];
        buf.extend_from_slice(&x.to_be_bytes());
        self.write_raw(&buf)
    }

    fn canonical_sorts(&self) -> bool {
        matches!(self.config.canonical, Canonical::On | Canonical::Full)
    }

    /// §4.2's `encode_shared`: resolve whether `r` has been seen before,
    /// emit the appropriate tag (or none), and dispatch to `emit` for a
    /// first occurrence or an unshared value.
    pub fn encode_shared(
        &mut self,
        r: &Ref,
        emit: impl FnOnce(&mut Self) -> Result<(), EncodeError>,
    ) -> Result<(), EncodeError> {
        let outcome = self
            .shared
            .begin(r, self.config.value_sharing)
            .map_err(|_| EncodeError::CyclicNoSharing)?;
        match outcome {
            ShareOutcome::AlreadyShared(idx) => {
                self.encode_tag_number(TAG_SHARED_REF)?;
                self.encode_int_i64(idx as i64)
            }
            ShareOutcome::FirstOccurrence => {
                self.encode_tag_number(TAG_SHAREABLE)?;
                let result = emit(self);
                self.shared.finish(r);
                result
            }
            ShareOutcome::Unshared => {
                self.shared.enter_unshared(r);
                let result = emit(self);
                self.shared.leave_unshared(r);
                result
            }
        }
    }

    fn write_array_contents(&mut self, items: &[Ref]) -> Result<(), EncodeError> {
        self.encode_length(MAJOR_ARRAY, items.len() as u64)?;
        for item in items {
            self.encode_node(item)?;
        }
        Ok(())
    }

    /// MT 4; length header then each element, definite length.
    pub fn encode_array(&mut self, r: &Ref, items: &[Ref]) -> Result<(), EncodeError> {
        self.encode_shared(r, |enc| enc.write_array_contents(items))
    }

    /// Encode `r`'s contents into a scratch buffer to obtain its canonical
    /// byte-lex sort key, without disturbing the real shared-reference
    /// table (a throwaway clone absorbs any side effects of the dry run).
    fn measure_bytes(&mut self, r: &Ref) -> Result<Vec<u8>, EncodeError> {
        let saved_stream = std::mem::replace(&mut self.stream, Sink::Buffer(Vec::new()));
        let saved_shared = self.shared.clone();
        let saved_pos = self.pos;
        self.pos = 0;
        let result = self.encode_node(r);
        let bytes = match std::mem::replace(&mut self.stream, saved_stream) {
            Sink::Buffer(v) => v,
            Sink::Stream(_) => unreachable!("measure_bytes always installs a Buffer sink"),
        };
        self.shared = saved_shared;
        self.pos = saved_pos;
        result.map(|_| bytes)
    }

    fn write_map_contents(&mut self, pairs: &[(Ref, Ref)]) -> Result<(), EncodeError> {
        self.encode_length(MAJOR_MAP, pairs.len() as u64)?;
        if self.canonical_sorts() {
            let mut entries = Vec::with_capacity(pairs.len());
            for (k, v) in pairs {
                let key_bytes = self.measure_bytes(k)?;
                entries.push((key_bytes, k, v));
            }
            entries.sort_by(|a, b| cbor_key_order(&a.0, &b.0));
            for (_, k, v) in entries {
                self.encode_node(k)?;
                self.encode_node(v)?;
            }
        } else {
            for (k, v) in pairs {
                self.encode_node(k)?;
                self.encode_node(v)?;
            }
        }
        Ok(())
    }

    /// MT 5; canonical mode sorts pairs by length-then-lex order of the
    /// encoded key (§4.4 "Canonical map ordering").
    pub fn encode_map(&mut self, r: &Ref, pairs: &[(Ref, Ref)]) -> Result<(), EncodeError> {
        self.encode_shared(r, |enc| enc.write_map_contents(pairs))
    }

    fn write_set_contents(&mut self, items: &[Ref]) -> Result<(), EncodeError> {
        self.encode_length(MAJOR_ARRAY, items.len() as u64)?;
        if self.canonical_sorts() {
            let mut entries = Vec::with_capacity(items.len());
            for item in items {
                let bytes = self.measure_bytes(item)?;
                entries.push((bytes, item));
            }
            entries.sort_by(|a, b| cbor_key_order(&a.0, &b.0));
            for (_, item) in entries {
                self.encode_node(item)?;
            }
        } else {
            for item in items {
                self.encode_node(item)?;
            }
        }
        Ok(())
    }

    /// Tag 258 + MT 4 of elements; canonical form sorts by encoded-element
    /// ordering.
    pub fn encode_set(&mut self, r: &Ref, items: &[Ref]) -> Result<(), EncodeError> {
        self.encode_shared(r, |enc| {
            enc.encode_tag_number(TAG_SET)?;
            enc.write_set_contents(items)
        })
    }

    /// If `datetime_as_timestamp` is set, tag 1 + epoch (integer when the
    /// subsecond component is zero, else the shortest exact float); else
    /// tag 0 + RFC 3339 text.
    pub fn encode_datetime(&mut self, dt: &DateTime<FixedOffset>) -> Result<(), EncodeError> {
        if self.config.datetime_as_timestamp {
            self.encode_tag_number(TAG_DATETIME_EPOCH)?;
            let nanos = dt.timestamp_subsec_nanos();
            if nanos == 0 {
                self.encode_int_i64(dt.timestamp())
            } else {
                let secs = dt.timestamp() as f64 + nanos as f64 / 1_000_000_000.0;
                self.encode_float(secs)
            }
        } else {
            self.encode_tag_number(TAG_DATETIME_TEXT)?;
            let text = dt.to_rfc3339();
            self.encode_length(MAJOR_STR, text.len() as u64)?;
            self.write_raw(text.as_bytes())
        }
    }

    /// A datetime with no attached offset: attach the configured default
    /// timezone, or fail with `NaiveDatetimeNoTZ` (§6 `timezone` option).
    pub fn encode_naive_datetime(
        &mut self,
        naive: chrono::NaiveDateTime,
    ) -> Result<(), EncodeError> {
        let tz = self.config.timezone.ok_or(EncodeError::NaiveDatetimeNoTZ)?;
        let dt = tz
            .from_local_datetime(&naive)
            .single()
            .ok_or(EncodeError::NaiveDatetimeNoTZ)?;
        self.encode_datetime(&dt)
    }

    /// Emit midnight UTC of `d` through `encode_datetime`.
    pub fn encode_date(&mut self, d: chrono::NaiveDate) -> Result<(), EncodeError> {
        let utc = FixedOffset::east_opt(0).expect("zero offset is always valid");
        let midnight = d.and_hms_opt(0, 0, 0).expect("midnight is always valid");
        self.encode_datetime(&utc.from_utc_datetime(&midnight))
    }

    /// NaN/±∞ → float; else tag 4 + `[exponent, mantissa]`.
    pub fn encode_decimal(&mut self, d: &Decimal) -> Result<(), EncodeError> {
        match d {
            Decimal::NaN => self.encode_float(f64::NAN),
            Decimal::Infinity => self.encode_float(f64::INFINITY),
            Decimal::NegInfinity => self.encode_float(f64::NEG_INFINITY),
            Decimal::Finite { exponent, mantissa } => {
                self.encode_tag_number(TAG_DECIMAL)?;
                self.encode_length(MAJOR_ARRAY, 2)?;
                self.encode_int_i64(*exponent)?;
                self.encode_bigint(mantissa)
            }
        }
    }

    /// Tag 30 + `[numerator, denominator]`.
    pub fn encode_rational(&mut self, r: &BigRational) -> Result<(), EncodeError> {
        self.encode_tag_number(TAG_RATIONAL)?;
        self.encode_length(MAJOR_ARRAY, 2)?;
        self.encode_bigint(r.numer())?;
        self.encode_bigint(r.denom())
    }

    /// Tag 35 + pattern text.
    pub fn encode_regex(&mut self, r: &RegexValue) -> Result<(), EncodeError> {
        self.encode_tag_number(TAG_REGEX)?;
        let pattern = r.pattern();
        self.encode_length(MAJOR_STR, pattern.len() as u64)?;
        self.write_raw(pattern.as_bytes())
    }

    /// Tag 36 + serialised MIME text.
    pub fn encode_mime(&mut self, m: &MimeMessage) -> Result<(), EncodeError> {
        self.encode_tag_number(TAG_MIME)?;
        let text = m.to_text();
        self.encode_length(MAJOR_STR, text.len() as u64)?;
        self.write_raw(text.as_bytes())
    }

    /// Tag 37 + 16 raw bytes.
    pub fn encode_uuid(&mut self, u: Uuid) -> Result<(), EncodeError> {
        self.encode_tag_number(TAG_UUID)?;
        let bytes = u.into_bytes();
        self.encode_length(MAJOR_BYTES, bytes.len() as u64)?;
        self.write_raw(&bytes)
    }

    /// Tag 260 + 4- or 16-byte address (or a 6-byte MAC passthrough).
    pub fn encode_ipaddress(&mut self, a: &IpAddressValue) -> Result<(), EncodeError> {
        self.encode_tag_number(TAG_IP_ADDRESS)?;
        let bytes = a.to_bytes();
        self.encode_length(MAJOR_BYTES, bytes.len() as u64)?;
        self.write_raw(&bytes)
    }

    /// Tag 261 + map `{network-address-bytes: prefix-length}`.
    pub fn encode_ipnetwork(&mut self, n: &IpNetworkValue) -> Result<(), EncodeError> {
        self.encode_tag_number(TAG_IP_NETWORK)?;
        self.encode_length(MAJOR_MAP, 1)?;
        let addr_bytes = match n.0.network() {
            std::net::IpAddr::V4(v4) => v4.octets().to_vec(),
            std::net::IpAddr::V6(v6) => v6.octets().to_vec(),
        };
        self.encode_length(MAJOR_BYTES, addr_bytes.len() as u64)?;
        self.write_raw(&addr_bytes)?;
        self.encode_int_i64(n.0.prefix() as i64)
    }

    /// Tag `tag` + child value; the general escape hatch for an unrecognised
    /// semantic wrapper.
    pub fn encode_semantic(&mut self, tag: u64, child: &Ref) -> Result<(), EncodeError> {
        self.encode_tag_number(tag)?;
        self.encode_node(child)
    }

    /// MT 7 with `info = v` (0-23) or `24 + v` (32-255); 24..=31 are
    /// reserved and fail.
    pub fn encode_simple(&mut self, v: u8) -> Result<(), EncodeError> {
        if (24..=31).contains(&v) {
            return Err(EncodeError::InvalidSimpleValue(v));
        }
        if v < 24 {
            self.write_raw(&[MAJOR_LIT << 5 | v])
        } else {
            self.write_raw(&[MAJOR_LIT << 5 | LIT_SIMPLE_1, v])
        }
    }

    pub fn encode_undefined(&mut self) -> Result<(), EncodeError> {
        self.write_raw(&[MAJOR_LIT << 5 | LIT_UNDEFINED])
    }

    pub fn encode_none(&mut self) -> Result<(), EncodeError> {
        self.write_raw(&[MAJOR_LIT << 5 | LIT_NULL])
    }

    pub fn encode_boolean(&mut self, b: bool) -> Result<(), EncodeError> {
        self.write_raw(&[MAJOR_LIT << 5 | if b { LIT_TRUE } else { LIT_FALSE }])
    }

    /// Swap the active stream for an in-memory sink for the duration of
    /// this encode; return the produced bytes. Preserves the shared-ref
    /// table, per §4.4.
    pub fn encode_to_bytes(&mut self, v: &Ref) -> Result<Vec<u8>, EncodeError> {
        let saved_stream = std::mem::replace(&mut self.stream, Sink::Buffer(Vec::new()));
        let saved_pos = self.pos;
        self.pos = 0;
        let result = self.encode(v);
        let produced = match std::mem::replace(&mut self.stream, saved_stream) {
            Sink::Buffer(v) => v,
            Sink::Stream(_) => unreachable!("encode_to_bytes always installs a Buffer sink"),
        };
        self.pos = saved_pos;
        result.map(|_| produced)
    }

    /// Encode one top-level item to the stream.
    pub fn encode(&mut self, v: &Ref) -> Result<(), EncodeError> {
        self.item_start = self.pos;
        self.encode_node(v)
    }

    /// The central dispatcher: snapshot `r`'s content (a cheap clone — `Ref`
    /// fields are `Rc`s) so recursing into a cyclic graph never re-enters
    /// `r`'s own `RefCell` borrow.
    fn encode_node(&mut self, r: &Ref) -> Result<(), EncodeError> {
        let value = r.borrow().clone();
        match value {
            Value::Int(n) => self.encode_int_i64(n),
            Value::BigInt(n) => self.encode_bigint(&n),
            Value::Float(x) => self.encode_float(x),
            Value::Bytes(b) => {
                self.encode_length(MAJOR_BYTES, b.len() as u64)?;
                self.write_raw(&b)
            }
            Value::Text(s) => {
                self.encode_length(MAJOR_STR, s.len() as u64)?;
                self.write_raw(s.as_bytes())
            }
            Value::Array(items) => self.encode_array(r, &items),
            Value::Map(pairs) => self.encode_map(r, &pairs),
            Value::Set(items) => self.encode_set(r, &items),
            Value::Tag(t, child) => self.encode_shared(r, |enc| enc.encode_semantic(t, &child)),
            Value::Simple(v) => self.encode_simple(v),
            Value::Bool(b) => self.encode_boolean(b),
            Value::Null => self.encode_none(),
            Value::Undefined => self.encode_undefined(),
            Value::Decimal(d) => self.encode_decimal(&d),
            Value::Rational(r) => self.encode_rational(&r),
            Value::DateTime(dt) => self.encode_datetime(&dt.0),
            Value::Date(d) => self.encode_date(d.0),
            Value::Regex(re) => self.encode_regex(&re),
            Value::Mime(m) => self.encode_mime(&m),
            Value::Uuid(u) => self.encode_uuid(u),
            Value::IpAddress(a) => self.encode_ipaddress(&a),
            Value::IpNetwork(n) => self.encode_ipnetwork(&n),
            Value::External(any) => {
                let mut registry = std::mem::take(&mut self.registry);
                let result = registry.dispatch(self, r, &*any, "external value");
                self.registry = registry;
                result
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::new_ref;
    use hex_literal::hex;

    fn encode(v: &Ref, config: EncoderConfig) -> Vec<u8> {
        let mut enc = Encoder::to_vec(config);
        enc.encode(v).unwrap();
        enc.into_bytes()
    }

    #[test]
    fn small_positive_integer() {
        let v = new_ref(Value::Int(1_000_000_000_000));
        assert_eq!(
            encode(&v, EncoderConfig::default()),
            hex!("1b000000e8d4a51000").to_vec()
        );
    }

    #[test]
    fn large_negative_bigint() {
        let n = BigInt::from(18_446_744_073_709_551_617_u128);
        let v = new_ref(Value::BigInt(-n));
        assert_eq!(
            encode(&v, EncoderConfig::default()),
            hex!("c349010000000000000000").to_vec()
        );
    }

    #[test]
    fn nested_arrays() {
        let v = new_ref(Value::array([
            Value::Int(1),
            Value::array([Value::Int(2), Value::Int(3)]),
            Value::array([Value::Int(4), Value::Int(5)]),
        ]));
        assert_eq!(
            encode(&v, EncoderConfig::default()),
            hex!("8301820203820405").to_vec()
        );
    }

    #[test]
    fn simple_map() {
        let v = new_ref(Value::map([
            (Value::Int(1), Value::Int(2)),
            (Value::Int(3), Value::Int(4)),
        ]));
        assert_eq!(
            encode(&v, EncoderConfig::default()),
            hex!("a201020304").to_vec()
        );
    }

    #[test]
    fn rational_value() {
        let v = new_ref(Value::Rational(BigRational::new(2.into(), 5.into())));
        assert_eq!(
            encode(&v, EncoderConfig::default()),
            hex!("d81e820205").to_vec()
        );
    }

    #[test]
    fn datetime_as_epoch_integer() {
        let dt = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2013, 3, 21, 20, 4, 0)
            .unwrap();
        let v = new_ref(Value::DateTime(crate::value::DateTimeValue::new(dt)));
        let config = EncoderConfig {
            datetime_as_timestamp: true,
            ..Default::default()
        };
        assert_eq!(encode(&v, config), hex!("c11a514b67b0").to_vec());
    }

    #[test]
    fn self_referential_array_with_sharing() {
        let r = new_ref(Value::Null);
        *r.borrow_mut() = Value::Array(vec![r.clone()]);
        let config = EncoderConfig {
            value_sharing: true,
            ..Default::default()
        };
        assert_eq!(encode(&r, config), hex!("d81c81d81d00").to_vec());
    }

    #[test]
    fn self_referential_map_with_sharing() {
        let r = new_ref(Value::Null);
        *r.borrow_mut() = Value::Map(vec![(new_ref(Value::Int(0)), r.clone())]);
        let config = EncoderConfig {
            value_sharing: true,
            ..Default::default()
        };
        assert_eq!(encode(&r, config), hex!("d81ca100d81d00").to_vec());
    }

    #[test]
    fn cycle_without_sharing_is_rejected() {
        let r = new_ref(Value::Null);
        *r.borrow_mut() = Value::Array(vec![r.clone()]);
        let mut enc = Encoder::to_vec(EncoderConfig::default());
        assert_eq!(enc.encode(&r), Err(EncodeError::CyclicNoSharing));
    }

    #[test]
    fn canonical_sorts_map_keys_by_length_then_lex() {
        let v = new_ref(Value::map([
            (Value::Int(100), Value::Null),
            (Value::Int(-1), Value::Null),
            (Value::Text("z".into()), Value::Null),
            (Value::Int(10), Value::Null),
        ]));
        let config = EncoderConfig {
            canonical: Canonical::On,
            ..Default::default()
        };
        let bytes = encode(&v, config);
        // 10 (0x0a, 1 byte), -1 (0x20, 1 byte), 100 (0x1864, 2 bytes), "z" (0x617a, 2 bytes)
        // ties within the same length keep the encoded-byte lexicographic order.
        assert_eq!(bytes, hex!("a40af60af6186400f6617af6").to_vec());
    }

    #[test]
    fn invalid_simple_value_is_rejected() {
        let mut enc = Encoder::to_vec(EncoderConfig::default());
        assert_eq!(
            enc.encode_simple(30),
            Err(EncodeError::InvalidSimpleValue(30))
        );
    }
}

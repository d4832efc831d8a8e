//! `cbor-codec`: an RFC 7049/8949 CBOR encoder and decoder.
//!
//! The crate is built around two engines, [`Encoder`] and [`Decoder`], that
//! share a tag-numbering scheme and a shared-reference protocol for cyclic
//! graphs (§3/§4.2 of the design notes). On top of the core engines sit four
//! thin convenience functions — [`dumps`], [`dump`], [`loads`], [`load`] —
//! that buffer a value in or out of memory, mirroring the reference
//! implementation's module-level functions of the same names.
//!
//! ```
//! use cbor_codec::{dumps, loads, value::Value};
//!
//! let v = Value::array([Value::Int(1), Value::Int(2), Value::Int(3)]).into_ref();
//! let bytes = dumps(&v, Default::default()).unwrap();
//! let back = loads(&bytes, Default::default()).unwrap();
//! assert_eq!(*back.borrow(), *v.borrow());
//! ```

pub mod constants;
mod decoder;
mod encoder;
mod error;
mod half_float;
mod registry;
mod shared;
pub mod value;

pub use decoder::{Decoder, DecoderConfig, ObjectHook, StrErrorsPolicy, TagHook};
pub use encoder::{Canonical, Encoder, EncoderConfig};
pub use error::{DecodeError, DecodeErrorKind, EncodeError};
pub use half_float::{classify, pack_half, unpack_half, FloatWidth};
pub use registry::Registry;
pub use value::{new_ref, Ref, Value};

use std::io::{Read, Write};

/// Encode `v` to an in-memory buffer (§6 `dumps`).
pub fn dumps(v: &Ref, config: EncoderConfig) -> Result<Vec<u8>, EncodeError> {
    let mut enc = Encoder::to_vec(config);
    enc.encode(v)?;
    Ok(enc.into_bytes())
}

/// Encode `v` to `stream` (§6 `dump`).
pub fn dump(v: &Ref, stream: impl Write + 'static, config: EncoderConfig) -> Result<(), EncodeError> {
    let mut enc = Encoder::new(stream, config);
    enc.encode(v)
}

/// Decode one top-level item from `bytes` (§6 `loads`).
pub fn loads(bytes: &[u8], config: DecoderConfig) -> Result<Ref, DecodeError> {
    let mut dec = Decoder::new(std::io::Cursor::new(bytes.to_vec()), config);
    dec.decode()
}

/// Decode one top-level item from `stream` (§6 `load`).
pub fn load(stream: impl Read + 'static, config: DecoderConfig) -> Result<Ref, DecodeError> {
    let mut dec = Decoder::new(stream, config);
    dec.decode()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use hex_literal::hex;
    use pretty_assertions::assert_eq;

    #[test]
    fn dumps_loads_round_trip_nested_arrays() {
        let v = Value::array([
            Value::Int(1),
            Value::array([Value::Int(2), Value::Int(3)]),
            Value::array([Value::Int(4), Value::Int(5)]),
        ])
        .into_ref();
        let bytes = dumps(&v, EncoderConfig::default()).unwrap();
        assert_eq!(bytes, hex!("8301820203820405").to_vec());
        let back = loads(&bytes, DecoderConfig::default()).unwrap();
        assert_eq!(*back.borrow(), *v.borrow());
    }

    #[test]
    fn dump_load_round_trip_through_a_real_file() {
        let v = Value::map([(Value::text("k"), Value::Int(42))]).into_ref();
        let path = std::env::temp_dir().join(format!("cbor-codec-test-{}.cbor", std::process::id()));
        {
            let file = std::fs::File::create(&path).unwrap();
            dump(&v, file, EncoderConfig::default()).unwrap();
        }
        let file = std::fs::File::open(&path).unwrap();
        let back = load(file, DecoderConfig::default()).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(*back.borrow(), *v.borrow());
    }

    #[test]
    fn canonical_encoding_is_idempotent_across_a_round_trip() {
        let v = Value::map([
            (Value::Int(100), Value::text("hundred")),
            (Value::Int(-1), Value::Null),
            (Value::text("z"), Value::Bool(true)),
        ])
        .into_ref();
        let config = EncoderConfig {
            canonical: Canonical::On,
            ..Default::default()
        };
        let once = dumps(&v, config.clone()).unwrap();
        let decoded = loads(&once, DecoderConfig::default()).unwrap();
        let twice = dumps(&decoded, config).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn unknown_subtype_is_unknownsubtype_error() {
        let err = loads(&hex!("1c"), DecoderConfig::default()).unwrap_err();
        assert_eq!(err.kind(), &DecodeErrorKind::UnknownSubtype(28));
    }

    #[test]
    fn premature_eos_on_short_buffer() {
        let err = loads(&hex!("437879"), DecoderConfig::default()).unwrap_err();
        assert_eq!(
            err.kind(),
            &DecodeErrorKind::PrematureEoS { expected: 3, got: 2 }
        );
    }

    #[test]
    fn bad_shared_ref_reports_missing_index() {
        let err = loads(&hex!("d81d05"), DecoderConfig::default()).unwrap_err();
        assert_eq!(err.kind(), &DecodeErrorKind::BadSharedRef(5));
    }

    #[test]
    fn uninitialised_shared_ref_inside_a_set() {
        let err = loads(&hex!("d90102d81c81d81d00"), DecoderConfig::default()).unwrap_err();
        assert_eq!(err.kind(), &DecodeErrorKind::UninitialisedSharedRef(0));
    }
}

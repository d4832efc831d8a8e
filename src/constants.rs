#![allow(dead_code)]

//! Wire-format constants from [RFC 8949](https://www.rfc-editor.org/rfc/rfc8949).

pub const MAJOR_POS: u8 = 0;
pub const MAJOR_NEG: u8 = 1;
pub const MAJOR_BYTES: u8 = 2;
pub const MAJOR_STR: u8 = 3;
pub const MAJOR_ARRAY: u8 = 4;
pub const MAJOR_MAP: u8 = 5;
pub const MAJOR_TAG: u8 = 6;
pub const MAJOR_LIT: u8 = 7;

/// `info` values 24..=27 select the width of the following argument bytes.
pub const INFO_1: u8 = 24;
pub const INFO_2: u8 = 25;
pub const INFO_4: u8 = 26;
pub const INFO_8: u8 = 27;
/// `info == 31` marks indefinite length (MT 2-5) or `break` (MT 7).
pub const INDEFINITE_SIZE: u8 = 31;
pub const STOP_BYTE: u8 = 0xff;

/// major type 7 sub-codes
pub const LIT_FALSE: u8 = 20;
pub const LIT_TRUE: u8 = 21;
pub const LIT_NULL: u8 = 22;
pub const LIT_UNDEFINED: u8 = 23;
pub const LIT_SIMPLE_1: u8 = 24;
pub const LIT_FLOAT16: u8 = 25;
pub const LIT_FLOAT32: u8 = 26;
pub const LIT_FLOAT64: u8 = 27;

/// registered tag numbers this codec gives built-in meaning to
pub const TAG_DATETIME_TEXT: u64 = 0;
pub const TAG_DATETIME_EPOCH: u64 = 1;
pub const TAG_BIGNUM_POS: u64 = 2;
pub const TAG_BIGNUM_NEG: u64 = 3;
pub const TAG_DECIMAL: u64 = 4;
pub const TAG_BIGFLOAT: u64 = 5;
pub const TAG_SHAREABLE: u64 = 28;
pub const TAG_SHARED_REF: u64 = 29;
pub const TAG_RATIONAL: u64 = 30;
pub const TAG_REGEX: u64 = 35;
pub const TAG_MIME: u64 = 36;
pub const TAG_UUID: u64 = 37;
pub const TAG_SELF_DESCRIBE: u64 = 55799;
pub const TAG_SET: u64 = 258;
pub const TAG_IP_ADDRESS: u64 = 260;
pub const TAG_IP_NETWORK: u64 = 261;

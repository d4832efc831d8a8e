use num_bigint::BigInt;

/// A base-10 arbitrary-precision decimal (`mantissa · 10^exponent`), as
/// carried on the wire by tag 4 (decimal fraction). Tag 5 (bigfloat) payloads
/// are base-2 and are converted to this base-10 form exactly at decode time
/// (`Decoder::decode_bigfloat`) rather than stored with their native base —
/// there is only ever one base to reason about once a value reaches here.
///
/// `NaN`/`Infinity`/`NegInfinity` encode as ordinary IEEE floats per
/// `encode_decimal`'s special-case rule rather than as a tag-4 pair.
#[derive(Debug, Clone, PartialEq)]
pub enum Decimal {
    Finite { exponent: i64, mantissa: BigInt },
    NaN,
    Infinity,
    NegInfinity,
}

impl Decimal {
    pub fn new(exponent: i64, mantissa: impl Into<BigInt>) -> Self {
        Decimal::Finite {
            exponent,
            mantissa: mantissa.into(),
        }
    }

    pub fn is_special(&self) -> bool {
        !matches!(self, Decimal::Finite { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finite_equality() {
        let a = Decimal::new(-2, 202);
        let b = Decimal::new(-2, 202);
        assert_eq!(a, b);
        assert_ne!(a, Decimal::new(-1, 202));
    }

    #[test]
    fn special_values_are_special() {
        assert!(Decimal::NaN.is_special());
        assert!(!Decimal::new(0, 1).is_special());
    }
}

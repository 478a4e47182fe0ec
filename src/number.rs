//! JSON number representation with numeric widening

use std::fmt::{self, Display, Formatter};

use num_bigint::BigInt;

/// A JSON number, narrowed to the smallest representation that holds it
///
/// JSON itself places no bounds on number values, so a parsed number is
/// classified by its literal form:
///
/// - Numbers without a fraction or exponent part are integers. They are
///   returned as [`I32`](Self::I32) when the value fits in 32 bits, as
///   [`I64`](Self::I64) when it fits in 64 bits, and as
///   [`BigInt`](Self::BigInt) otherwise.
/// - Numbers containing `.`, `e` or `E` are returned as [`F64`](Self::F64).
///   Values whose magnitude exceeds the IEEE-754 double range lose precision,
///   as permitted by RFC 8259.
///
/// # Examples
/// ```
/// # use jsax::JsonNumber;
/// assert_eq!(JsonNumber::from_literal("30"), Some(JsonNumber::I32(30)));
/// assert_eq!(
///     JsonNumber::from_literal("2147483648"),
///     Some(JsonNumber::I64(2147483648))
/// );
/// assert_eq!(JsonNumber::from_literal("1e2"), Some(JsonNumber::F64(100.0)));
/// ```
#[derive(PartialEq, Clone, Debug)]
pub enum JsonNumber {
    /// Integer fitting in 32 bits
    I32(i32),
    /// Integer fitting in 64 bits but not in 32
    I64(i64),
    /// Integer too large for 64 bits
    BigInt(BigInt),
    /// Number with a fraction or exponent part
    F64(f64),
}

impl JsonNumber {
    /// Classifies the literal text of a JSON number
    ///
    /// The text must already match the JSON number grammar; this method only
    /// performs the numeric conversion and widening. Returns `None` when the
    /// text cannot be converted, which for grammar-valid input does not
    /// happen.
    pub fn from_literal(text: &str) -> Option<JsonNumber> {
        if text.bytes().any(|b| matches!(b, b'.' | b'e' | b'E')) {
            // Parsing can produce an infinite value for magnitudes beyond the
            // IEEE-754 range; RFC 8259 allows the precision loss
            return text.parse::<f64>().ok().map(JsonNumber::F64);
        }
        match text.parse::<i64>() {
            Ok(value) => match i32::try_from(value) {
                Ok(value) => Some(JsonNumber::I32(value)),
                Err(_) => Some(JsonNumber::I64(value)),
            },
            // Magnitude does not fit in 64 bits
            Err(_) => text.parse::<BigInt>().ok().map(JsonNumber::BigInt),
        }
    }

    /// Whether this number was classified as a floating-point value
    pub fn is_float(&self) -> bool {
        matches!(self, JsonNumber::F64(_))
    }
}

/// Formats the number as valid JSON number text
///
/// Integer variants print their decimal digits. The [`F64`](JsonNumber::F64)
/// variant prints the shortest decimal form which round-trips; non-finite
/// values have no JSON representation and must be rejected before writing.
impl Display for JsonNumber {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            JsonNumber::I32(value) => write!(f, "{value}"),
            JsonNumber::I64(value) => write!(f, "{value}"),
            JsonNumber::BigInt(value) => write!(f, "{value}"),
            // The `Debug` form keeps a `.0` for integral values, so a float
            // stays a float across a parse/serialize round-trip
            JsonNumber::F64(value) => write!(f, "{value:?}"),
        }
    }
}

impl From<i32> for JsonNumber {
    fn from(value: i32) -> Self {
        JsonNumber::I32(value)
    }
}

impl From<i64> for JsonNumber {
    fn from(value: i64) -> Self {
        if let Ok(value) = i32::try_from(value) {
            JsonNumber::I32(value)
        } else {
            JsonNumber::I64(value)
        }
    }
}

impl From<BigInt> for JsonNumber {
    fn from(value: BigInt) -> Self {
        JsonNumber::BigInt(value)
    }
}

impl From<f64> for JsonNumber {
    fn from(value: f64) -> Self {
        JsonNumber::F64(value)
    }
}

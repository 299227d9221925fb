use crate::{Tag, Value, ValueError, canonicalize_nan};

/// Binary numeric operators over two number values.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NumericOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl NumericOp {
    pub const ALL: [NumericOp; 4] =
        [NumericOp::Add, NumericOp::Sub, NumericOp::Mul, NumericOp::Div];

    #[inline]
    pub fn eval(self, lhs: f64, rhs: f64) -> f64 {
        let result = match self {
            NumericOp::Add => lhs + rhs,
            NumericOp::Sub => lhs - rhs,
            NumericOp::Mul => lhs * rhs,
            NumericOp::Div => lhs / rhs,
        };
        canonicalize_nan(result)
    }

    /// Apply to two values; both must already be numbers.
    pub fn apply(self, lhs: &Value, rhs: &Value) -> Result<Value, ValueError> {
        let lhs = lhs.unbox::<f64>()?;
        let rhs = rhs.unbox::<f64>()?;
        Ok(Value::Number(self.eval(lhs, rhs)))
    }

    pub fn symbol(self) -> &'static str {
        match self {
            NumericOp::Add => "+",
            NumericOp::Sub => "-",
            NumericOp::Mul => "*",
            NumericOp::Div => "/",
        }
    }
}

// ── Conversions ────────────────────────────────────────────────────

/// ECMAScript `ToBoolean`.
pub fn to_boolean(value: &Value) -> bool {
    match value {
        Value::Number(n) => !(*n == 0.0 || n.is_nan()),
        Value::Boolean(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Rope(rope) => !rope.is_empty(),
        Value::Undefined => false,
        Value::Native(handle) => !handle.is_null(),
        Value::Object(_) | Value::Function(_) => true,
    }
}

/// ECMAScript `ToNumber` for primitives. Objects need `valueOf`, which
/// lives in the object model, so they are reported as a mismatch.
pub fn to_number(value: &Value) -> Result<f64, ValueError> {
    match value {
        Value::Number(n) => Ok(*n),
        Value::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::Undefined => Ok(f64::NAN),
        Value::Native(handle) if handle.is_null() => Ok(0.0),
        Value::String(_) | Value::Rope(_) => Ok(value
            .as_string()
            .map_or(f64::NAN, |text| string_to_number(&text))),
        other => Err(ValueError::TypeMismatch {
            expected: Tag::Number,
            found: other.tag(),
        }),
    }
}

fn string_to_number(text: &str) -> f64 {
    let text = text.trim();
    if text.is_empty() {
        return 0.0;
    }
    let (sign, digits) = match text.as_bytes()[0] {
        b'-' => (-1.0, &text[1..]),
        b'+' => (1.0, &text[1..]),
        _ => (1.0, text),
    };
    if digits == "Infinity" {
        return sign * f64::INFINITY;
    }
    if let Some(hex) = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
    {
        return u64::from_str_radix(hex, 16).map_or(f64::NAN, |n| n as f64);
    }
    // Rust accepts spellings ECMAScript does not
    let signed_again = digits.starts_with(['+', '-']);
    if signed_again || digits.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return f64::NAN;
    }
    digits.parse::<f64>().map_or(f64::NAN, |n| sign * n)
}

/// ECMAScript `Number::toString` for radix 10.
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_owned();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_owned();
    }
    if n == 0.0 {
        return "0".to_owned();
    }
    // `{:e}` yields the shortest digits that round-trip
    let formatted = format!("{:e}", n.abs());
    let (mantissa, exponent) = formatted.split_once('e').unwrap_or((formatted.as_str(), "0"));
    let digits: String = mantissa.chars().filter(char::is_ascii_digit).collect();
    let k = digits.len() as i32;
    let point = exponent.parse::<i32>().unwrap_or(0) + 1;
    let sign = if n < 0.0 { "-" } else { "" };

    let body = if k <= point && point <= 21 {
        format!("{digits}{}", "0".repeat((point - k) as usize))
    } else if 0 < point && point <= 21 {
        let (int, frac) = digits.split_at(point as usize);
        format!("{int}.{frac}")
    } else if -6 < point && point <= 0 {
        format!("0.{}{digits}", "0".repeat(-point as usize))
    } else {
        let exp = point - 1;
        let exp_sign = if exp < 0 { '-' } else { '+' };
        let (lead, rest) = digits.split_at(1);
        let dot = if rest.is_empty() { "" } else { "." };
        format!("{lead}{dot}{rest}e{exp_sign}{}", exp.abs())
    };
    format!("{sign}{body}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PlainObject, RopeString, Word};

    #[test]
    fn ops_on_numbers() {
        let two = Value::from(2.0);
        let eight = Value::from(8.0);
        let results: Vec<_> = NumericOp::ALL
            .iter()
            .map(|op| op.apply(&eight, &two).expect("numbers"))
            .collect();
        assert_eq!(results, [10.0, 6.0, 16.0, 4.0].map(Value::from).to_vec());
    }

    #[test]
    fn results_always_pack_as_numbers() {
        let nasty = f64::from_bits(0xFFFF_0000_0000_0042);
        let samples = [0.0, -0.0, 1.0, f64::INFINITY, f64::NAN, nasty, 1e308];
        for x in samples {
            for y in samples {
                for op in NumericOp::ALL {
                    let result = op
                        .apply(&Value::Number(x), &Value::Number(y))
                        .expect("numbers");
                    let Value::Number(n) = result else {
                        panic!("{op:?} returned {result:?}");
                    };
                    assert!(
                        Word::from_bits(n.to_bits()).is_number(),
                        "{x} {} {y} left {:#x}",
                        op.symbol(),
                        n.to_bits()
                    );
                }
            }
        }
    }

    #[test]
    fn ops_reject_non_numbers() {
        let err = NumericOp::Add
            .apply(&Value::from(1.0), &Value::from("1"))
            .expect_err("string operand");
        assert_eq!(
            err,
            ValueError::TypeMismatch {
                expected: Tag::Number,
                found: Tag::String,
            }
        );
    }

    #[test]
    fn to_boolean_table() {
        let falsy = [
            Value::from(0.0),
            Value::from(-0.0),
            Value::from(f64::NAN),
            Value::from(""),
            Value::from(RopeString::concat("".into(), "".into())),
            Value::Undefined,
            Value::NULL,
            Value::FALSE,
        ];
        for value in &falsy {
            assert!(!to_boolean(value), "{value:?}");
        }
        assert!(to_boolean(&Value::from("0")));
        assert!(to_boolean(&Value::Object(PlainObject::shared())));
    }

    #[test]
    fn to_number_of_strings() {
        let cases = [
            ("", 0.0),
            ("  42 ", 42.0),
            ("-1.5", -1.5),
            ("0x1F", 31.0),
            ("-Infinity", f64::NEG_INFINITY),
            ("1e3", 1000.0),
        ];
        for (text, expected) in cases {
            assert_eq!(to_number(&Value::from(text)), Ok(expected), "{text}");
        }
        for text in ["abc", "inf", "NaN", "1px", "+-1"] {
            let n = to_number(&Value::from(text)).expect("string");
            assert!(n.is_nan(), "{text} should be NaN");
        }
        assert_eq!(to_number(&Value::NULL), Ok(0.0));
        assert!(to_number(&Value::Object(PlainObject::shared())).is_err());
    }

    #[test]
    fn number_formatting() {
        assert_eq!(number_to_string(1.0), "1");
        assert_eq!(number_to_string(-0.0), "0");
        assert_eq!(number_to_string(0.005), "0.005");
        assert_eq!(number_to_string(1e21), "1e+21");
        assert_eq!(number_to_string(1.5e-10), "1.5e-10");
        assert_eq!(number_to_string(123.456), "123.456");
        assert_eq!(number_to_string(-42.0), "-42");
        assert_eq!(number_to_string(2f64.powi(60)), "1152921504606847000");
        assert_eq!(number_to_string(1.2345678901234568e20), "123456789012345680000");
        assert_eq!(number_to_string(1e-6), "0.000001");
        assert_eq!(number_to_string(1e-7), "1e-7");
        assert_eq!(number_to_string(-1.5e-7), "-1.5e-7");
        assert_eq!(number_to_string(1.7976931348623157e308), "1.7976931348623157e+308");
        assert_eq!(number_to_string(f64::NAN), "NaN");
        assert_eq!(number_to_string(f64::NEG_INFINITY), "-Infinity");
    }
}

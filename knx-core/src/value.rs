use std::panic::{self, AssertUnwindSafe};

use log::debug;

use crate::dpt::DptCodec;

/// Результат успешного декодирования payload.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedValue {
    /// Строка для отображения, например "21.5 °C"
    pub display: String,
    /// Число в начале `display`, если оно есть
    pub numeric: Option<f64>,
}

/// Декодирует payload через кодек.
///
/// `None` означает "не декодировалось": неизвестный DPT, неверная длина
/// или паника внутри кодека. Это штатный исход, а не ошибка.
pub fn decode_value(codec: &dyn DptCodec, dpt: &str, data: &[u8]) -> Option<DecodedValue> {
    let result = panic::catch_unwind(AssertUnwindSafe(|| codec.decode(dpt, data)));

    match result {
        Ok(Ok(display)) => {
            let numeric = extract_number(&display);
            Some(DecodedValue { display, numeric })
        }
        Ok(Err(e)) => {
            debug!("decode failed for DPT {dpt}: {e}");
            None
        }
        Err(_) => {
            debug!("codec panicked for DPT {dpt}");
            None
        }
    }
}

/// Достаёт число в начале строки: `[-+]?digits(.digits)?`.
///
/// Десятичная запятая приводится к точке: "21,5 °C" -> 21.5.
pub fn extract_number(text: &str) -> Option<f64> {
    let s = text.trim().replace(',', ".");
    let bytes = s.as_bytes();

    let mut end = 0;
    if matches!(bytes.first(), Some(b'-' | b'+')) {
        end += 1;
    }

    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end == int_start {
        return None;
    }

    // дробная часть только если после точки есть цифра
    if end + 1 < bytes.len() && bytes[end] == b'.' && bytes[end + 1].is_ascii_digit() {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
    }

    s[..end].parse().ok()
}

/// Разбор числа из пользовательского ввода (MIN/MAX): "10", "-2,5", "+3.75"
pub fn parse_number_flexible(text: &str) -> Option<f64> {
    let s = text.trim().replace(',', ".");
    let v: f64 = s.parse().ok()?;
    v.is_finite().then_some(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dpt::StandardCodec;
    use crate::error::DecodeError;

    #[test]
    fn extract_number_reads_leading_token() {
        assert_eq!(extract_number("21.5 °C"), Some(21.5));
        assert_eq!(extract_number("  -5 °C"), Some(-5.0));
        assert_eq!(extract_number("+3"), Some(3.0));
        assert_eq!(extract_number("21,5 °C"), Some(21.5));
        assert_eq!(extract_number("42 pulses"), Some(42.0));
        assert_eq!(extract_number("7."), Some(7.0));
        assert_eq!(extract_number("1.2.3"), Some(1.2));
    }

    #[test]
    fn extract_number_requires_leading_digit() {
        assert_eq!(extract_number("on"), None);
        assert_eq!(extract_number(""), None);
        assert_eq!(extract_number("-"), None);
        assert_eq!(extract_number(".5"), None);
        assert_eq!(extract_number("scene 1"), None);
    }

    #[test]
    fn decode_value_numeric() {
        let v = decode_value(&StandardCodec, "9.001", &[0x0C, 0x33]).unwrap();
        assert_eq!(v.display, "21.5 °C");
        assert_eq!(v.numeric, Some(21.5));
    }

    #[test]
    fn decode_value_non_numeric() {
        let v = decode_value(&StandardCodec, "1.001", &[0x01]).unwrap();
        assert_eq!(v.display, "on");
        assert_eq!(v.numeric, None);
    }

    #[test]
    fn decode_value_failure_is_none() {
        assert_eq!(decode_value(&StandardCodec, "9.001", &[0x0C]), None);
        assert_eq!(decode_value(&StandardCodec, "99.1", &[0x0C]), None);
    }

    #[test]
    fn decode_value_survives_panicking_codec() {
        struct Boom;
        impl DptCodec for Boom {
            fn supports(&self, _: &str) -> bool {
                true
            }
            fn decode(&self, _: &str, _: &[u8]) -> Result<String, DecodeError> {
                panic!("boom")
            }
        }

        assert_eq!(decode_value(&Boom, "9.001", &[0x00, 0x00]), None);
    }

    #[test]
    fn display_reparse_gives_same_number() {
        let codec = StandardCodec;
        let samples: [(&str, &[u8]); 5] = [
            ("9.001", &[0x0C, 0x33]),
            ("9.007", &[0x1C, 0x26]),
            ("5.001", &[0x80]),
            ("7.001", &[0x12, 0x34]),
            ("14.056", &[0x44, 0x9A, 0x51, 0x00]),
        ];
        for (dpt, data) in samples {
            let v = decode_value(&codec, dpt, data).unwrap();
            assert_eq!(extract_number(&v.display), v.numeric, "{dpt}");
            assert!(v.numeric.is_some(), "{dpt}");
        }
    }

    #[test]
    fn parse_number_flexible_accepts_comma() {
        assert_eq!(parse_number_flexible("10"), Some(10.0));
        assert_eq!(parse_number_flexible(" 2,5 "), Some(2.5));
        assert_eq!(parse_number_flexible("+3.75"), Some(3.75));
        assert_eq!(parse_number_flexible("abc"), None);
        assert_eq!(parse_number_flexible(""), None);
        assert_eq!(parse_number_flexible("NaN"), None);
    }
}

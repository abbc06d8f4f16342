//! Data-point types (DPT): таблица алиасов и встроенный кодек.
//!
//! Ядро работает с кодеком только через трейт [`DptCodec`], поэтому
//! встроенный [`StandardCodec`] можно заменить любой другой реализацией.
//!
//! DPT 1.x, 5.001 и 9.001 декодирует `knx_pico::dpt`. Остальные типы
//! (в `knx_pico` их нет) разбираются по таблице ниже.

use knx_pico::dpt::{Dpt1, Dpt5, Dpt9, DptDecode};

use crate::error::DecodeError;

/// Кодек значений по идентификатору DPT (`"9.001"` и т.п.).
pub trait DptCodec: Send {
    /// Знает ли кодек этот DPT
    fn supports(&self, dpt: &str) -> bool;

    /// Декодирует сырые байты в строку для отображения
    fn decode(&self, dpt: &str, data: &[u8]) -> Result<String, DecodeError>;
}

/// Приводит дружелюбное имя типа к каноническому id DPT.
///
/// Неизвестные имена возвращаются как есть (trim + lowercase),
/// их потом проверяет кодек.
pub fn normalize_dpt(raw: &str) -> String {
    let s = raw.trim().to_ascii_lowercase();
    let canonical = match s.as_str() {
        "temperature" | "temp" | "t" => "9.001",
        "switch" | "bool" | "binary" => "1.001",
        "percentage" | "percent" | "pct" | "%" => "5.001",
        "power_kw" | "kw" | "power-kw" => "9.024",
        "power_w" | "w" | "power-w" => "14.056",
        "humidity" | "rh" => "9.007",
        "illuminance" | "lux" => "9.004",
        _ => return s,
    };
    canonical.to_string()
}

/// Алиасы для подсказки в интерактивном вводе: (имя, DPT, единица)
pub const ALIASES: &[(&str, &str, &str)] = &[
    ("switch", "1.001", ""),
    ("percentage", "5.001", ""),
    ("temperature", "9.001", ""),
    ("power_kw", "9.024", "kW"),
    ("power_w", "14.056", "W"),
    ("humidity", "9.007", "%"),
    ("illuminance", "9.004", "lux"),
];

#[derive(Debug, Clone, Copy)]
enum Kind {
    /// 1 бит: подписи для 0 и 1 (`Dpt1`)
    Bool(&'static str, &'static str),
    /// 5.001, 0..255 -> 0..100 % (`Dpt5::Percentage`)
    Percentage,
    /// 8 бит без знака, масштаб 0..255 -> 0..max
    Scaled(f64),
    U8,
    I8,
    U16,
    I16,
    /// 9.001 (`Dpt9::Temperature`)
    Temperature,
    /// 2-байтовый KNX float
    F16,
    U32,
    I32,
    /// IEEE 754 single
    F32,
}

impl Kind {
    fn size(self) -> usize {
        match self {
            Kind::Bool(..) | Kind::Percentage | Kind::Scaled(_) | Kind::U8 | Kind::I8 => 1,
            Kind::U16 | Kind::I16 | Kind::Temperature | Kind::F16 => 2,
            Kind::U32 | Kind::I32 | Kind::F32 => 4,
        }
    }
}

struct DptInfo {
    id: &'static str,
    kind: Kind,
    unit: &'static str,
}

const fn dpt(id: &'static str, kind: Kind, unit: &'static str) -> DptInfo {
    DptInfo { id, kind, unit }
}

static REGISTRY: &[DptInfo] = &[
    dpt("1.001", Kind::Bool("off", "on"), ""),
    dpt("1.002", Kind::Bool("false", "true"), ""),
    dpt("1.003", Kind::Bool("disable", "enable"), ""),
    dpt("1.004", Kind::Bool("no ramp", "ramp"), ""),
    dpt("1.005", Kind::Bool("no alarm", "alarm"), ""),
    dpt("1.006", Kind::Bool("low", "high"), ""),
    dpt("1.007", Kind::Bool("decrease", "increase"), ""),
    dpt("1.008", Kind::Bool("up", "down"), ""),
    dpt("1.009", Kind::Bool("open", "close"), ""),
    dpt("1.010", Kind::Bool("stop", "start"), ""),
    dpt("1.011", Kind::Bool("inactive", "active"), ""),
    dpt("1.012", Kind::Bool("not inverted", "inverted"), ""),
    dpt("1.015", Kind::Bool("no action", "reset"), ""),
    dpt("1.016", Kind::Bool("no action", "acknowledge"), ""),
    dpt("1.017", Kind::Bool("trigger", "trigger"), ""),
    dpt("1.018", Kind::Bool("not occupied", "occupied"), ""),
    dpt("1.019", Kind::Bool("closed", "open"), ""),
    dpt("1.022", Kind::Bool("scene A", "scene B"), ""),
    dpt("1.023", Kind::Bool("move up/down", "move up/down + step-stop"), ""),
    dpt("5.001", Kind::Percentage, "%"),
    dpt("5.003", Kind::Scaled(360.0), "°"),
    dpt("5.004", Kind::U8, "%"),
    dpt("5.005", Kind::U8, ""),
    dpt("5.006", Kind::U8, ""),
    dpt("5.010", Kind::U8, "pulses"),
    dpt("6.001", Kind::I8, "%"),
    dpt("6.010", Kind::I8, "pulses"),
    dpt("7.001", Kind::U16, "pulses"),
    dpt("7.002", Kind::U16, "ms"),
    dpt("7.005", Kind::U16, "s"),
    dpt("7.006", Kind::U16, "min"),
    dpt("7.007", Kind::U16, "h"),
    dpt("7.011", Kind::U16, "mm"),
    dpt("7.012", Kind::U16, "mA"),
    dpt("7.013", Kind::U16, "lx"),
    dpt("8.001", Kind::I16, "pulses"),
    dpt("8.002", Kind::I16, "ms"),
    dpt("9.001", Kind::Temperature, "°C"),
    dpt("9.002", Kind::F16, "K"),
    dpt("9.003", Kind::F16, "K/h"),
    dpt("9.004", Kind::F16, "lx"),
    dpt("9.005", Kind::F16, "m/s"),
    dpt("9.006", Kind::F16, "Pa"),
    dpt("9.007", Kind::F16, "%"),
    dpt("9.008", Kind::F16, "ppm"),
    dpt("9.010", Kind::F16, "s"),
    dpt("9.011", Kind::F16, "ms"),
    dpt("9.020", Kind::F16, "mV"),
    dpt("9.021", Kind::F16, "mA"),
    dpt("9.022", Kind::F16, "W/m²"),
    dpt("9.023", Kind::F16, "K/%"),
    dpt("9.024", Kind::F16, "kW"),
    dpt("9.025", Kind::F16, "l/h"),
    dpt("9.026", Kind::F16, "l/m²"),
    dpt("9.027", Kind::F16, "°F"),
    dpt("9.028", Kind::F16, "km/h"),
    dpt("12.001", Kind::U32, "pulses"),
    dpt("13.001", Kind::I32, "pulses"),
    dpt("13.010", Kind::I32, "Wh"),
    dpt("13.013", Kind::I32, "kWh"),
    dpt("14.000", Kind::F32, "m/s²"),
    dpt("14.007", Kind::F32, "°"),
    dpt("14.017", Kind::F32, "kg/m³"),
    dpt("14.019", Kind::F32, "A"),
    dpt("14.027", Kind::F32, "V"),
    dpt("14.031", Kind::F32, "J"),
    dpt("14.033", Kind::F32, "Hz"),
    dpt("14.056", Kind::F32, "W"),
    dpt("14.057", Kind::F32, ""),
    dpt("14.068", Kind::F32, "°C"),
    dpt("14.076", Kind::F32, "m³"),
    dpt("14.079", Kind::F32, "W"),
];

/// Встроенный кодек на статической таблице DPT.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardCodec;

impl StandardCodec {
    fn lookup(dpt: &str) -> Option<&'static DptInfo> {
        let id = dpt.trim();
        REGISTRY.iter().find(|info| info.id == id)
    }
}

impl DptCodec for StandardCodec {
    fn supports(&self, dpt: &str) -> bool {
        Self::lookup(dpt).is_some()
    }

    fn decode(&self, dpt: &str, data: &[u8]) -> Result<String, DecodeError> {
        let info = Self::lookup(dpt).ok_or_else(|| DecodeError::UnsupportedDpt(dpt.to_string()))?;

        let expected = info.kind.size();
        if data.len() != expected {
            return Err(DecodeError::Length {
                dpt: info.id.to_string(),
                expected,
                actual: data.len(),
            });
        }

        let out_of_range = || DecodeError::OutOfRange {
            dpt: info.id.to_string(),
        };

        let text = match info.kind {
            Kind::Bool(off, on) => {
                let bit = Dpt1::Switch.decode(data).map_err(|_| out_of_range())?;
                let label = if bit { on } else { off };
                return Ok(label.to_string());
            }
            Kind::Percentage => {
                let v = Dpt5::Percentage.decode(data).map_err(|_| out_of_range())?;
                format_number(f64::from(v), 1)
            }
            Kind::Scaled(max) => format_number(f64::from(data[0]) * max / 255.0, 1),
            Kind::U8 => data[0].to_string(),
            Kind::I8 => (data[0] as i8).to_string(),
            Kind::U16 => u16::from_be_bytes([data[0], data[1]]).to_string(),
            Kind::I16 => i16::from_be_bytes([data[0], data[1]]).to_string(),
            Kind::Temperature => {
                if *data == INVALID_F16 {
                    return Err(out_of_range());
                }
                let v = Dpt9::Temperature.decode(data).map_err(|_| out_of_range())?;
                format_number(f64::from(v), 2)
            }
            Kind::F16 => {
                let v = decode_f16([data[0], data[1]]).ok_or_else(out_of_range)?;
                format_number(v, 2)
            }
            Kind::U32 => u32::from_be_bytes([data[0], data[1], data[2], data[3]]).to_string(),
            Kind::I32 => i32::from_be_bytes([data[0], data[1], data[2], data[3]]).to_string(),
            Kind::F32 => {
                let v = f32::from_be_bytes([data[0], data[1], data[2], data[3]]);
                if !v.is_finite() {
                    return Err(out_of_range());
                }
                v.to_string()
            }
        };

        if info.unit.is_empty() {
            Ok(text)
        } else {
            Ok(format!("{text} {}", info.unit))
        }
    }
}

/// Зарезервированное значение 2-байтового float: "невалидные данные"
const INVALID_F16: [u8; 2] = [0x7F, 0xFF];

/// KNX 2-byte float: `0.01 * M * 2^E`, M — 12 бит в дополнительном коде.
///
/// Для 9.xxx кроме 9.001: у `Dpt9::Temperature` нижняя граница -273 °C,
/// а разности, давление и прочие подтипы используют весь диапазон формата.
fn decode_f16(bytes: [u8; 2]) -> Option<f64> {
    if bytes == INVALID_F16 {
        return None;
    }
    let exp = i32::from((bytes[0] >> 3) & 0x0F);
    let mut mant = (i32::from(bytes[0] & 0x07) << 8) | i32::from(bytes[1]);
    if bytes[0] & 0x80 != 0 {
        mant -= 2048;
    }
    Some(0.01 * f64::from(mant) * f64::from(1u32 << exp))
}

/// Фиксированное число знаков без хвостовых нулей: 21.50 -> "21.5", 40.00 -> "40"
fn format_number(v: f64, decimals: usize) -> String {
    let s = format!("{v:.decimals$}");
    let s = if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        s
    };
    if s == "-0" { "0".to_string() } else { s }
}

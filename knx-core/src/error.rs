use thiserror::Error;

/// Верхнеуровневый тип ошибок крейта
#[derive(Debug, Error)]
pub enum KnxCoreError {
    /// Ошибки адресов
    #[error(transparent)]
    Address(#[from] AddressError),

    /// Ошибки шаблонов адресов
    #[error(transparent)]
    Pattern(#[from] PatternError),

    /// Ошибки построения правил
    #[error(transparent)]
    Rule(#[from] RuleError),

    /// Ошибки разбора строки правила
    #[error(transparent)]
    RuleLine(#[from] RuleLineError),

    /// Ошибки декодирования DPT
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Ошибки KNXnet/IP кадров
    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// Ошибки разбора адресов
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    /// Не 3 уровня
    #[error("group address must have 3 levels main/middle/sub: {0:?}")]
    Levels(String),

    /// Уровень не число
    #[error("invalid address level {0:?}")]
    NotANumber(String),

    /// main вне диапазона 0..31
    #[error("main group must be 0..31, got {0}")]
    MainOutOfRange(u32),

    /// middle вне диапазона 0..7
    #[error("middle group must be 0..7, got {0}")]
    MiddleOutOfRange(u32),

    /// sub вне диапазона 0..255
    #[error("sub group must be 0..255, got {0}")]
    SubOutOfRange(u32),
}

/// Ошибки разбора шаблона `A/B/#`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    /// Шаблон с `#` не из трёх частей или части не числа
    #[error("invalid group address pattern (use A/B/#): {0}")]
    Invalid(String),

    /// main/middle вне диапазона
    #[error("pattern out of range (main 0..31, middle 0..7): {0}")]
    OutOfRange(String),

    /// Точный адрес не разобрался
    #[error("invalid group address {text:?}: {source}")]
    Address {
        text: String,
        #[source]
        source: AddressError,
    },
}

/// Ошибки построения правила
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    /// Неверный шаблон адреса
    #[error(transparent)]
    Pattern(#[from] PatternError),

    /// Кодек не знает такой DPT
    #[error("invalid or unsupported DPT: {0}")]
    UnsupportedDpt(String),
}

/// Ошибки разбора строки `GA-DPT-all` / `GA-DPT-MIN-MAX`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleLineError {
    /// Пустая строка
    #[error("empty rule line")]
    Empty,

    /// Меньше трёх полей
    #[error("invalid format, use GA-DPT-all or GA-DPT-MIN-MAX")]
    Format,

    /// Есть MIN, но нет MAX
    #[error("missing MAX, use GA-DPT-MIN-MAX")]
    MissingMax,

    /// MIN/MAX не числа
    #[error("invalid MIN/MAX: {0:?}")]
    InvalidBound(String),
}

/// Ошибки декодирования значения
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// DPT неизвестен кодеку
    #[error("unsupported DPT: {0}")]
    UnsupportedDpt(String),

    /// Длина payload не совпадает с размером типа
    #[error("DPT {dpt} expects {expected} byte(s), got {actual}")]
    Length {
        dpt: String,
        expected: usize,
        actual: usize,
    },

    /// Значение не представимо в типе
    #[error("DPT {dpt}: value out of range")]
    OutOfRange { dpt: String },
}

/// Ошибки KNXnet/IP / cEMI кадров
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// Кадр слишком короткий
    #[error("frame too short")]
    TooShort,

    /// Неверный заголовок
    #[error("invalid KNXnet/IP header")]
    BadHeader,

    /// Не тот тип сервиса
    #[error("unexpected service type 0x{0:04x}")]
    UnexpectedService(u16),

    /// Шлюз отказал в соединении
    #[error("connection rejected by gateway, status 0x{0:02x}")]
    Rejected(u8),

    /// Туннель поддерживает только IPv4
    #[error("IPv6 endpoints are not supported")]
    Ipv6,
}

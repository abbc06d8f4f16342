//! # knx-core
//!
//! Ядро монитора KNX: правила, сопоставление адресов и декодирование телеграмм.
//!
//! Этот крейт содержит:
//!
//! - [`address`] — групповые и индивидуальные адреса KNX
//! - [`pattern`] — шаблоны адресов (`1/0/31`, `1/0/#`)
//! - [`dpt`] — таблица алиасов DPT и встроенный кодек
//! - [`value`] — декодирование payload и извлечение числа
//! - [`rule`] / [`rule_set`] — правила и упорядоченный набор правил
//! - [`rule_line`] — разбор строк `GA-DPT-all` / `GA-DPT-MIN-MAX`
//! - [`processor`] — конвейер обработки одной телеграммы
//! - [`record`] — запись лога и трейт приёмника
//! - [`wire`] — кадры KNXnet/IP tunneling
//! - [`error`] — типы ошибок `knx-core`
//!
//! ## Быстрый пример: правило и телеграмма
//!
//! ```rust
//! use knx_core::{BusEvent, Destination, EventKind, IndividualAddress, Outcome};
//! use knx_core::{RuleSetBuilder, StandardCodec, TelegramProcessor};
//! use knx_core::rule_line::build_rule;
//!
//! let mut rules = RuleSetBuilder::new();
//! rules.push(build_rule("1/0/31-temperature-all", &StandardCodec).unwrap());
//!
//! let mut processor =
//!     TelegramProcessor::new(rules.build(), Box::new(StandardCodec), Vec::new());
//!
//! let event = BusEvent {
//!     kind: EventKind::GroupWrite,
//!     source: IndividualAddress::from_raw(0x1105),
//!     destination: Destination::Group("1/0/31".parse().unwrap()),
//!     payload: vec![0x0C, 0x33],
//! };
//!
//! match processor.process(&event) {
//!     Outcome::Emitted(record) => assert_eq!(record.value, Some(21.5)),
//!     other => panic!("unexpected outcome: {other:?}"),
//! }
//! ```
//!
//! ## Пример: шаблон адреса
//!
//! ```rust
//! use knx_core::{AddressPattern, GroupAddress};
//!
//! let p: AddressPattern = "1/0/#".parse().unwrap();
//! assert!(p.matches("1/0/12".parse::<GroupAddress>().unwrap()));
//! assert!(!p.matches("1/1/12".parse::<GroupAddress>().unwrap()));
//! ```
//!
//! ## Дизайн
//!
//! `knx-core` не делает ввода-вывода: сокеты, файлы и консоль живут в
//! `knx-monitor`. Здесь только чистые типы, разбор и логика фильтрации.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Адреса KNX.
pub mod address;

/// Шаблоны групповых адресов.
pub mod pattern;

/// Data-point types: алиасы и кодек.
pub mod dpt;

/// Декодированное значение и извлечение числа.
pub mod value;

/// Правило мониторинга.
pub mod rule;

/// Упорядоченный набор правил.
pub mod rule_set;

/// Текстовый формат строк правил.
pub mod rule_line;

/// Телеграммы шины.
pub mod telegram;

/// Запись лога и приёмник.
pub mod record;

/// Обработка телеграмм.
pub mod processor;

/// Wire-уровень KNXnet/IP.
pub mod wire;

/// Ошибки `knx-core`.
pub mod error;

// --- Re-exports (публичный фасад API) ---

pub use crate::address::{Destination, GroupAddress, IndividualAddress};
pub use crate::dpt::{DptCodec, StandardCodec, normalize_dpt};
pub use crate::error::{
    AddressError, DecodeError, FrameError, KnxCoreError, PatternError, RuleError, RuleLineError,
};
pub use crate::pattern::AddressPattern;
pub use crate::processor::{IgnoreReason, Outcome, TelegramProcessor};
pub use crate::record::{CSV_HEADER, LogRecord, RecordSink};
pub use crate::rule::{Rule, ValueRange};
pub use crate::rule_set::{RuleSet, RuleSetBuilder};
pub use crate::telegram::{BusEvent, EventKind};
pub use crate::value::DecodedValue;

use std::io;

use chrono::{DateTime, FixedOffset, SecondsFormat};

use crate::address::{Destination, GroupAddress, IndividualAddress};

/// Заголовок CSV-лога
pub const CSV_HEADER: &str = "ts_iso,src,dst,ga,value,payload_hex";

/// Маркер в консоли, когда payload не декодировался
pub const NO_DECODE: &str = "<no-decode>";

/// Одна принятая телеграмма, готовая к записи.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub timestamp: DateTime<FixedOffset>,
    pub source: IndividualAddress,
    pub destination: Destination,
    pub group: GroupAddress,
    /// Строка декодера, если декодирование удалось
    pub display: Option<String>,
    /// Число из `display`, если есть
    pub value: Option<f64>,
    pub payload: Vec<u8>,
}

impl LogRecord {
    /// ISO-8601 с миллисекундами и смещением: 2025-01-10T08:15:00.250+01:00
    pub fn timestamp_iso(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, false)
    }

    pub fn payload_hex(&self) -> String {
        hex::encode(&self.payload)
    }

    /// Строка CSV без перевода строки, колонки как в [`CSV_HEADER`]
    pub fn csv_row(&self) -> String {
        let value = self.value.map(|v| v.to_string()).unwrap_or_default();
        format!(
            "{},{},{},{},{},{}",
            self.timestamp_iso(),
            self.source,
            self.destination,
            self.group,
            value,
            self.payload_hex()
        )
    }

    /// Строка для консоли
    pub fn console_line(&self) -> String {
        let shown = self.display.as_deref().unwrap_or(NO_DECODE);
        format!(
            "{} {} -> {} value={} (payload={})",
            self.timestamp_iso(),
            self.source,
            self.group,
            shown,
            self.payload_hex()
        )
    }
}

/// Приёмник записей лога (append-only).
///
/// Реализация должна довести запись до устройства (flush) до возврата,
/// чтобы при падении процесса терялась максимум текущая запись.
pub trait RecordSink {
    fn append(&mut self, record: &LogRecord) -> io::Result<()>;
}

/// In-memory приёмник, удобен в тестах
impl RecordSink for Vec<LogRecord> {
    fn append(&mut self, record: &LogRecord) -> io::Result<()> {
        self.push(record.clone());
        Ok(())
    }
}

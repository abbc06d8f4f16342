use std::fmt;

use crate::address::{Destination, IndividualAddress};

/// Вид групповой телеграммы (APCI).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// GroupValueWrite
    GroupWrite,
    /// GroupValueResponse — обрабатывается так же, как Write
    GroupResponse,
    /// GroupValueRead — без данных, монитор её игнорирует
    GroupRead,
}

impl EventKind {
    /// Несёт ли событие значение
    pub fn carries_value(self) -> bool {
        matches!(self, EventKind::GroupWrite | EventKind::GroupResponse)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventKind::GroupWrite => "write",
            EventKind::GroupResponse => "response",
            EventKind::GroupRead => "read",
        };
        f.write_str(s)
    }
}

/// Одно событие шины от транспорта.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusEvent {
    pub kind: EventKind,
    pub source: IndividualAddress,
    pub destination: Destination,
    /// ASDU; может быть пустым
    pub payload: Vec<u8>,
}

impl BusEvent {
    pub fn payload_hex(&self) -> String {
        hex::encode(&self.payload)
    }
}

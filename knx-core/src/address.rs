use std::fmt;
use std::str::FromStr;

use crate::error::AddressError;

/// Максимальное значение main-уровня группового адреса (5 бит)
pub const MAX_MAIN: u8 = 31;
/// Максимальное значение middle-уровня (3 бита)
pub const MAX_MIDDLE: u8 = 7;

/// Групповой адрес KNX в 3-уровневой записи `main/middle/sub`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupAddress {
    main: u8,
    middle: u8,
    sub: u8,
}

impl GroupAddress {
    /// Создаёт адрес с проверкой диапазонов уровней
    pub fn new(main: u8, middle: u8, sub: u8) -> Result<Self, AddressError> {
        if main > MAX_MAIN {
            return Err(AddressError::MainOutOfRange(main.into()));
        }
        if middle > MAX_MIDDLE {
            return Err(AddressError::MiddleOutOfRange(middle.into()));
        }
        Ok(Self { main, middle, sub })
    }

    /// Адрес из 16-битного представления на шине (5 | 3 | 8 бит).
    ///
    /// Разбор битов делает `knx_pico::GroupAddress`.
    pub fn from_raw(raw: u16) -> Self {
        Self::from(knx_pico::GroupAddress::from(raw))
    }

    pub fn raw(self) -> u16 {
        (u16::from(self.main) << 11) | (u16::from(self.middle) << 8) | u16::from(self.sub)
    }

    pub fn main(self) -> u8 {
        self.main
    }

    pub fn middle(self) -> u8 {
        self.middle
    }

    pub fn sub(self) -> u8 {
        self.sub
    }
}

impl From<knx_pico::GroupAddress> for GroupAddress {
    fn from(ga: knx_pico::GroupAddress) -> Self {
        Self {
            main: ga.main(),
            middle: ga.middle(),
            sub: ga.sub(),
        }
    }
}

impl fmt::Display for GroupAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.main, self.middle, self.sub)
    }
}

impl FromStr for GroupAddress {
    type Err = AddressError;

    /// Разбирает строку вида "1/0/31"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('/').collect();
        if parts.len() != 3 {
            return Err(AddressError::Levels(s.to_string()));
        }

        let main = parse_level(parts[0])?;
        let middle = parse_level(parts[1])?;
        let sub = parse_level(parts[2])?;

        if main > u32::from(MAX_MAIN) {
            return Err(AddressError::MainOutOfRange(main));
        }
        if middle > u32::from(MAX_MIDDLE) {
            return Err(AddressError::MiddleOutOfRange(middle));
        }
        if sub > u32::from(u8::MAX) {
            return Err(AddressError::SubOutOfRange(sub));
        }

        // диапазоны уже проверены выше
        Ok(Self {
            main: main as u8,
            middle: middle as u8,
            sub: sub as u8,
        })
    }
}

fn parse_level(s: &str) -> Result<u32, AddressError> {
    s.trim()
        .parse::<u32>()
        .map_err(|_| AddressError::NotANumber(s.to_string()))
}

/// Индивидуальный (физический) адрес устройства `area.line.device`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndividualAddress {
    area: u8,
    line: u8,
    device: u8,
}

impl IndividualAddress {
    /// Адрес из 16-битного представления (4 | 4 | 8 бит)
    pub fn from_raw(raw: u16) -> Self {
        Self {
            area: ((raw >> 12) & 0x0F) as u8,
            line: ((raw >> 8) & 0x0F) as u8,
            device: (raw & 0xFF) as u8,
        }
    }

    pub fn raw(self) -> u16 {
        (u16::from(self.area) << 12) | (u16::from(self.line) << 8) | u16::from(self.device)
    }
}

impl fmt::Display for IndividualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.area, self.line, self.device)
    }
}

/// Адрес назначения телеграммы: групповой или (по ошибке) индивидуальный.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Group(GroupAddress),
    Individual(IndividualAddress),
}

impl Destination {
    pub fn as_group(&self) -> Option<GroupAddress> {
        match self {
            Destination::Group(ga) => Some(*ga),
            Destination::Individual(_) => None,
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Group(ga) => fmt::Display::fmt(ga, f),
            Destination::Individual(ia) => fmt::Display::fmt(ia, f),
        }
    }
}

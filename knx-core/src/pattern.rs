use std::fmt;
use std::str::FromStr;

use crate::address::{GroupAddress, MAX_MAIN, MAX_MIDDLE};
use crate::error::PatternError;

/// Маркер "любой sub" в третьем уровне шаблона
pub const WILDCARD_SUFFIX: &str = "/#";

/// Шаблон группового адреса: точный адрес или `main/middle/#`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressPattern {
    /// Совпадает только с этим адресом
    Exact(GroupAddress),
    /// Совпадает с любым sub внутри `main/middle`
    Wildcard { main: u8, middle: u8 },
}

impl AddressPattern {
    pub fn matches(&self, ga: GroupAddress) -> bool {
        match *self {
            AddressPattern::Exact(exact) => exact == ga,
            AddressPattern::Wildcard { main, middle } => {
                ga.main() == main && ga.middle() == middle
            }
        }
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, AddressPattern::Wildcard { .. })
    }
}

impl FromStr for AddressPattern {
    type Err = PatternError;

    /// Парсит "1/0/31" или "1/0/#"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();

        if text.ends_with(WILDCARD_SUFFIX) {
            let parts: Vec<&str> = text.split('/').collect();
            if parts.len() != 3 {
                return Err(PatternError::Invalid(text.to_string()));
            }

            let main: i64 = parts[0]
                .trim()
                .parse()
                .map_err(|_| PatternError::Invalid(text.to_string()))?;
            let middle: i64 = parts[1]
                .trim()
                .parse()
                .map_err(|_| PatternError::Invalid(text.to_string()))?;

            if !(0..=i64::from(MAX_MAIN)).contains(&main)
                || !(0..=i64::from(MAX_MIDDLE)).contains(&middle)
            {
                return Err(PatternError::OutOfRange(text.to_string()));
            }

            return Ok(AddressPattern::Wildcard {
                main: main as u8,
                middle: middle as u8,
            });
        }

        text.parse::<GroupAddress>()
            .map(AddressPattern::Exact)
            .map_err(|source| PatternError::Address {
                text: text.to_string(),
                source,
            })
    }
}

impl fmt::Display for AddressPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressPattern::Exact(ga) => write!(f, "{ga}"),
            AddressPattern::Wildcard { main, middle } => write!(f, "{main}/{middle}/#"),
        }
    }
}

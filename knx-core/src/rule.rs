use std::fmt;

use crate::address::GroupAddress;
use crate::dpt::DptCodec;
use crate::error::RuleError;
use crate::pattern::AddressPattern;
use crate::value::DecodedValue;

/// Необязательный числовой диапазон правила.
///
/// Обе границы `None` — фильтра нет. `min > max` не переставляем:
/// такой диапазон просто ничего не пропускает.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ValueRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl ValueRange {
    /// Без ограничений ("all")
    pub const ALL: ValueRange = ValueRange {
        min: None,
        max: None,
    };

    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max }
    }

    pub fn is_all(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    pub fn contains(&self, v: f64) -> bool {
        if let Some(min) = self.min {
            if v < min {
                return false;
            }
        }
        if let Some(max) = self.max {
            if v > max {
                return false;
            }
        }
        true
    }
}

/// Правило мониторинга: шаблон адреса + DPT + необязательный диапазон.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pattern: AddressPattern,
    dpt: String,
    range: ValueRange,
}

impl Rule {
    pub fn new(pattern: AddressPattern, dpt: impl Into<String>, range: ValueRange) -> Self {
        Self {
            pattern,
            dpt: dpt.into(),
            range,
        }
    }

    /// Собирает правило из текста адреса и уже нормализованного id DPT.
    ///
    /// Проверяет шаблон и то, что кодек знает DPT.
    pub fn build(
        address: &str,
        dpt: &str,
        min: Option<f64>,
        max: Option<f64>,
        codec: &dyn DptCodec,
    ) -> Result<Self, RuleError> {
        if !codec.supports(dpt) {
            return Err(RuleError::UnsupportedDpt(dpt.to_string()));
        }
        let pattern: AddressPattern = address.parse()?;
        Ok(Self::new(pattern, dpt, ValueRange::new(min, max)))
    }

    pub fn pattern(&self) -> &AddressPattern {
        &self.pattern
    }

    pub fn dpt(&self) -> &str {
        &self.dpt
    }

    pub fn range(&self) -> ValueRange {
        self.range
    }

    pub fn matches_address(&self, ga: GroupAddress) -> bool {
        self.pattern.matches(ga)
    }

    /// Числовой фильтр.
    ///
    /// Если значение не декодировалось в число, телеграмма проходит:
    /// правило не может отфильтровать то, что не смогло разобрать,
    /// поэтому такая телеграмма пишется в лог только с hex.
    pub fn accepts(&self, decoded: Option<&DecodedValue>) -> bool {
        if self.range.is_all() {
            return true;
        }
        match decoded.and_then(|d| d.numeric) {
            Some(v) => self.range.contains(v),
            None => true,
        }
    }

    /// Адрес + числовой фильтр
    pub fn matches(&self, ga: GroupAddress, decoded: Option<&DecodedValue>) -> bool {
        self.matches_address(ga) && self.accepts(decoded)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} DPT={}", self.pattern, self.dpt)?;
        match (self.range.min, self.range.max) {
            (None, None) => write!(f, " (all)"),
            (min, max) => write!(f, " range={}..{}", fmt_bound(min), fmt_bound(max)),
        }
    }
}

fn fmt_bound(b: Option<f64>) -> String {
    b.map(|v| v.to_string()).unwrap_or_default()
}

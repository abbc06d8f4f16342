use crate::dpt::{DptCodec, normalize_dpt};
use crate::error::{KnxCoreError, RuleLineError};
use crate::rule::Rule;
use crate::value::parse_number_flexible;

/// Разобранная строка правила, ещё не проверенная кодеком.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleSpec {
    /// Текст адреса/шаблона как ввёл пользователь
    pub address: String,
    /// Нормализованный id DPT
    pub dpt: String,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl RuleSpec {
    pub fn into_rule(self, codec: &dyn DptCodec) -> Result<Rule, KnxCoreError> {
        Ok(Rule::build(&self.address, &self.dpt, self.min, self.max, codec)?)
    }
}

/// Парсит строку вида:
/// "1/0/31-temperature-all" или "1/0/33-9.001-10-40"
pub fn parse_rule_line(line: &str) -> Result<RuleSpec, RuleLineError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(RuleLineError::Empty);
    }

    let parts: Vec<&str> = line.split('-').map(str::trim).collect();
    if parts.len() < 3 {
        return Err(RuleLineError::Format);
    }

    let address = parts[0].to_string();
    let dpt = normalize_dpt(parts[1]);
    let third = parts[2];

    if third.eq_ignore_ascii_case("all") {
        return Ok(RuleSpec {
            address,
            dpt,
            min: None,
            max: None,
        });
    }

    let max_raw = parts.get(3).ok_or(RuleLineError::MissingMax)?;

    let min = parse_number_flexible(third)
        .ok_or_else(|| RuleLineError::InvalidBound(third.to_string()))?;
    let max = parse_number_flexible(max_raw)
        .ok_or_else(|| RuleLineError::InvalidBound(max_raw.to_string()))?;

    Ok(RuleSpec {
        address,
        dpt,
        min: Some(min),
        max: Some(max),
    })
}

/// Одна строка -> готовое правило (разбор + проверка кодеком)
pub fn build_rule(line: &str, codec: &dyn DptCodec) -> Result<Rule, KnxCoreError> {
    parse_rule_line(line)?.into_rule(codec)
}

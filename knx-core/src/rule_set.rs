use std::sync::Arc;

use crate::address::GroupAddress;
use crate::rule::Rule;

/// Накопитель правил на этапе ввода.
///
/// Порядок добавления = приоритет. После [`RuleSetBuilder::build`]
/// набор уже не меняется.
#[derive(Debug, Default)]
pub struct RuleSetBuilder {
    rules: Vec<Rule>,
}

impl RuleSetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, rule: Rule) -> &mut Self {
        self.rules.push(rule);
        self
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn build(self) -> RuleSet {
        RuleSet {
            rules: self.rules.into(),
        }
    }
}

/// Неизменяемый упорядоченный набор правил.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Arc<[Rule]>,
}

impl RuleSet {
    /// Первое по порядку добавления правило, чей шаблон совпал с адресом.
    ///
    /// "Самое точное" совпадение не ищем: кто раньше добавлен, тот и выигрывает.
    pub fn select(&self, ga: GroupAddress) -> Option<&Rule> {
        self.rules.iter().find(|r| r.matches_address(ga))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }
}

impl FromIterator<Rule> for RuleSet {
    fn from_iter<I: IntoIterator<Item = Rule>>(iter: I) -> Self {
        Self {
            rules: iter.into_iter().collect(),
        }
    }
}

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use knx_core::rule_line::build_rule;
use knx_core::{DptCodec, RuleSet, RuleSetBuilder};
use thiserror::Error;

use crate::cli::Args;
use crate::prompt;

#[derive(Debug, Error)]
pub(crate) enum RulesError {
    #[error("failed to read rules file: {path:?}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Ошибка записи в консоль / чтения stdin
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub(crate) type Result<T> = std::result::Result<T, RulesError>;

/// Загружает правила из источника, выбранного в CLI:
/// - `--rules-file` -> строки файла
/// - `--rule`       -> строки из аргументов
/// - иначе          -> интерактивный ввод
///
/// Отклонённые строки печатаются в `out` с причиной и пропускаются.
pub(crate) fn load_rules<R: BufRead, W: Write>(
    args: &Args,
    codec: &dyn DptCodec,
    input: &mut R,
    out: &mut W,
) -> Result<RuleSet> {
    if let Some(path) = &args.rules_file {
        let lines = read_rule_lines_from_path(path).map_err(|e| RulesError::ReadFile {
            path: path.clone(),
            source: e,
        })?;
        Ok(collect_rules(&lines, codec, out)?)
    } else if !args.rules.is_empty() {
        Ok(collect_rules(&args.rules, codec, out)?)
    } else {
        Ok(prompt::enter_rules(input, out, codec)?)
    }
}

/// Строит набор из готовых строк, сохраняя порядок
pub(crate) fn collect_rules<W: Write>(
    lines: &[String],
    codec: &dyn DptCodec,
    out: &mut W,
) -> io::Result<RuleSet> {
    let mut builder = RuleSetBuilder::new();
    for line in lines {
        accept_line(&mut builder, line, codec, out)?;
    }
    Ok(builder.build())
}

/// Пытается добавить одно правило; результат сообщаем оператору
pub(crate) fn accept_line<W: Write>(
    builder: &mut RuleSetBuilder,
    line: &str,
    codec: &dyn DptCodec,
    out: &mut W,
) -> io::Result<bool> {
    match build_rule(line, codec) {
        Ok(rule) => {
            writeln!(out, "OK: {rule}")?;
            builder.push(rule);
            Ok(true)
        }
        Err(e) => {
            writeln!(out, "rejected {:?}: {e}", line.trim())?;
            Ok(false)
        }
    }
}

/// Чтение строк правил
pub(crate) fn read_rule_lines<R: Read>(reader: R) -> io::Result<Vec<String>> {
    let mut lines = Vec::new();
    for line in BufReader::new(reader).lines() {
        if let Some(l) = normalize_line(&line?) {
            lines.push(l);
        }
    }
    Ok(lines)
}

/// Чтение строк правил из файла
pub(crate) fn read_rule_lines_from_path(path: impl AsRef<Path>) -> io::Result<Vec<String>> {
    let f = File::open(path)?;
    read_rule_lines(f)
}

/// Комментарий — `#` в начале строки или после пробела.
/// `#` сразу после `/` — это wildcard (`1/0/#`), его не трогаем.
fn normalize_line(line: &str) -> Option<String> {
    let s = line.trim();
    if s.is_empty() || s.starts_with('#') {
        return None;
    }

    let end = s
        .char_indices()
        .find(|&(i, c)| c == '#' && s[..i].ends_with(char::is_whitespace))
        .map(|(i, _)| i)
        .unwrap_or(s.len());

    let s = s[..end].trim();
    if s.is_empty() {
        return None;
    }
    Some(s.to_string())
}

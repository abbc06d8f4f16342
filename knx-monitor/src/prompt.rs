//! Интерактивный ввод: адрес шлюза, файл лога и правила построчно.

use std::io::{self, BufRead, Write};

use knx_core::dpt::ALIASES;
use knx_core::{DptCodec, RuleSet, RuleSetBuilder};

use crate::rules::accept_line;

/// Задаёт вопрос и читает одну строку (trim). На EOF возвращает пустую строку
pub(crate) fn ask<R: BufRead, W: Write>(input: &mut R, out: &mut W, question: &str) -> io::Result<String> {
    write!(out, "{question}")?;
    out.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn print_help<W: Write>(out: &mut W) -> io::Result<()> {
    writeln!(out, "Enter groups to monitor, ONE line per group, fields separated by '-':")?;
    writeln!(out, "  GA-DPT-all        (log every value of the group)")?;
    writeln!(out, "  GA-DPT-MIN-MAX    (log only values inside the range)")?;
    writeln!(out, "Use '#' as the last level to match any sub group: 1/0/#-9.001-all")?;
    writeln!(out, "DPT may be numeric (9.001) or a common alias:")?;
    for (name, dpt, unit) in ALIASES {
        if unit.is_empty() {
            writeln!(out, "  {name:<13} -> {dpt}")?;
        } else {
            writeln!(out, "  {name:<13} -> {dpt:<7} ({unit})")?;
        }
    }
    writeln!(out, "Examples:")?;
    writeln!(out, "  1/0/31-temperature-all")?;
    writeln!(out, "  1/0/#-temperature-all")?;
    writeln!(out, "  1/0/33-9.001-10-40")?;
    writeln!(out, "Leave the line empty when done.")?;
    Ok(())
}

/// Интерактивный ввод правил до пустой строки или EOF.
///
/// Неверные строки печатаются с причиной и пропускаются, ввод продолжается.
pub(crate) fn enter_rules<R: BufRead, W: Write>(
    input: &mut R,
    out: &mut W,
    codec: &dyn DptCodec,
) -> io::Result<RuleSet> {
    print_help(out)?;

    let mut builder = RuleSetBuilder::new();
    loop {
        write!(out, "> ")?;
        out.flush()?;

        let mut line = String::new();
        let n = input.read_line(&mut line)?;
        let line = line.trim();
        if n == 0 || line.is_empty() {
            break;
        }

        accept_line(&mut builder, line, codec, out)?;
    }

    Ok(builder.build())
}

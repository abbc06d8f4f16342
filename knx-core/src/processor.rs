//! Обработка одной телеграммы: проверка адреса -> выбор правила ->
//! декодирование -> числовой фильтр -> запись.

use std::panic::{self, AssertUnwindSafe};

use chrono::{DateTime, FixedOffset, Local};
use log::{debug, error, warn};

use crate::dpt::DptCodec;
use crate::record::{LogRecord, RecordSink};
use crate::rule_set::RuleSet;
use crate::telegram::BusEvent;
use crate::value::decode_value;

/// Почему телеграмма отброшена до выбора правила
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// GroupValueRead
    ReadRequest,
    EmptyPayload,
    /// В поле назначения индивидуальный адрес
    NotGroupAddress,
}

/// Итог обработки телеграммы.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Ignored(IgnoreReason),
    /// Ни одно правило не подошло по адресу
    NoRule,
    /// Правило нашлось, но число вне диапазона
    FilteredOut,
    /// Записано в лог
    Emitted(LogRecord),
    /// Сбой внутри конвейера; телеграмма потеряна, мониторинг продолжается
    Failed(String),
}

/// Конвейер обработки телеграмм поверх неизменяемого набора правил.
pub struct TelegramProcessor<S: RecordSink> {
    rules: RuleSet,
    codec: Box<dyn DptCodec>,
    sink: S,
}

impl<S: RecordSink> TelegramProcessor<S> {
    pub fn new(rules: RuleSet, codec: Box<dyn DptCodec>, sink: S) -> Self {
        Self { rules, codec, sink }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Обрабатывает событие с текущим локальным временем
    pub fn process(&mut self, event: &BusEvent) -> Outcome {
        self.process_at(event, Local::now().fixed_offset())
    }

    /// Как [`process`](Self::process), но с заданной меткой времени.
    ///
    /// Никогда не паникует наружу: любая ошибка превращается в `Outcome::Failed`.
    pub fn process_at(&mut self, event: &BusEvent, ts: DateTime<FixedOffset>) -> Outcome {
        debug!(
            "telegram {} dst={} len={} payload={}",
            event.kind,
            event.destination,
            event.payload.len(),
            event.payload_hex()
        );

        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| self.evaluate(event, ts))) {
            Ok(outcome) => outcome,
            Err(panic) => {
                let msg = panic_message(panic.as_ref());
                error!("telegram to {} failed: {msg}", event.destination);
                return Outcome::Failed(msg);
            }
        };

        if let Outcome::Emitted(record) = &outcome {
            if let Err(e) = self.sink.append(record) {
                warn!("failed to write log record for {}: {e}", record.group);
                return Outcome::Failed(e.to_string());
            }
        }

        outcome
    }

    fn evaluate(&self, event: &BusEvent, ts: DateTime<FixedOffset>) -> Outcome {
        if !event.kind.carries_value() {
            return Outcome::Ignored(IgnoreReason::ReadRequest);
        }
        if event.payload.is_empty() {
            return Outcome::Ignored(IgnoreReason::EmptyPayload);
        }
        let Some(ga) = event.destination.as_group() else {
            return Outcome::Ignored(IgnoreReason::NotGroupAddress);
        };

        let Some(rule) = self.rules.select(ga) else {
            return Outcome::NoRule;
        };

        let decoded = decode_value(self.codec.as_ref(), rule.dpt(), &event.payload);

        if !rule.accepts(decoded.as_ref()) {
            debug!("telegram to {ga} filtered out by {rule}");
            return Outcome::FilteredOut;
        }

        let (display, value) = match decoded {
            Some(d) => (Some(d.display), d.numeric),
            None => (None, None),
        };

        Outcome::Emitted(LogRecord {
            timestamp: ts,
            source: event.source,
            destination: event.destination,
            group: ga,
            display,
            value,
            payload: event.payload.clone(),
        })
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{Destination, GroupAddress, IndividualAddress};
    use crate::dpt::StandardCodec;
    use crate::error::DecodeError;
    use crate::rule_line::build_rule;
    use crate::rule_set::RuleSetBuilder;
    use crate::telegram::EventKind;
    use chrono::TimeZone;
    use std::io;

    fn ts() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(2 * 3600)
            .unwrap()
            .with_ymd_and_hms(2025, 6, 1, 12, 0, 0)
            .unwrap()
    }

    fn rules(lines: &[&str]) -> RuleSet {
        let mut b = RuleSetBuilder::new();
        for line in lines {
            b.push(build_rule(line, &StandardCodec).unwrap());
        }
        b.build()
    }

    fn processor(lines: &[&str]) -> TelegramProcessor<Vec<LogRecord>> {
        TelegramProcessor::new(rules(lines), Box::new(StandardCodec), Vec::new())
    }

    fn write(dst: &str, payload: &[u8]) -> BusEvent {
        let ga: GroupAddress = dst.parse().unwrap();
        BusEvent {
            kind: EventKind::GroupWrite,
            source: IndividualAddress::from_raw(0x1105),
            destination: Destination::Group(ga),
            payload: payload.to_vec(),
        }
    }

    #[test]
    fn accepted_temperature_is_logged() {
        let mut p = processor(&["1/0/31-temperature-all"]);

        let outcome = p.process_at(&write("1/0/31", &[0x0C, 0x33]), ts());
        let Outcome::Emitted(record) = outcome else {
            panic!("expected Emitted, got {outcome:?}");
        };
        assert_eq!(record.value, Some(21.5));
        assert_eq!(record.display.as_deref(), Some("21.5 °C"));
        assert!(record.csv_row().ends_with(",1/0/31,21.5,0c33"));
        assert_eq!(p.sink().len(), 1);
    }

    #[test]
    fn humidity_outside_range_is_dropped() {
        let mut p = processor(&["1/0/#-humidity-30-70"]);

        let outcome = p.process_at(&write("1/0/12", &[0x1C, 0x26]), ts());
        assert_eq!(outcome, Outcome::FilteredOut);
        assert!(p.sink().is_empty());

        // 50 % — внутри диапазона
        let outcome = p.process_at(&write("1/0/12", &[0x14, 0xE2]), ts());
        assert!(matches!(outcome, Outcome::Emitted(_)));
    }

    #[test]
    fn undecodable_payload_is_kept_as_hex() {
        let mut p = processor(&["1/0/33-9.001-10-40"]);

        let outcome = p.process_at(&write("1/0/33", &[0x0C]), ts());
        let Outcome::Emitted(record) = outcome else {
            panic!("expected Emitted");
        };
        assert_eq!(record.value, None);
        assert_eq!(record.display, None);
        assert!(record.csv_row().ends_with(",1/0/33,,0c"));
        assert!(record.console_line().contains("<no-decode>"));
    }

    #[test]
    fn non_numeric_value_passes_range_rule() {
        let mut p = processor(&["1/0/40-switch-10-40"]);
        let outcome = p.process_at(&write("1/0/40", &[0x01]), ts());
        let Outcome::Emitted(record) = outcome else {
            panic!("expected Emitted");
        };
        assert_eq!(record.display.as_deref(), Some("on"));
        assert_eq!(record.value, None);
    }

    #[test]
    fn empty_payload_is_ignored_even_with_rule() {
        let mut p = processor(&["1/0/#-temperature-all"]);
        let outcome = p.process_at(&write("1/0/31", &[]), ts());
        assert_eq!(outcome, Outcome::Ignored(IgnoreReason::EmptyPayload));
        assert!(p.sink().is_empty());
    }

    #[test]
    fn read_requests_are_ignored() {
        let mut p = processor(&["1/0/#-temperature-all"]);
        let mut ev = write("1/0/31", &[0x0C, 0x33]);
        ev.kind = EventKind::GroupRead;
        assert_eq!(
            p.process_at(&ev, ts()),
            Outcome::Ignored(IgnoreReason::ReadRequest)
        );
    }

    #[test]
    fn responses_are_processed_like_writes() {
        let mut p = processor(&["1/0/#-temperature-all"]);
        let mut ev = write("1/0/31", &[0x0C, 0x33]);
        ev.kind = EventKind::GroupResponse;
        assert!(matches!(p.process_at(&ev, ts()), Outcome::Emitted(_)));
    }

    #[test]
    fn individual_destination_is_ignored() {
        let mut p = processor(&["1/0/#-temperature-all"]);
        let mut ev = write("1/0/31", &[0x0C, 0x33]);
        ev.destination = Destination::Individual(IndividualAddress::from_raw(0x0831));
        assert_eq!(
            p.process_at(&ev, ts()),
            Outcome::Ignored(IgnoreReason::NotGroupAddress)
        );
    }

    #[test]
    fn unmatched_address_produces_nothing() {
        let mut p = processor(&["1/0/31-temperature-all"]);
        assert_eq!(
            p.process_at(&write("2/0/31", &[0x0C, 0x33]), ts()),
            Outcome::NoRule
        );
        assert!(p.into_sink().is_empty());
    }

    #[test]
    fn first_rule_decides_dpt() {
        let mut p = processor(&["1/0/31-switch-all", "1/0/#-temperature-all"]);
        let Outcome::Emitted(record) = p.process_at(&write("1/0/31", &[0x01]), ts()) else {
            panic!("expected Emitted");
        };
        assert_eq!(record.display.as_deref(), Some("on"));
    }

    #[test]
    fn sink_error_does_not_panic() {
        struct Broken;
        impl RecordSink for Broken {
            fn append(&mut self, _: &LogRecord) -> io::Result<()> {
                Err(io::Error::other("disk full"))
            }
        }

        let mut p = TelegramProcessor::new(
            rules(&["1/0/31-temperature-all"]),
            Box::new(StandardCodec),
            Broken,
        );
        let outcome = p.process_at(&write("1/0/31", &[0x0C, 0x33]), ts());
        assert_eq!(outcome, Outcome::Failed("disk full".to_string()));

        // следующая телеграмма обрабатывается как обычно
        assert_eq!(p.process_at(&write("2/0/1", &[0x01]), ts()), Outcome::NoRule);
    }

    #[test]
    fn panicking_codec_still_logs_hex() {
        struct Boom;
        impl DptCodec for Boom {
            fn supports(&self, _: &str) -> bool {
                true
            }
            fn decode(&self, _: &str, _: &[u8]) -> Result<String, DecodeError> {
                panic!("codec exploded")
            }
        }

        let mut b = RuleSetBuilder::new();
        b.push(build_rule("1/0/31-9.001-all", &Boom).unwrap());
        let mut p = TelegramProcessor::new(b.build(), Box::new(Boom), Vec::new());

        let outcome = p.process_at(&write("1/0/31", &[0x0C, 0x33]), ts());
        let Outcome::Emitted(record) = outcome else {
            panic!("expected Emitted");
        };
        assert_eq!(record.value, None);
        assert_eq!(record.payload_hex(), "0c33");
    }

    #[test]
    fn process_uses_current_time() {
        let mut p = processor(&["1/0/31-temperature-all"]);
        let before = Local::now().fixed_offset();
        let Outcome::Emitted(record) = p.process(&write("1/0/31", &[0x0C, 0x33])) else {
            panic!("expected Emitted");
        };
        assert!(record.timestamp >= before - chrono::Duration::seconds(1));
    }
}

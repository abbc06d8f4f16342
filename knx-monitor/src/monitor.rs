use std::fmt;
use std::io::{self, Write};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use crossbeam_channel::{Receiver, RecvTimeoutError};
use log::{info, warn};

use knx_core::{BusEvent, Outcome, RecordSink, TelegramProcessor};

use crate::config::MONITOR_TICK;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MonitorStats {
    received: usize,
    logged: usize,
    filtered: usize,
    failed: usize,
}

impl fmt::Display for MonitorStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "received={} logged={} filtered={} failed={}",
            self.received, self.logged, self.filtered, self.failed
        )
    }
}

impl MonitorStats {
    fn count(&mut self, outcome: &Outcome) {
        self.received += 1;
        match outcome {
            Outcome::Emitted(_) => self.logged += 1,
            Outcome::FilteredOut => self.filtered += 1,
            Outcome::Failed(_) => self.failed += 1,
            Outcome::Ignored(_) | Outcome::NoRule => {}
        }
    }
}

/// Читает события из канала и прогоняет их через процессор, пока не
/// выставлен `shutdown` или не закрыт канал.
///
/// Записанные телеграммы печатаются в `out` одной строкой.
pub(crate) fn run_monitor<S: RecordSink, W: Write>(
    rx: Receiver<BusEvent>,
    processor: &mut TelegramProcessor<S>,
    out: &mut W,
    shutdown: Arc<AtomicBool>,
) -> MonitorStats {
    let mut stats = MonitorStats::default();

    loop {
        if shutdown.load(Ordering::Relaxed) {
            info!("monitor: shutdown requested");
            break;
        }

        match rx.recv_timeout(MONITOR_TICK) {
            Ok(event) => {
                let outcome = processor.process(&event);
                stats.count(&outcome);
                if let Err(e) = report(out, &outcome) {
                    warn!("failed to write to console: {e}");
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                // тик
            }
            Err(RecvTimeoutError::Disconnected) => {
                info!("monitor: tunnel closed");
                break;
            }
        }
    }

    stats
}

fn report<W: Write>(out: &mut W, outcome: &Outcome) -> io::Result<()> {
    match outcome {
        Outcome::Emitted(record) => writeln!(out, "{}", record.console_line())?,
        Outcome::Failed(reason) => writeln!(out, "telegram processing failed: {reason}")?,
        _ => return Ok(()),
    }
    out.flush()
}

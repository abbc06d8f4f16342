//! Точка входа `knx-monitor`.
//!
//! Жизненный цикл:
//! - парсинг CLI; недостающие шлюз и файл лога спрашиваем в консоли
//! - загрузка правил (файл, `--rule` или интерактивный ввод)
//! - KNXnet/IP tunneling: приём телеграмм в отдельном потоке
//! - обработка телеграмм и запись в CSV в основном потоке
//! - корректная остановка по `Ctrl+C` (DISCONNECT_REQUEST шлюзу)

mod cli;
mod config;
mod csv_log;
mod monitor;
mod prompt;
mod rules;
mod tunnel;

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, atomic::AtomicBool, atomic::Ordering};

use anyhow::{Context, anyhow, bail};
use clap::Parser;
use log::info;

use knx_core::{StandardCodec, TelegramProcessor};

fn main() -> anyhow::Result<()> {
    // Логи через RUST_LOG=info/debug
    env_logger::init();

    let args = cli::Args::parse();
    args.validate()?;

    let mut input = io::stdin().lock();
    let mut out = io::stdout();

    let gateway = match &args.gateway {
        Some(g) => g.trim().to_string(),
        None => prompt::ask(
            &mut input,
            &mut out,
            "KNX/IP gateway address (e.g. 192.168.1.55): ",
        )?,
    };
    if gateway.is_empty() {
        bail!("gateway address is required");
    }

    let output = match &args.output {
        Some(p) => p.clone(),
        None => {
            let answer = prompt::ask(&mut input, &mut out, "CSV output file (e.g. events.csv): ")?;
            if answer.is_empty() {
                bail!("output file is required");
            }
            PathBuf::from(answer)
        }
    };

    let codec = StandardCodec;
    if !args.has_rule_source() {
        info!("no --rules-file or --rule given; reading rules interactively");
    }
    let rules = rules::load_rules(&args, &codec, &mut input, &mut out)?;
    if rules.is_empty() {
        writeln!(out, "no rules configured; exiting")?;
        return Ok(());
    }

    let gateway = cli::resolve_gateway(&gateway, args.port)
        .with_context(|| format!("cannot resolve gateway {gateway:?}"))?;
    let log = csv_log::CsvLog::open(&output)
        .with_context(|| format!("cannot open output file {output:?}"))?;

    info!(
        "Starting knx-monitor: gateway={gateway}, output={:?}, rules={}",
        log.path(),
        rules.len()
    );

    let shutdown = Arc::new(AtomicBool::new(false));

    // Ctrl+C => ставим shutdown=true
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || {
            shutdown.store(true, Ordering::Relaxed);
            info!("shutting down...");
        })?;
    }

    let tunnel = tunnel::Tunnel::connect(gateway, &shutdown)?;
    writeln!(out, "Connected to {}", tunnel.gateway())?;

    let (tx, rx) = crossbeam_channel::bounded(config::EVENT_CHANNEL_CAPACITY);
    let handle = tunnel::spawn(tunnel, tx, shutdown.clone())?;

    writeln!(out, "Monitoring... Ctrl+C to quit.")?;
    out.flush()?;

    let mut processor = TelegramProcessor::new(rules, Box::new(codec), log);
    let stats = monitor::run_monitor(rx, &mut processor, &mut out, shutdown.clone());

    // монитор мог выйти сам (туннель закрылся) — гасим и поток туннеля
    shutdown.store(true, Ordering::Relaxed);
    let transport = handle
        .join()
        .map_err(|_| anyhow!("tunnel thread panicked"))?;

    info!("knx-monitor stopped: {stats}");
    transport
}

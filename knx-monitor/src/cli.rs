use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;

use crate::config;

/// KNX Monitor - пишет групповые телеграммы KNX в CSV по заданным правилам.
///
/// Подключается к KNX/IP шлюзу через tunneling, только чтение шины.
/// Правила: `GA-DPT-all` или `GA-DPT-MIN-MAX`, например `1/0/#-temperature-all`.
#[derive(Parser, Debug, Clone)]
#[command(name = "knx-monitor", version, about)]
pub(crate) struct Args {
    /// Адрес KNX/IP шлюза: 192.168.1.55 или host:3671. Если не задан — спросим
    #[arg(long)]
    pub(crate) gateway: Option<String>,

    /// Порт шлюза, если в --gateway он не указан
    #[arg(long, default_value_t = config::KNX_PORT)]
    pub(crate) port: u16,

    /// CSV-файл для записи. Если не задан — спросим
    #[arg(long)]
    pub(crate) output: Option<PathBuf>,

    /// Файл правил (по одному на строку, поддержка # комментариев). Нельзя вместе с --rule
    #[arg(long, conflicts_with = "rules")]
    pub(crate) rules_file: Option<PathBuf>,

    /// Правило строкой, можно несколько раз: --rule 1/0/31-temperature-all
    #[arg(long = "rule", value_name = "RULE")]
    pub(crate) rules: Vec<String>,
}

impl Args {
    /// Валидация аргументов (файл правил существует и т.д.)
    pub(crate) fn validate(&self) -> Result<()> {
        if let Some(gateway) = &self.gateway {
            if gateway.trim().is_empty() {
                bail!("--gateway is empty");
            }
        }

        if let Some(path) = &self.rules_file {
            let md = std::fs::metadata(path)
                .with_context(|| format!("rules file not found: {:?}", path))?;
            if !md.is_file() {
                bail!("--rules-file must point to a file: {:?}", path);
            }
        }

        if let Some(path) = &self.output {
            if path.is_dir() {
                bail!("--output must be a file, not a directory: {:?}", path);
            }
        }

        Ok(())
    }

    /// Правила заданы в командной строке или файлом (иначе — интерактивный ввод)
    pub(crate) fn has_rule_source(&self) -> bool {
        self.rules_file.is_some() || !self.rules.is_empty()
    }
}

/// Резолвит адрес шлюза. Берём первый IPv4: KNXnet/IP tunneling работает по IPv4
pub(crate) fn resolve_gateway(text: &str, default_port: u16) -> io::Result<SocketAddr> {
    let text = text.trim();
    let addrs: Vec<SocketAddr> = if text.contains(':') {
        text.to_socket_addrs()?.collect()
    } else {
        (text, default_port).to_socket_addrs()?.collect()
    };

    addrs
        .into_iter()
        .find(SocketAddr::is_ipv4)
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no IPv4 address resolved"))
}

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use knx_core::{CSV_HEADER, LogRecord, RecordSink};

/// Append-only CSV-лог. Каждая запись сбрасывается на диск сразу.
pub(crate) struct CsvLog {
    out: BufWriter<File>,
    path: PathBuf,
}

impl CsvLog {
    /// Открывает файл на дозапись; заголовок пишется только в новый файл
    pub(crate) fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let is_new = !path.exists();

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut out = BufWriter::new(file);

        if is_new {
            writeln!(out, "{CSV_HEADER}")?;
        }
        out.flush()?;

        Ok(Self { out, path })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSink for CsvLog {
    fn append(&mut self, record: &LogRecord) -> io::Result<()> {
        writeln!(self.out, "{}", record.csv_row())?;
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use knx_core::{Destination, GroupAddress, IndividualAddress};
    use std::fs;

    fn record(value: Option<f64>) -> LogRecord {
        let ga: GroupAddress = "1/0/31".parse().unwrap();
        LogRecord {
            timestamp: chrono::DateTime::parse_from_rfc3339("2025-01-10T08:15:00.250+01:00")
                .unwrap(),
            source: IndividualAddress::from_raw(0x1105),
            destination: Destination::Group(ga),
            group: ga,
            display: value.map(|v| format!("{v} °C")),
            value,
            payload: vec![0x0C, 0x33],
        }
    }

    #[test]
    fn new_file_gets_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.csv");

        let mut log = CsvLog::open(&path).unwrap();
        log.append(&record(Some(21.5))).unwrap();
        log.append(&record(None)).unwrap();
        assert_eq!(log.path(), path.as_path());

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "ts_iso,src,dst,ga,value,payload_hex\n\
             2025-01-10T08:15:00.250+01:00,1.1.5,1/0/31,1/0/31,21.5,0c33\n\
             2025-01-10T08:15:00.250+01:00,1.1.5,1/0/31,1/0/31,,0c33\n"
        );
    }

    #[test]
    fn existing_file_is_appended_without_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.csv");

        {
            let mut log = CsvLog::open(&path).unwrap();
            log.append(&record(Some(21.5))).unwrap();
        }
        {
            let mut log = CsvLog::open(&path).unwrap();
            log.append(&record(Some(22.0))).unwrap();
        }

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.matches("ts_iso").count(), 1);
        assert_eq!(text.lines().count(), 3);
        assert!(text.lines().last().unwrap().ends_with(",22,0c33"));
    }

    #[test]
    fn records_are_flushed_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.csv");

        let mut log = CsvLog::open(&path).unwrap();
        log.append(&record(Some(21.5))).unwrap();

        // log ещё жив: читаем файл до drop
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
        drop(log);
    }
}

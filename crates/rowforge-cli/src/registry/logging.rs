use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;

use super::{RegistryError, RegistryResult};

/// `RUST_LOG` when set, otherwise `info`.
fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// JSON lines into the run's `logs.ndjson`.
pub fn init_run_logging(path: &Path) -> RegistryResult<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let file = Arc::new(Mutex::new(file));

    let make_writer = BoxMakeWriter::new(move || SharedWriter {
        file: Arc::clone(&file),
    });

    let layer = tracing_subscriber::fmt::layer()
        .json()
        .with_timer(UtcTime::rfc_3339())
        .with_writer(make_writer);

    tracing_subscriber::registry()
        .with(env_filter())
        .with(layer)
        .try_init()
        .map_err(|err| RegistryError::Logging(err.to_string()))
}

/// Human-readable logs on stderr for commands without a run directory.
pub fn init_stderr_logging() -> RegistryResult<()> {
    let layer = tracing_subscriber::fmt::layer()
        .with_timer(UtcTime::rfc_3339())
        .with_writer(io::stderr);

    tracing_subscriber::registry()
        .with(env_filter())
        .with(layer)
        .try_init()
        .map_err(|err| RegistryError::Logging(err.to_string()))
}

struct SharedWriter {
    file: Arc<Mutex<File>>,
}

impl SharedWriter {
    fn lock(&self) -> io::Result<std::sync::MutexGuard<'_, File>> {
        self.file
            .lock()
            .map_err(|_| io::Error::other("log file lock poisoned"))
    }
}

impl Write for SharedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.lock()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.lock()?.flush()
    }
}

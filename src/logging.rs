use logroller::{LogRoller, LogRollerBuilder, Rotation, RotationSize};
use parking_lot::Mutex;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};
use tracing_subscriber::fmt::writer::MakeWriter;
use tracing_subscriber::prelude::__tracing_subscriber_SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

static LOGGER_INIT: Once = Once::new();

pub const LOG_FILE_NAME: &str = "docchat.log";

/// Shares one rotating log file between every event the file layer writes
#[derive(Clone)]
pub struct LogRollerWriter {
    roller: Arc<Mutex<LogRoller>>,
}

impl LogRollerWriter {
    pub fn new(roller: LogRoller) -> Self {
        Self {
            roller: Arc::new(Mutex::new(roller)),
        }
    }

    /// Size-rotated `docchat.log` in `log_dir`, creating the directory if needed
    pub fn open(log_dir: &Path) -> io::Result<Self> {
        std::fs::create_dir_all(log_dir)?;
        let roller = LogRollerBuilder::new(
            log_dir.to_string_lossy().to_string(),
            LOG_FILE_NAME.to_string(),
        )
        .rotation(Rotation::SizeBased(RotationSize::MB(100)))
        .max_keep_files(5)
        .build()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
        Ok(Self::new(roller))
    }
}

impl Write for LogRollerWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.roller.lock().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.roller.lock().flush()
    }
}

impl<'a> MakeWriter<'a> for LogRollerWriter {
    type Writer = LogRollerWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Install the global subscriber once: compact stderr output and, when `log_dir`
/// is given, a size-rotated `docchat.log` without colors (100MB per file, 5 kept).
/// `RUST_LOG` overrides `log_level`.
pub fn configure_logging(log_level: &str, log_dir: Option<&Path>) {
    LOGGER_INIT.call_once(|| {
        let filter = || {
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("docchat={},warn", log_level)))
        };

        let stderr_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact()
            .with_filter(filter());

        let file_layer = log_dir.and_then(|dir| match LogRollerWriter::open(dir) {
            Ok(writer) => Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true)
                    .compact()
                    .with_filter(filter()),
            ),
            Err(e) => {
                eprintln!("Failed to open log file in {}: {}", dir.display(), e);
                None
            }
        });

        // Another subscriber may already be installed (tests)
        let _ = tracing_subscriber::registry()
            .with(stderr_layer)
            .with(file_layer)
            .try_init();
    });

    tracing::debug!("Logging configured at level {}", log_level);
}

pub fn log_file_path(log_dir: &Path) -> PathBuf {
    log_dir.join(LOG_FILE_NAME)
}

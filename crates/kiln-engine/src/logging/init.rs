use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Once;

/// Logger configuration.
///
/// `env_filter` follows the `env_logger` filter syntax (e.g. "info", "warn",
/// "kiln_engine=debug,wgpu=warn").
///
/// `log_file`, when set, is truncated at initialization and receives a copy of
/// every record in addition to stderr.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub env_filter: Option<String>,
    pub write_style: env_logger::WriteStyle,
    pub log_file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            env_filter: None,
            write_style: env_logger::WriteStyle::Auto,
            log_file: None,
        }
    }
}

static INIT: Once = Once::new();

/// Initializes the global logger once.
///
/// This function is idempotent; subsequent calls are ignored.
/// Intended usage is early in `main`.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();

        if let Some(filter) = &config.env_filter {
            builder.parse_filters(filter);
        } else if let Ok(filter) = std::env::var("RUST_LOG") {
            builder.parse_filters(&filter);
        } else {
            builder.filter_level(log::LevelFilter::Info);
        }

        builder.write_style(config.write_style);

        let mut file_error = None;
        if let Some(path) = &config.log_file {
            match open_log_file(path) {
                Ok(file) => {
                    builder
                        .format(|buf, record| {
                            writeln!(
                                buf,
                                "{} [{}] {}: {}",
                                buf.timestamp_seconds(),
                                record.level(),
                                record.target(),
                                record.args()
                            )
                        })
                        .target(env_logger::Target::Pipe(Box::new(TeeWriter { file })));
                }
                Err(e) => file_error = Some((path.clone(), e)),
            }
        }

        builder.init();

        if let Some((path, e)) = file_error {
            log::warn!("log file {} unavailable, logging to stderr only: {e}", path.display());
        }

        log::debug!("logging initialized");
    });
}

/// Creates `path` (and its parent directory) and truncates any previous run's log.
fn open_log_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    File::create(path)
}

/// Writes every formatted record to stderr and to the log file.
struct TeeWriter {
    file: File,
}

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.file.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("kiln-logging-{name}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn log_file_is_truncated_on_open() {
        let dir = scratch_dir("truncate");
        let path = dir.join("logs.log");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(&path, "previous run\n").unwrap();

        let file = open_log_file(&path).unwrap();
        drop(file);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_parent_directories_are_created() {
        let dir = scratch_dir("nested");
        let path = dir.join("a").join("b").join("logs.log");

        let mut tee = TeeWriter { file: open_log_file(&path).unwrap() };
        tee.write_all(b"hello\n").unwrap();
        tee.flush().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello\n");

        std::fs::remove_dir_all(&dir).unwrap();
    }
}

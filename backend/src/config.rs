//! Application configuration.
//!
//! Fixed names of the export format live here as constants; runtime knobs
//! are read from the environment (a `.env` file is loaded by the CLI first).

use std::path::PathBuf;

/// Context tag identifying the `.elablite` container format and version.
pub const ELABLITE_CONTEXT: &str = "http://example.org/elablite/v1.0/";

/// Name of the generated CSV inside the export archive.
pub const EXPERIENCES_CSV: &str = "experiences.csv";

/// Name of the row table snapshot inside the export archive.
pub const LOGS_PROCESS_CSV: &str = "logs_process.csv";

/// Per-folder manifest listing the files of that folder.
pub const DATAFILE_MANIFEST: &str = "DATAFILE.txt";

/// Folder key used for every file in grouped mode.
pub const GROUPED_FOLDER: &str = "data";

/// Default number of entries kept per store directory.
pub const DEFAULT_RETENTION: usize = 10;

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 3000;

fn default_temp_root() -> PathBuf {
    std::env::temp_dir().join("elablite")
}

/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root of the transient template/preset store.
    pub temp_root: PathBuf,
    /// Maximum entries kept per store directory.
    pub retention: usize,
    /// HTTP port for `serve`.
    pub port: u16,
}

impl Config {
    /// Build the configuration from `ELABLITE_*` environment variables.
    ///
    /// Unset or unparseable values fall back to the defaults.
    pub fn from_env() -> Self {
        let temp_root = std::env::var_os("ELABLITE_TMP_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(default_temp_root);

        let retention = std::env::var("ELABLITE_RETENTION")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|&n: &usize| n > 0)
            .unwrap_or(DEFAULT_RETENTION);

        let port = std::env::var("ELABLITE_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        Self {
            temp_root,
            retention,
            port,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            temp_root: default_temp_root(),
            retention: DEFAULT_RETENTION,
            port: DEFAULT_PORT,
        }
    }
}

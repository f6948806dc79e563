use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration for the conversion service
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Bind address (default: "127.0.0.1")
    pub host: String,

    /// Bind port (default: 8000)
    pub port: u16,

    /// Maximum request body size in bytes (default: 64 MB)
    pub max_upload_size: usize,

    /// Extension, without the dot, that uploads must carry (default: "doc")
    pub required_extension: String,

    /// Converter executable, bare name or absolute path (default: "catdoc")
    pub converter_program: String,

    /// Shown to clients when the converter cannot be found
    pub converter_install_hint: String,

    /// Kill the converter after this many seconds; 0 disables (default: 120)
    pub converter_timeout_secs: u64,

    /// Upper bound on concurrent converter processes
    pub max_workers: usize,

    /// Parent directory for per-request staging directories (default: OS temp dir)
    pub staging_dir: Option<PathBuf>,

    /// How long shutdown waits for running conversions (default: 30)
    pub pool_drain_timeout_secs: u64,

    /// Allowed CORS Origins (comma separated, "*" for any)
    pub allowed_origins: Vec<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            max_upload_size: 64 * 1024 * 1024, // 64 MB
            required_extension: "doc".to_string(),
            converter_program: "catdoc".to_string(),
            converter_install_hint: "sudo apt install catdoc".to_string(),
            converter_timeout_secs: 120,
            max_workers: default_workers(),
            staging_dir: None,
            pool_drain_timeout_secs: 30,
            allowed_origins: vec!["*".to_string()],
        }
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

impl ServiceConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            host: env::var("HOST").unwrap_or(default.host),

            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.port),

            max_upload_size: env::var("MAX_UPLOAD_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_upload_size),

            required_extension: env::var("REQUIRED_EXTENSION")
                .map(|v| v.trim_start_matches('.').to_lowercase())
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or(default.required_extension),

            converter_program: env::var("CONVERTER_PROGRAM").unwrap_or(default.converter_program),

            converter_install_hint: env::var("CONVERTER_INSTALL_HINT")
                .unwrap_or(default.converter_install_hint),

            converter_timeout_secs: env::var("CONVERTER_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.converter_timeout_secs),

            max_workers: env::var("MAX_WORKERS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(default.max_workers),

            staging_dir: env::var("STAGING_DIR").ok().map(PathBuf::from),

            pool_drain_timeout_secs: env::var("POOL_DRAIN_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.pool_drain_timeout_secs),

            allowed_origins: env::var("ALLOWED_ORIGINS")
                .ok()
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(default.allowed_origins),
        }
    }

    pub fn converter_timeout(&self) -> Option<Duration> {
        match self.converter_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn pool_drain_timeout(&self) -> Duration {
        Duration::from_secs(self.pool_drain_timeout_secs)
    }

    pub fn staging_root(&self) -> PathBuf {
        self.staging_dir.clone().unwrap_or_else(env::temp_dir)
    }
}

//! Server configuration.
//!
//! Everything the handler needs from the environment is resolved once at
//! startup into an immutable [`ServerConfig`], built via
//! [`ServerConfigBuilder`] and shared behind an `Arc` in the router state.
//! Handlers never read environment variables themselves.

use crate::error::WatermarkError;
use crate::operation::{OperationRegistry, OperationSpec};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default listen port.
pub const DEFAULT_PORT: u16 = 3200;

/// Name of the scripts directory looked up beside the executable.
pub const TOOLS_DIR_NAME: &str = "tools";

/// Default request body limit: 25 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Configuration for the watermark server.
///
/// # Example
/// ```rust
/// use pdf_watermark_api::ServerConfig;
///
/// let config = ServerConfig::builder()
///     .port(8080)
///     .python_bin("python3")
///     .tools_dir("/opt/watermark/tools")
///     .build()
///     .unwrap();
/// assert_eq!(config.port, 8080);
/// ```
#[derive(Clone)]
pub struct ServerConfig {
    /// Bind address. Default: `0.0.0.0`.
    pub host: IpAddr,

    /// Listen port. Default: 3200.
    pub port: u16,

    /// Interpreter used to run the watermark scripts.
    /// Default: `python` on Windows, `python3` elsewhere.
    pub python_bin: String,

    /// Directory that relative operation scripts are resolved against.
    /// Default: `tools` next to the server executable, independent of the
    /// working directory the server was started from.
    pub tools_dir: PathBuf,

    /// Where upload and output scratch files are created. Default: the OS temp dir.
    pub scratch_dir: PathBuf,

    /// Maximum request body size in bytes. Default: 25 MiB.
    pub max_upload_bytes: usize,

    /// Kill the transformer after this long. Default: None (wait indefinitely).
    pub transform_timeout: Option<Duration>,

    /// Operations served under `/watermark/{operation}`.
    pub operations: OperationRegistry,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            python_bin: default_python_bin().to_string(),
            tools_dir: default_tools_dir(),
            scratch_dir: std::env::temp_dir(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            transform_timeout: None,
            operations: OperationRegistry::builtin(),
        }
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("python_bin", &self.python_bin)
            .field("tools_dir", &self.tools_dir)
            .field("scratch_dir", &self.scratch_dir)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("transform_timeout", &self.transform_timeout)
            .field("operations", &self.operations.names().collect::<Vec<_>>())
            .finish()
    }
}

impl ServerConfig {
    /// Create a new builder for `ServerConfig`.
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Resolve an operation's script against `tools_dir`.
    pub fn script_path(&self, spec: &OperationSpec) -> PathBuf {
        self.tools_dir.join(&spec.script)
    }
}

/// Builder for [`ServerConfig`].
#[derive(Debug)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    pub fn host(mut self, host: IpAddr) -> Self {
        self.config.host = host;
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set the interpreter. Surrounding whitespace and quotes are stripped;
    /// an empty value falls back to the platform default.
    pub fn python_bin(mut self, bin: impl AsRef<str>) -> Self {
        self.config.python_bin = resolve_python_bin(Some(bin.as_ref()));
        self
    }

    pub fn tools_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.tools_dir = dir.into();
        self
    }

    pub fn scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.scratch_dir = dir.into();
        self
    }

    pub fn max_upload_bytes(mut self, bytes: usize) -> Self {
        self.config.max_upload_bytes = bytes;
        self
    }

    pub fn transform_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.transform_timeout = timeout;
        self
    }

    pub fn operations(mut self, operations: OperationRegistry) -> Self {
        self.config.operations = operations;
        self
    }

    /// Register an extra operation alongside the current ones.
    pub fn operation(mut self, name: impl Into<String>, spec: OperationSpec) -> Self {
        self.config.operations.insert(name, spec);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServerConfig, WatermarkError> {
        let c = &self.config;
        if c.port == 0 {
            return Err(WatermarkError::InvalidConfig(
                "port must be between 1 and 65535".into(),
            ));
        }
        if c.max_upload_bytes == 0 {
            return Err(WatermarkError::InvalidConfig(
                "upload limit must be at least 1 byte".into(),
            ));
        }
        if c.transform_timeout == Some(Duration::ZERO) {
            return Err(WatermarkError::InvalidConfig(
                "transform timeout must be positive".into(),
            ));
        }
        if c.operations.is_empty() {
            return Err(WatermarkError::InvalidConfig(
                "at least one watermark operation must be registered".into(),
            ));
        }
        Ok(self.config)
    }
}

/// Platform interpreter used when no override is given.
pub fn default_python_bin() -> &'static str {
    if cfg!(windows) {
        "python"
    } else {
        "python3"
    }
}

/// `tools/` beside the running executable.
///
/// Falls back to a working-directory-relative `tools` only when the
/// executable's location cannot be determined.
pub fn default_tools_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_default()
        .join(TOOLS_DIR_NAME)
}

/// Normalise an interpreter override such as `PY_BIN`.
///
/// Windows users often paste `"C:\Python312\python.exe"` with the quotes
/// included; one surrounding pair is removed.
pub fn resolve_python_bin(raw: Option<&str>) -> String {
    let trimmed = raw.map(str::trim).unwrap_or_default();
    let unquoted = trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(trimmed);

    if unquoted.is_empty() {
        default_python_bin().to_string()
    } else {
        unquoted.to_string()
    }
}

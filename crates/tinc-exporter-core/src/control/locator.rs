//! Locates a tinc daemon's pidfile and control socket, and reads the pidfile.

use std::fmt;
use std::path::{Path, PathBuf};

use tinc_exporter_config::{SocketNaming, TincConfig};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::error::ControlError;
use crate::scan::{DecodeError, Fields};

/// Control channel authentication cookie. Zeroized on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Cookie(String);

impl Cookie {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw cookie, for the handshake line only.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Cookie([REDACTED])")
    }
}

/// The running daemon as described by its pidfile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonDescriptor {
    pub pid: u32,
    pub cookie: Cookie,
    pub host: String,
    pub port: String,
}

impl DaemonDescriptor {
    /// Parse the pidfile contents: `<pid> <cookie> <host> port <port>`.
    pub fn parse(contents: &str) -> Result<Self, DecodeError> {
        let line = contents.lines().next().unwrap_or_default();
        let mut f = Fields::new(line);
        let pid = f.parse("pid")?;
        let cookie = Cookie::new(f.text("cookie")?);
        let host = f.text("host")?.to_string();
        f.literal("port")?;
        let port = f.text("port")?.to_string();
        f.finish()?;
        Ok(Self {
            pid,
            cookie,
            host,
            port,
        })
    }
}

/// Resolves runtime file paths for one tinc network.
#[derive(Debug, Clone)]
pub struct Locator {
    run_dir: PathBuf,
    network: String,
    socket_naming: SocketNaming,
    socket_override: Option<PathBuf>,
}

impl Locator {
    pub fn new(run_dir: impl Into<PathBuf>, network: impl Into<String>) -> Self {
        Self {
            run_dir: run_dir.into(),
            network: network.into(),
            socket_naming: SocketNaming::default(),
            socket_override: None,
        }
    }

    pub fn from_config(config: &TincConfig) -> Self {
        Self {
            run_dir: config.run_dir.clone(),
            network: config.network.clone(),
            socket_naming: config.socket_naming,
            socket_override: config.socket_path.clone(),
        }
    }

    pub fn with_socket_naming(mut self, naming: SocketNaming) -> Self {
        self.socket_naming = naming;
        self
    }

    pub fn with_socket_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.socket_override = Some(path.into());
        self
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    /// `tinc.pid` or `tinc.<network>.pid`.
    fn file_name(&self, ext: &str) -> String {
        if self.network.is_empty() {
            format!("tinc.{ext}")
        } else {
            format!("tinc.{}.{ext}", self.network)
        }
    }

    pub fn pidfile_path(&self) -> PathBuf {
        self.run_dir.join(self.file_name("pid"))
    }

    pub fn socket_path(&self) -> PathBuf {
        if let Some(path) = &self.socket_override {
            return path.clone();
        }
        // The legacy convention reuses the pidfile name for the default network.
        let ext = match self.socket_naming {
            SocketNaming::Legacy if self.network.is_empty() => "pid",
            _ => "socket",
        };
        self.run_dir.join(self.file_name(ext))
    }

    /// Read and parse the pidfile. Never cached: tincd rotates the cookie
    /// and pid on every restart.
    pub async fn read_descriptor(&self) -> Result<DaemonDescriptor, ControlError> {
        let path = self.pidfile_path();
        let contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| ControlError::StateFileUnavailable {
                path: path.clone(),
                source,
            })?;
        DaemonDescriptor::parse(&contents)
            .map_err(|source| ControlError::StateFileMalformed { path, source })
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }
}

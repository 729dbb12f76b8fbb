//! Runtime configuration handed to the server at startup

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Log filter used when `RUST_LOG` is unset; includes one line per request
pub const DEFAULT_LOG_FILTER: &str = "blogserve=info,tower_http=info";

/// Log filter used with `--debug`
pub const DEBUG_LOG_FILTER: &str = "blogserve=debug,tower_http=debug,info";

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Content root, one subdirectory per post
    pub root: PathBuf,
    /// Host or IP address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Built frontend bundle, served for every path the API does not handle
    pub frontend_dir: PathBuf,
    /// Collapse bursts of changes into one reload (off by default)
    pub debounce: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            host: "localhost".to_string(),
            port: 8080,
            frontend_dir: PathBuf::from("frontend/dist"),
            debounce: None,
        }
    }
}

impl ServerConfig {
    /// Address to bind, mapping "localhost" to the loopback IP
    pub fn bind_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        let ip = if self.host == "localhost" {
            "127.0.0.1"
        } else {
            &self.host
        };
        format!("{}:{}", ip, self.port).parse()
    }

    /// URL shown to the user on startup
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

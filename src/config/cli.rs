//! Command-line arguments layered over the config file.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::loader::{read_config, ConfigError};
use crate::config::schema::{HttpListenerConfig, LogLevel, LogMode, ProxyConfig, TlsListenerConfig};
use crate::config::validation::validate_config;
use crate::security::auth::AuthPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AuthKind {
    None,
    Basic,
}

#[derive(Debug, Parser)]
#[command(name = "forward-proxy")]
#[command(about = "Forward HTTP proxy and CONNECT tunnel server", long_about = None)]
pub struct Cli {
    /// TOML config file; flags below override its values
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to bind listeners on
    #[arg(short, long)]
    pub bind: Option<String>,

    /// Plain HTTP port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// HTTPS port (needs --cert and --key)
    #[arg(long, requires_all = ["cert", "key"])]
    pub https_port: Option<u16>,

    /// PEM certificate for the HTTPS listener
    #[arg(long)]
    pub cert: Option<String>,

    /// PEM private key for the HTTPS listener
    #[arg(long)]
    pub key: Option<String>,

    /// Outbound dial/request deadline in milliseconds
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Client authentication scheme
    #[arg(long, value_enum)]
    pub auth: Option<AuthKind>,

    #[arg(short, long)]
    pub username: Option<String>,

    #[arg(long)]
    pub password: Option<String>,

    #[arg(long, value_enum)]
    pub log_mode: Option<LogMode>,

    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Directory for the log file
    #[arg(long)]
    pub log_dir: Option<String>,
}

impl Cli {
    /// Defaults, then the config file, then flags; validated last.
    pub fn load(&self) -> Result<ProxyConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => read_config(path)?,
            None => ProxyConfig::default(),
        };
        self.apply(&mut config);
        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }

    fn apply(&self, config: &mut ProxyConfig) {
        if let Some(bind) = &self.bind {
            config.listener.bind_address = bind.clone();
        }
        if let Some(port) = self.port {
            config.listener.http = Some(HttpListenerConfig { port });
        }
        if let (Some(port), Some(cert), Some(key)) = (self.https_port, &self.cert, &self.key) {
            config.listener.https = Some(TlsListenerConfig {
                port,
                cert_path: cert.clone(),
                key_path: key.clone(),
            });
        }
        if let Some(timeout) = self.timeout {
            config.timeout_ms = timeout;
        }

        match self.auth {
            Some(AuthKind::None) => config.auth = AuthPolicy::None,
            Some(AuthKind::Basic) => {
                config.auth = AuthPolicy::Basic {
                    username: self.username.clone().unwrap_or_default(),
                    password: self.password.clone().unwrap_or_default(),
                }
            }
            None => {
                if let AuthPolicy::Basic { username, password } = &mut config.auth {
                    if let Some(u) = &self.username {
                        *username = u.clone();
                    }
                    if let Some(p) = &self.password {
                        *password = p.clone();
                    }
                }
            }
        }

        if let Some(mode) = self.log_mode {
            config.logging.mode = mode;
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
        if let Some(dir) = &self.log_dir {
            config.logging.dir = dir.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn flags_without_file() {
        let cli = Cli::parse_from([
            "forward-proxy",
            "--port",
            "3128",
            "--timeout",
            "750",
            "--auth",
            "basic",
            "-u",
            "alice",
            "--password",
            "secret",
            "--log-mode",
            "disable",
        ]);
        let config = cli.load().unwrap();

        assert_eq!(config.listener.http.map(|h| h.port), Some(3128));
        assert_eq!(config.timeout_ms, 750);
        assert_eq!(
            config.auth,
            AuthPolicy::Basic {
                username: "alice".into(),
                password: "secret".into()
            }
        );
        assert_eq!(config.logging.mode, LogMode::Disable);
    }

    #[test]
    fn flags_override_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "timeout_ms = 100\n[auth]\ntype = \"basic\"\nusername = \"bob\"\npassword = \"old\""
        )
        .unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let cli = Cli::parse_from(["forward-proxy", "--config", &path, "--password", "new"]);
        let config = cli.load().unwrap();

        assert_eq!(config.timeout_ms, 100);
        assert_eq!(
            config.auth,
            AuthPolicy::Basic {
                username: "bob".into(),
                password: "new".into()
            }
        );
    }

    #[test]
    fn https_port_requires_material() {
        assert!(Cli::try_parse_from(["forward-proxy", "--https-port", "8443"]).is_err());
    }

    #[test]
    fn invalid_result_is_rejected() {
        let cli = Cli::parse_from(["forward-proxy", "--timeout", "0"]);
        assert!(matches!(cli.load(), Err(ConfigError::Validation(_))));
    }
}

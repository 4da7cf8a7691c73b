use std::{fmt, time::Duration};

use clap::{ArgAction, Parser};

use crate::error::ProxyError;

const LISTENER_GRACE: Duration = Duration::from_secs(1);

/// Reverse proxy that exposes a browser's remote-debugging port through an external ingress.
#[derive(Parser, Debug, Clone)]
#[command(name = "devtools-ingress-proxy")]
#[command(version)]
pub(crate) struct Args {
    /// Host the debugged browser listens on
    #[arg(long, env = "CDP_PROXY_TARGET_HOST", default_value = "localhost")]
    pub(crate) target_host: String,

    /// Remote-debugging port of the browser
    #[arg(long, env = "CDP_PROXY_TARGET_PORT", default_value_t = 9222)]
    pub(crate) target_port: u16,

    /// Interface the proxy binds to
    #[arg(long, env = "CDP_PROXY_LISTEN_HOST", default_value = "0.0.0.0")]
    pub(crate) listen_host: String,

    /// Port the proxy listens on
    #[arg(long, env = "CDP_PROXY_LISTEN_PORT", default_value_t = 9223)]
    pub(crate) listen_port: u16,

    /// Enable debug logging
    #[arg(long, env = "CDP_PROXY_DEBUG", default_value_t = true, action = ArgAction::Set)]
    pub(crate) debug: bool,

    /// Timeout in seconds for discovery fetches and listener deadlines
    #[arg(long, env = "CDP_PROXY_TIMEOUT", default_value_t = 30)]
    pub(crate) timeout: u64,
}

/// The debugged process's internal address, resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct UpstreamTarget {
    pub(crate) host: String,
    pub(crate) port: u16,
}

impl UpstreamTarget {
    pub(crate) fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub(crate) fn authority(&self) -> String {
        self.to_string()
    }

    pub(crate) fn base_url(&self) -> String {
        format!("http://{}", self.authority())
    }
}

impl fmt::Display for UpstreamTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ProxyConfig {
    pub(crate) target: UpstreamTarget,
    pub(crate) listen_host: String,
    pub(crate) listen_port: u16,
    pub(crate) request_timeout: Duration,
    pub(crate) debug_enabled: bool,
}

impl ProxyConfig {
    pub(crate) fn from_args(args: Args) -> Result<Self, ProxyError> {
        if args.timeout == 0 {
            return Err(ProxyError::Config(
                "timeout must be at least one second".to_string(),
            ));
        }
        if args.target_host.trim().is_empty() {
            return Err(ProxyError::Config("target host must not be empty".to_string()));
        }

        Ok(Self {
            target: UpstreamTarget::new(args.target_host.trim(), args.target_port),
            listen_host: args.listen_host,
            listen_port: args.listen_port,
            request_timeout: Duration::from_secs(args.timeout),
            debug_enabled: args.debug,
        })
    }

    pub(crate) fn listen_addr(&self) -> String {
        format!("{}:{}", self.listen_host, self.listen_port)
    }

    /// Deadline for producing a response head. Always longer than the upstream
    /// client timeout, which must fire first.
    pub(crate) fn listener_timeout(&self) -> Duration {
        self.request_timeout + LISTENER_GRACE
    }

    /// Default filter directive for the log subscriber; `RUST_LOG` takes precedence.
    pub(crate) fn log_filter(&self) -> &'static str {
        if self.debug_enabled {
            "debug"
        } else {
            "warn"
        }
    }

    /// Fallback external authority for requests that arrive without a Host header.
    pub(crate) fn default_public_authority(&self) -> String {
        format!("localhost:{}", self.listen_port)
    }
}

#[cfg(test)]
impl ProxyConfig {
    pub(crate) fn for_target(port: u16) -> Self {
        Self {
            target: UpstreamTarget::new("127.0.0.1", port),
            listen_host: "127.0.0.1".to_string(),
            listen_port: 0,
            request_timeout: Duration::from_secs(5),
            debug_enabled: false,
        }
    }
}

//! Service configuration from command-line flags and environment variables

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use clap::{Args, ValueEnum};

use crate::audit::AuditLog;
use crate::distribute::Distributor;
use crate::pdf::StampOptions;
use crate::store::DocumentStore;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

/// Settings for the HTTP service
#[derive(Debug, Clone, Args)]
pub struct ServerConfig {
    /// Address to bind
    #[arg(long, env = "BIND_ADDR", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub bind: IpAddr,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Directory holding the distributable PDFs
    #[arg(long, env = "DOCUMENTS_DIR", default_value = "documents")]
    pub documents_dir: PathBuf,

    /// Append-only download log file
    #[arg(long, env = "AUDIT_LOG_PATH", default_value = "logs/pdf-downloads.log")]
    pub audit_log: PathBuf,

    /// Written as Producer/Creator of every stamped PDF
    #[arg(long, env = "PLATFORM_NAME", default_value = "Quiz Platform")]
    pub platform_name: String,
}

impl ServerConfig {
    pub fn address(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    pub fn stamp_options(&self) -> StampOptions {
        StampOptions {
            platform_name: self.platform_name.clone(),
            ..Default::default()
        }
    }

    /// Build the distribution pipeline described by this configuration
    pub fn distributor(&self) -> Distributor {
        Distributor::new(
            DocumentStore::new(&self.documents_dir),
            AuditLog::new(&self.audit_log),
            self.stamp_options(),
        )
    }
}

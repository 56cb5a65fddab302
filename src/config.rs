//! Collector configuration.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ErrorCode, GcError, GcResult};
use crate::models::{TenantId, VersionId};
use crate::storage::BinaryLayout;

/// Default storage root holding one directory per tenant.
pub const DEFAULT_ROOT: &str = "/data/csi";

/// Default seconds between collection cycles.
pub const DEFAULT_INTERVAL_SECS: u64 = 300;

/// Default number of tenant passes run at once.
pub const DEFAULT_CONCURRENCY: usize = 1;

/// Command-line arguments for the collector.
#[derive(Parser, Debug, Clone)]
#[command(name = "binary-gc")]
#[command(about = "Reclaims disk space held by unused agent binary versions")]
#[command(version)]
pub struct Args {
    /// Storage root containing `<tenant>/bin/<version>` directories.
    #[arg(long, short = 'r', default_value = DEFAULT_ROOT)]
    pub root: PathBuf,

    /// Seconds between collection cycles.
    #[arg(long, default_value_t = DEFAULT_INTERVAL_SECS)]
    pub interval_secs: u64,

    /// Run a single cycle, print its report and exit.
    #[arg(long)]
    pub once: bool,

    /// Version that must never be deleted. May be repeated.
    #[arg(long = "pin", value_name = "VERSION")]
    pub pinned: Vec<String>,

    /// JSON document mapping tenants to their used versions.
    #[arg(long, short = 'u')]
    pub usage_file: Option<PathBuf>,

    /// Restrict collection to these tenants. May be repeated.
    /// Without it every directory under the root is treated as a tenant.
    #[arg(long = "tenant", value_name = "TENANT")]
    pub tenants: Vec<String>,

    /// Number of tenant passes run at once.
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Report what would be deleted without deleting.
    #[arg(long)]
    pub dry_run: bool,

    /// Serve Prometheus metrics on this address, e.g. `0.0.0.0:9100`.
    #[arg(long, value_name = "ADDR")]
    pub metrics_addr: Option<SocketAddr>,

    /// Enable debug logging.
    #[arg(long, short = 'd')]
    pub debug: bool,

    /// Enable silent mode (minimal logging).
    #[arg(long, short = 's')]
    pub silent: bool,
}

/// Collector configuration derived from command-line arguments.
#[derive(Debug, Clone)]
pub struct Config {
    /// Storage root.
    pub root: PathBuf,
    /// Time between collection cycles.
    pub interval: Duration,
    /// Versions exempt from deletion.
    pub pinned_versions: Vec<VersionId>,
    /// Usage document, when usage comes from a file.
    pub usage_file: Option<PathBuf>,
    /// Tenants to collect; empty means discover from the root.
    pub tenants: Vec<TenantId>,
    /// Number of tenant passes run at once.
    pub concurrency: usize,
    /// Report without deleting.
    pub dry_run: bool,
    /// Prometheus scrape address; metrics are not exported without it.
    pub metrics_addr: Option<SocketAddr>,
    /// Enable debug logging.
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: PathBuf::from(DEFAULT_ROOT),
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
            pinned_versions: Vec::new(),
            usage_file: None,
            tenants: Vec::new(),
            concurrency: DEFAULT_CONCURRENCY,
            dry_run: false,
            metrics_addr: None,
            debug: false,
        }
    }
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Self {
            root: args.root,
            interval: Duration::from_secs(args.interval_secs),
            pinned_versions: args.pinned.into_iter().map(VersionId::from).collect(),
            usage_file: args.usage_file,
            tenants: args.tenants.into_iter().map(TenantId::from).collect(),
            concurrency: args.concurrency,
            dry_run: args.dry_run,
            metrics_addr: args.metrics_addr,
            debug: args.debug,
        }
    }
}

impl Config {
    /// Returns the storage layout rooted at [`Config::root`].
    pub fn layout(&self) -> BinaryLayout {
        BinaryLayout::new(self.root.clone())
    }

    pub fn validate(&self) -> GcResult<()> {
        if self.interval.is_zero() {
            return Err(GcError::with_message(
                ErrorCode::InvalidConfig,
                "interval must be greater than zero",
            ));
        }
        if self.concurrency == 0 {
            return Err(GcError::with_message(
                ErrorCode::InvalidConfig,
                "concurrency must be at least 1",
            ));
        }
        Ok(())
    }
}

//! Environment-driven configuration, collected once at startup.
//!
//! Every tunable of the arbitration core lives here so tests can build a
//! config by hand instead of reading the process environment.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::models::domain::Domain;

/// Default domain priorities, highest first. Business criticality, not
/// mechanism: overridable via `SYNC_PRIORITIES` (e.g. "orders=60,prices=5").
pub mod default_priorities {
    pub const ORDERS: i32 = 60;
    pub const CUSTOMERS: i32 = 50;
    pub const TRANSPORT_DOCUMENTS: i32 = 40;
    pub const INVOICES: i32 = 30;
    pub const PRODUCTS: i32 = 20;
    pub const PRICES: i32 = 10;
}

/// Default minimum intervals between scheduled syncs (in seconds)
pub mod default_intervals {
    pub const ORDERS: u64 = 3600; // 1 hour
    pub const CUSTOMERS: u64 = 21600; // 6 hours
    pub const TRANSPORT_DOCUMENTS: u64 = 21600; // 6 hours
    pub const INVOICES: u64 = 21600; // 6 hours
    pub const PRODUCTS: u64 = 86400; // 24 hours (registry rarely changes)
    pub const PRICES: u64 = 86400; // 24 hours
}

#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of browser processes (N)
    pub processes: usize,
    /// Sessions per process (M); total capacity is N x M
    pub sessions_per_process: usize,
    /// Leases older than this are revalidated/recreated instead of reused
    pub lease_expiry: Duration,
    /// Upper bound on one session-validation round trip
    pub validation_timeout: Duration,
    /// DevTools port of process 0; process i listens on base + i
    pub devtools_base_port: u16,
    pub chromium_binary: String,
    /// Cookie names that must be present and unexpired for a session to count
    /// as logged in
    pub required_cookies: Vec<String>,
    /// Cookie scope of the ERP, e.g. "https://erp.example.com"
    pub erp_origin: String,
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// A domain completed within this window is skipped as a no-op
    pub freshness_window: Duration,
    /// Safety valve: a leaked fast path is force-ended after this long
    pub fast_path_timeout: Duration,
    /// Priority used when the fast path preempts the queue
    pub fast_path_priority: i32,
    /// ERP login used for background sync sessions
    pub sync_user: String,
    pub priorities: HashMap<Domain, i32>,
    pub intervals: HashMap<Domain, Duration>,
}

impl SyncConfig {
    pub fn priority_for(&self, domain: Domain) -> i32 {
        self.priorities.get(&domain).copied().unwrap_or(0)
    }

    pub fn interval_for(&self, domain: Domain) -> Duration {
        self.intervals
            .get(&domain)
            .copied()
            .unwrap_or(Duration::from_secs(21600))
    }
}

#[derive(Debug, Clone)]
pub struct OrderQueueConfig {
    /// Poll interval while waiting for the sync slot to free up
    pub lock_wait_interval: Duration,
    /// Give up (LockTimeout) after this many waits
    pub lock_max_attempts: u32,
    /// Bounded depth of the enqueue channel
    pub queue_depth: usize,
    /// Upper bound on one ERP order interaction
    pub order_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub database_url: String,
    pub bind_addr: String,
    /// Base URL of the automation bot sidecar
    pub bot_base_url: String,
    /// Directory holding the PDF parser scripts
    pub parser_script_dir: PathBuf,
    pub pool: PoolConfig,
    pub sync: SyncConfig,
    pub orders: OrderQueueConfig,
}

impl BridgeConfig {
    pub fn from_env() -> Self {
        let priorities = parse_domain_table(
            &env::var("SYNC_PRIORITIES").unwrap_or_default(),
            HashMap::from([
                (Domain::Orders, default_priorities::ORDERS),
                (Domain::Customers, default_priorities::CUSTOMERS),
                (
                    Domain::TransportDocuments,
                    default_priorities::TRANSPORT_DOCUMENTS,
                ),
                (Domain::Invoices, default_priorities::INVOICES),
                (Domain::Products, default_priorities::PRODUCTS),
                (Domain::Prices, default_priorities::PRICES),
            ]),
        );

        let intervals = parse_domain_table(
            &env::var("SYNC_INTERVALS_SECS").unwrap_or_default(),
            HashMap::from([
                (Domain::Orders, default_intervals::ORDERS),
                (Domain::Customers, default_intervals::CUSTOMERS),
                (
                    Domain::TransportDocuments,
                    default_intervals::TRANSPORT_DOCUMENTS,
                ),
                (Domain::Invoices, default_intervals::INVOICES),
                (Domain::Products, default_intervals::PRODUCTS),
                (Domain::Prices, default_intervals::PRICES),
            ]),
        )
        .into_iter()
        .map(|(d, secs)| (d, Duration::from_secs(secs)))
        .collect();

        Self {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            bind_addr: env_or("BIND_ADDR", "0.0.0.0:3000".to_string()),
            bot_base_url: env_or("BOT_BASE_URL", "http://127.0.0.1:4815".to_string()),
            parser_script_dir: PathBuf::from(env_or(
                "PARSER_SCRIPT_DIR",
                "./scripts".to_string(),
            )),
            pool: PoolConfig {
                processes: env_or("POOL_PROCESSES", 3),
                sessions_per_process: env_or("POOL_SESSIONS_PER_PROCESS", 2),
                lease_expiry: Duration::from_secs(env_or("POOL_LEASE_EXPIRY_SECS", 900)),
                validation_timeout: Duration::from_secs(env_or(
                    "POOL_VALIDATION_TIMEOUT_SECS",
                    5,
                )),
                devtools_base_port: env_or("POOL_DEVTOOLS_BASE_PORT", 9301),
                chromium_binary: env_or("CHROMIUM_BINARY", "chromium".to_string()),
                required_cookies: env_or(
                    "ERP_REQUIRED_COOKIES",
                    "ASP.NET_SessionId,.ASPXAUTH".to_string(),
                )
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
                erp_origin: env_or("ERP_ORIGIN", "https://archibald.example.com".to_string()),
            },
            sync: SyncConfig {
                freshness_window: Duration::from_secs(env_or("SYNC_FRESHNESS_SECS", 3600)),
                fast_path_timeout: Duration::from_secs(env_or("FAST_PATH_TIMEOUT_SECS", 1200)),
                fast_path_priority: env_or("FAST_PATH_PRIORITY", 1000),
                sync_user: env_or("SYNC_USER", "sync-service".to_string()),
                priorities,
                intervals,
            },
            orders: OrderQueueConfig {
                lock_wait_interval: Duration::from_millis(env_or(
                    "ORDER_LOCK_WAIT_INTERVAL_MS",
                    500,
                )),
                lock_max_attempts: env_or("ORDER_LOCK_MAX_ATTEMPTS", 120),
                queue_depth: env_or("ORDER_QUEUE_DEPTH", 64),
                order_timeout: Duration::from_secs(env_or("ORDER_TIMEOUT_SECS", 300)),
            },
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse "orders=60,customers=50" style overrides on top of defaults.
fn parse_domain_table<T: FromStr + Copy>(
    raw: &str,
    mut table: HashMap<Domain, T>,
) -> HashMap<Domain, T> {
    for pair in raw.split(',') {
        let Some((name, value)) = pair.split_once('=') else {
            continue;
        };
        let (Some(domain), Ok(value)) = (Domain::parse(name.trim()), value.trim().parse()) else {
            tracing::warn!("Ignoring malformed domain override: {}", pair);
            continue;
        };
        table.insert(domain, value);
    }
    table
}

//! Worker configuration, read from the environment at startup.

use std::collections::HashMap;

use uuid::Uuid;
use vmforge_hypervisor::mapping::TenantResourceMapping;

use crate::error::WorkerError;

/// Which hypervisor backend the worker drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HypervisorKind {
    /// The in-process development backend, with a VM slot capacity.
    Dev {
        /// Maximum number of VMs the dev backend will hold.
        capacity: usize,
    },
}

/// Validated worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// PostgreSQL connection string.
    pub database_url: String,
    /// Feed poll interval in milliseconds.
    pub poll_interval_ms: u64,
    /// Maximum feed entries fetched per poll.
    pub feed_batch_size: i64,
    /// The system identity saga transitions are recorded under.
    pub actor_id: Uuid,
    /// The backend to drive.
    pub hypervisor: HypervisorKind,
    /// The resource mapping served to every tenant.
    pub mapping: TenantResourceMapping,
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_owned())
}

fn parse_env<T: std::str::FromStr>(name: &str, default: &str) -> Result<T, WorkerError>
where
    T::Err: std::fmt::Display,
{
    env_or(name, default)
        .parse()
        .map_err(|e| WorkerError::Config(format!("{name} is invalid: {e}")))
}

/// Parses a `name=id,name=id` network table.
pub(crate) fn parse_networks(raw: &str) -> Result<HashMap<String, String>, WorkerError> {
    let mut networks = HashMap::new();
    for pair in raw.split(',').filter(|p| !p.trim().is_empty()) {
        let (name, id) = pair.split_once('=').ok_or_else(|| {
            WorkerError::Config(format!(
                "VMFORGE_NETWORKS entry {pair:?} is not of the form name=id"
            ))
        })?;
        networks.insert(name.trim().to_owned(), id.trim().to_owned());
    }
    if networks.is_empty() {
        return Err(WorkerError::Config(
            "VMFORGE_NETWORKS must define at least one network".into(),
        ));
    }
    Ok(networks)
}

impl WorkerConfig {
    /// Reads and validates the configuration from the environment.
    ///
    /// # Errors
    ///
    /// Returns `WorkerError::Config` for a missing `DATABASE_URL`, an
    /// unknown hypervisor backend, or an inconsistent resource mapping.
    pub fn from_env() -> Result<Self, WorkerError> {
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| WorkerError::Config("DATABASE_URL must be set".into()))?;

        let poll_interval_ms = parse_env("VMFORGE_POLL_INTERVAL_MS", "1000")?;
        let feed_batch_size = parse_env("VMFORGE_FEED_BATCH_SIZE", "50")?;
        let actor_id = parse_env("VMFORGE_ACTOR_ID", &Uuid::nil().to_string())?;

        let hypervisor = match env_or("VMFORGE_HYPERVISOR", "dev").as_str() {
            "dev" => HypervisorKind::Dev {
                capacity: parse_env("VMFORGE_DEV_CAPACITY", "32")?,
            },
            other => {
                return Err(WorkerError::Config(format!(
                    "unknown hypervisor backend {other:?}; supported: dev"
                )));
            }
        };

        let networks = parse_networks(&env_or("VMFORGE_NETWORKS", "default=dev-net"))?;
        let default_network = env_or("VMFORGE_DEFAULT_NETWORK", "default");
        if !networks.contains_key(&default_network) {
            return Err(WorkerError::Config(format!(
                "VMFORGE_DEFAULT_NETWORK {default_network:?} is not defined in VMFORGE_NETWORKS"
            )));
        }

        Ok(Self {
            database_url,
            poll_interval_ms,
            feed_batch_size,
            actor_id,
            hypervisor,
            mapping: TenantResourceMapping {
                compute_target: env_or("VMFORGE_COMPUTE_TARGET", "dev-compute"),
                datastore: env_or("VMFORGE_DATASTORE", "dev-storage"),
                networks,
                default_network,
            },
        })
    }
}

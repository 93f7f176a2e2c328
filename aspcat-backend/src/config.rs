//! Backend configuration: the per-backend settings block handed to
//! [`crate::manager::CatalogManager::open`], and the persisted
//! [`ConfigStore`] that records which backend is active and whether a
//! migration (dual-write) window is open.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::clock;
use crate::contract::{BackendError, BackendKind, HealthReport};
use crate::manager::CatalogManager;

// ── Per-backend settings ────────────────────────────────────────────────────

/// Settings for the JSON file backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileBackendConfig {
    pub file_path: PathBuf,
    /// Defaults to `<file_path>.backup` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_path: Option<PathBuf>,
}

impl FileBackendConfig {
    pub fn backup_path(&self) -> PathBuf {
        self.backup_path.clone().unwrap_or_else(|| {
            let mut path = self.file_path.clone().into_os_string();
            path.push(".backup");
            PathBuf::from(path)
        })
    }
}

fn default_pool_size() -> usize {
    5
}

fn default_max_overflow() -> usize {
    10
}

/// Settings for the SQLite backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqliteBackendConfig {
    pub path: PathBuf,
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    #[serde(default = "default_max_overflow")]
    pub max_overflow: usize,
}

/// Settings for a server-hosted relational backend. Parsed and persisted
/// so existing deployments keep their configuration, but opening such a
/// backend reports [`BackendError::Unsupported`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationalServerConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    #[serde(default = "default_max_overflow")]
    pub max_overflow: usize,
}

fn default_cache_type() -> String {
    "memory".to_string()
}

fn default_cache_max_size() -> usize {
    1000
}

fn default_cache_ttl() -> u64 {
    300
}

/// Cache settings attached to a manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(rename = "type", default = "default_cache_type")]
    pub cache_type: String,
    #[serde(default = "default_cache_max_size")]
    pub max_size: usize,
    /// Fallback TTL in seconds when a call site doesn't pass one.
    #[serde(default = "default_cache_ttl")]
    pub default_ttl: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            cache_type: default_cache_type(),
            max_size: default_cache_max_size(),
            default_ttl: default_cache_ttl(),
        }
    }
}

/// The full settings block for one manager: which backend, its settings,
/// and the cache in front of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagerConfig {
    pub backend: BackendKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_file: Option<FileBackendConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sqlite: Option<SqliteBackendConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postgresql: Option<RelationalServerConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mysql: Option<RelationalServerConfig>,
    #[serde(default)]
    pub cache: CacheConfig,
    /// Where migration backups land. Defaults to `/tmp/catalog_backups`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_location: Option<PathBuf>,
}

impl ManagerConfig {
    /// A file-backed configuration with the cache disabled.
    pub fn json_file(file_path: impl Into<PathBuf>) -> Self {
        Self {
            backend: BackendKind::JsonFile,
            json_file: Some(FileBackendConfig {
                file_path: file_path.into(),
                backup_path: None,
            }),
            sqlite: None,
            postgresql: None,
            mysql: None,
            cache: CacheConfig::default(),
            backup_location: None,
        }
    }

    /// A SQLite-backed configuration with the cache disabled.
    pub fn sqlite(path: impl Into<PathBuf>) -> Self {
        Self {
            backend: BackendKind::Sqlite,
            json_file: None,
            sqlite: Some(SqliteBackendConfig {
                path: path.into(),
                pool_size: default_pool_size(),
                max_overflow: default_max_overflow(),
            }),
            postgresql: None,
            mysql: None,
            cache: CacheConfig::default(),
            backup_location: None,
        }
    }

    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    pub fn backup_location(&self) -> PathBuf {
        self.backup_location
            .clone()
            .unwrap_or_else(|| PathBuf::from("/tmp/catalog_backups"))
    }
}

// ── Persisted store ─────────────────────────────────────────────────────────

/// Dual-write window settings while a migration is in flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationSettings {
    pub read_backend: BackendKind,
    pub write_backends: Vec<BackendKind>,
    pub started_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredConfig {
    active_backend: BackendKind,
    #[serde(default)]
    migration_mode: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    migration: Option<MigrationSettings>,
    /// Backend name → full manager settings for that backend.
    backends: BTreeMap<String, ManagerConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_at: Option<String>,
}

/// The persisted backend-selection file. Loading a missing file seeds a
/// default layout (JSON file active, SQLite configured alongside) under
/// the config file's directory.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    config: StoredConfig,
}

impl ConfigStore {
    /// Load the store from `path`, seeding defaults when the file does not
    /// exist yet.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, BackendError> {
        let path = path.into();
        let config = match std::fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(
                    "config file {} not found, seeding defaults",
                    path.display()
                );
                Self::default_config(path.parent().unwrap_or(Path::new(".")))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, config })
    }

    fn default_config(dir: &Path) -> StoredConfig {
        let mut backends = BTreeMap::new();
        backends.insert(
            BackendKind::JsonFile.as_str().to_string(),
            ManagerConfig::json_file(dir.join("catalog.json")),
        );
        backends.insert(
            BackendKind::Sqlite.as_str().to_string(),
            ManagerConfig::sqlite(dir.join("catalog.db")),
        );
        StoredConfig {
            active_backend: BackendKind::JsonFile,
            migration_mode: false,
            migration: None,
            backends,
            updated_at: None,
        }
    }

    pub fn save(&mut self) -> Result<(), BackendError> {
        self.config.updated_at = Some(clock::utc_now());
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(&self.config)?;
        std::fs::write(&self.path, contents)?;
        Ok(())
    }

    pub fn active_backend(&self) -> BackendKind {
        self.config.active_backend
    }

    pub fn migration_mode(&self) -> bool {
        self.config.migration_mode
    }

    pub fn migration_settings(&self) -> Option<&MigrationSettings> {
        self.config.migration.as_ref()
    }

    pub fn backend_config(&self, kind: BackendKind) -> Option<&ManagerConfig> {
        self.config.backends.get(kind.as_str())
    }

    /// Settings of the active backend. Missing entries fall back to the
    /// seeded default for that backend kind.
    pub fn active_config(&self) -> ManagerConfig {
        let kind = self.config.active_backend;
        self.backend_config(kind).cloned().unwrap_or_else(|| {
            warn!("no stored settings for active backend {kind}, using defaults");
            let dir = self.path.parent().unwrap_or(Path::new("."));
            match kind {
                BackendKind::Sqlite => ManagerConfig::sqlite(dir.join("catalog.db")),
                _ => ManagerConfig::json_file(dir.join("catalog.json")),
            }
        })
    }

    pub fn set_backend_config(&mut self, kind: BackendKind, config: ManagerConfig) {
        self.config.backends.insert(kind.as_str().to_string(), config);
    }

    pub fn set_active_backend(&mut self, kind: BackendKind) -> Result<(), BackendError> {
        match kind {
            BackendKind::Postgresql | BackendKind::Mysql => {
                return Err(BackendError::Unsupported(kind.as_str()));
            }
            _ => {}
        }
        info!("switching active backend to {kind}");
        self.config.active_backend = kind;
        self.save()
    }

    /// Open a dual-write window: reads stay on `read`, writes fan out to
    /// every backend in `writes`.
    pub fn enable_migration(
        &mut self,
        read: BackendKind,
        writes: Vec<BackendKind>,
    ) -> Result<(), BackendError> {
        if writes.is_empty() {
            return Err(BackendError::Validation(
                "migration mode needs at least one write backend".to_string(),
            ));
        }
        info!("enabling migration mode: read={read} writes={writes:?}");
        self.config.migration_mode = true;
        self.config.migration = Some(MigrationSettings {
            read_backend: read,
            write_backends: writes,
            started_at: clock::utc_now(),
        });
        self.save()
    }

    pub fn disable_migration(&mut self) -> Result<(), BackendError> {
        info!("disabling migration mode");
        self.config.migration_mode = false;
        self.config.migration = None;
        self.save()
    }

    /// Health-probe one configured backend. Unsupported kinds report
    /// `not_implemented`; probe failures become `unhealthy`, never `Err`.
    pub fn probe_backend(&self, kind: BackendKind) -> HealthReport {
        let Some(config) = self.backend_config(kind) else {
            return HealthReport::unhealthy(kind.as_str(), "not configured".to_string());
        };
        match CatalogManager::open(config) {
            Ok(manager) => {
                let report = manager.health_check();
                manager.close();
                report
            }
            Err(BackendError::Unsupported(name)) => HealthReport::not_implemented(name),
            Err(e) => HealthReport::unhealthy(kind.as_str(), e.to_string()),
        }
    }

    /// Snapshot of the store plus a live health probe per configured
    /// backend, shaped for JSON output.
    pub fn status(&self) -> serde_json::Value {
        let mut health = serde_json::Map::new();
        for name in self.config.backends.keys() {
            if let Some(kind) = BackendKind::from_str_loose(name) {
                let report = self.probe_backend(kind);
                health.insert(
                    name.clone(),
                    serde_json::to_value(report).unwrap_or(serde_json::Value::Null),
                );
            }
        }
        serde_json::json!({
            "active_backend": self.config.active_backend,
            "migration_mode": self.config.migration_mode,
            "migration": self.config.migration,
            "backends": health,
            "timestamp": clock::utc_now(),
        })
    }
}

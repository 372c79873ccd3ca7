mod file_config;

pub use file_config::{FileConfig, JobsConfig};

use anyhow::{bail, Result};
use std::path::PathBuf;

/// CLI arguments that participate in config resolution. Mirrors the subset
/// of CLI flags a TOML config can override.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub session_timeout_secs: u64,
    pub pending_order_ttl_secs: u64,
    pub scan_interval_secs: u64,
}

/// Fully resolved application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_dir: PathBuf,
    pub session_timeout_secs: u64,
    pub jobs: JobSettings,
}

#[derive(Debug, Clone)]
pub struct JobSettings {
    /// How long an order may stay pending before auto-cancellation.
    pub pending_order_ttl_secs: u64,
    /// Interval between auto-cancel scans.
    pub scan_interval_secs: u64,
    /// Retry budget after a failed run.
    pub max_retries: u32,
    pub initial_backoff_secs: u64,
    pub max_backoff_secs: u64,
    pub backoff_multiplier: f64,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            pending_order_ttl_secs: 3600,
            scan_interval_secs: 3600,
            max_retries: 6,
            initial_backoff_secs: 60,
            max_backoff_secs: 3600,
            backoff_multiplier: 2.0,
        }
    }
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file
    /// config. TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_dir must be specified via --db-dir or in config file")
            })?;

        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let session_timeout_secs = file
            .session_timeout_secs
            .unwrap_or(cli.session_timeout_secs);
        if session_timeout_secs == 0 {
            bail!("session_timeout_secs must be greater than zero");
        }

        let jobs_file = file.jobs.unwrap_or_default();
        let jobs = JobSettings {
            pending_order_ttl_secs: jobs_file
                .pending_order_ttl_secs
                .unwrap_or(cli.pending_order_ttl_secs),
            scan_interval_secs: jobs_file
                .scan_interval_secs
                .unwrap_or(cli.scan_interval_secs),
            max_retries: jobs_file.max_retries.unwrap_or(6),
            initial_backoff_secs: jobs_file.initial_backoff_secs.unwrap_or(60),
            max_backoff_secs: jobs_file.max_backoff_secs.unwrap_or(3600),
            backoff_multiplier: jobs_file.backoff_multiplier.unwrap_or(2.0),
        };
        if jobs.pending_order_ttl_secs == 0 {
            bail!("pending_order_ttl_secs must be greater than zero");
        }
        if jobs.scan_interval_secs == 0 {
            bail!("scan_interval_secs must be greater than zero");
        }

        Ok(Self {
            db_dir,
            session_timeout_secs,
            jobs,
        })
    }

    pub fn orders_db_path(&self) -> PathBuf {
        self.db_dir.join("orders.db")
    }

    pub fn scheduler_db_path(&self) -> PathBuf {
        self.db_dir.join("scheduler.db")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_cli(db_dir: &TempDir) -> CliConfig {
        CliConfig {
            db_dir: Some(db_dir.path().to_path_buf()),
            session_timeout_secs: 600,
            pending_order_ttl_secs: 3600,
            scan_interval_secs: 3600,
        }
    }

    #[test]
    fn test_resolve_cli_only() {
        let temp_dir = TempDir::new().unwrap();
        let cli = make_cli(&temp_dir);

        let config = AppConfig::resolve(&cli, None).unwrap();

        assert_eq!(config.db_dir, temp_dir.path());
        assert_eq!(config.session_timeout_secs, 600);
        assert_eq!(config.jobs.pending_order_ttl_secs, 3600);
        assert_eq!(config.jobs.scan_interval_secs, 3600);
        assert_eq!(config.jobs.max_retries, 6);
        assert_eq!(config.jobs.initial_backoff_secs, 60);
    }

    #[test]
    fn test_resolve_toml_overrides_cli() {
        let temp_dir = TempDir::new().unwrap();
        let cli = CliConfig {
            db_dir: Some(PathBuf::from("/should/be/overridden")),
            session_timeout_secs: 600,
            pending_order_ttl_secs: 3600,
            scan_interval_secs: 3600,
        };

        let file_config = FileConfig {
            db_dir: Some(temp_dir.path().to_string_lossy().to_string()),
            session_timeout_secs: Some(300),
            jobs: Some(JobsConfig {
                pending_order_ttl_secs: Some(1800),
                max_retries: Some(3),
                ..Default::default()
            }),
        };

        let config = AppConfig::resolve(&cli, Some(file_config)).unwrap();

        assert_eq!(config.db_dir, temp_dir.path());
        assert_eq!(config.session_timeout_secs, 300);
        assert_eq!(config.jobs.pending_order_ttl_secs, 1800);
        assert_eq!(config.jobs.max_retries, 3);
        // CLI value used when TOML doesn't specify
        assert_eq!(config.jobs.scan_interval_secs, 3600);
    }

    #[test]
    fn test_resolve_missing_db_dir_error() {
        let cli = CliConfig {
            session_timeout_secs: 600,
            pending_order_ttl_secs: 3600,
            scan_interval_secs: 3600,
            ..Default::default()
        };
        let result = AppConfig::resolve(&cli, None);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("db_dir must be specified"));
    }

    #[test]
    fn test_resolve_nonexistent_db_dir_error() {
        let cli = CliConfig {
            db_dir: Some(PathBuf::from("/nonexistent/path/that/should/not/exist")),
            session_timeout_secs: 600,
            pending_order_ttl_secs: 3600,
            scan_interval_secs: 3600,
        };
        let result = AppConfig::resolve(&cli, None);
        assert!(result.unwrap_err().to_string().contains("does not exist"));
    }

    #[test]
    fn test_resolve_db_dir_not_directory_error() {
        let temp_file = tempfile::NamedTempFile::new().unwrap();
        let cli = CliConfig {
            db_dir: Some(temp_file.path().to_path_buf()),
            session_timeout_secs: 600,
            pending_order_ttl_secs: 3600,
            scan_interval_secs: 3600,
        };
        let result = AppConfig::resolve(&cli, None);
        assert!(result.unwrap_err().to_string().contains("not a directory"));
    }

    #[test]
    fn test_resolve_rejects_zero_thresholds() {
        let temp_dir = TempDir::new().unwrap();
        let mut cli = make_cli(&temp_dir);
        cli.session_timeout_secs = 0;
        assert!(AppConfig::resolve(&cli, None).is_err());

        let mut cli = make_cli(&temp_dir);
        cli.pending_order_ttl_secs = 0;
        assert!(AppConfig::resolve(&cli, None).is_err());
    }

    #[test]
    fn test_db_path_helpers() {
        let temp_dir = TempDir::new().unwrap();
        let config = AppConfig::resolve(&make_cli(&temp_dir), None).unwrap();

        assert_eq!(config.orders_db_path(), temp_dir.path().join("orders.db"));
        assert_eq!(
            config.scheduler_db_path(),
            temp_dir.path().join("scheduler.db")
        );
    }

    #[test]
    fn test_file_config_parses_toml() {
        let toml_str = r#"
            session_timeout_secs = 900

            [jobs]
            pending_order_ttl_secs = 7200
            backoff_multiplier = 1.5
        "#;
        let file: FileConfig = toml::from_str(toml_str).unwrap();

        assert_eq!(file.session_timeout_secs, Some(900));
        let jobs = file.jobs.unwrap();
        assert_eq!(jobs.pending_order_ttl_secs, Some(7200));
        assert_eq!(jobs.backoff_multiplier, Some(1.5));
        assert!(jobs.max_retries.is_none());
    }
}

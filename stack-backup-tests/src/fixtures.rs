//! Test fixtures and sample data

use chrono::{DateTime, TimeZone, Utc};
use stack_backup::config::{IntegrationConfig, IntegrationKind};

pub const TEST_BUCKET: &str = "test-backups";
pub const TEST_PREFIX: &str = "backups";

/// A fixed instant (second precision) for archive names
pub fn timestamp(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0)
        .single()
        .expect("valid fixture date")
}

/// `{project}_{yyyy-mm-dd-00-00-00}.tar.gz`
pub fn archive_name(project: &str, year: i32, month: u32, day: u32) -> String {
    format!("{}_{:04}-{:02}-{:02}-00-00-00.tar.gz", project, year, month, day)
}

/// `backups/{project}/{file}`
pub fn archive_key(project: &str, file: &str) -> String {
    format!("{}/{}/{}", TEST_PREFIX, project, file)
}

/// Postgres hook for the tooling project, excluding the raw data directory
pub fn tooling_postgres() -> IntegrationConfig {
    IntegrationConfig {
        project: "tooling".to_string(),
        name: None,
        container: "infisical-db".to_string(),
        excludes: vec!["data/infisical/postgres".to_string()],
        kind: IntegrationKind::Postgres {
            database: "infisical".to_string(),
            user: "infisical".to_string(),
        },
    }
}

/// Redis hook for the tooling project
pub fn tooling_redis() -> IntegrationConfig {
    IntegrationConfig {
        project: "tooling".to_string(),
        name: None,
        container: "infisical-redis".to_string(),
        excludes: vec!["data/infisical/redis".to_string()],
        kind: IntegrationKind::Redis {
            data_path: "/data/dump.rdb".to_string(),
        },
    }
}

/// Full TOML config template; `{base}`, `{backups}` and `{restore}` are
/// replaced by callers
pub fn full_config_toml() -> &'static str {
    r#"
base_dir = "{base}"
backup_dir = "{backups}"
restore_dir = "{restore}"
retention_days = 7
excludes = ["shared/cache"]

[storage]
bucket = "test-backups"
region = "eu-central-1"

[[integrations]]
project = "tooling"
kind = "postgres"
container = "infisical-db"
database = "infisical"
user = "infisical"
excludes = ["data/infisical/postgres"]

[[integrations]]
project = "tooling"
kind = "redis"
container = "infisical-redis"
"#
}

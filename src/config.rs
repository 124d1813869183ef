use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    /// Hosts this deployment is sharded across, for `GET /room/{room_name}`.
    /// Comma-separated in `ISU_ROOM_HOSTS`; defaults to a single local host.
    pub room_hosts: Vec<String>,
    pub admin_key: Option<String>,
    /// Directory holding `que.csv`/`total.csv` snapshot files.
    pub snapshot_dir: String,
    /// How often the adding cache is dumped to disk.
    pub snapshot_interval_secs: u64,
}

impl Config {
    pub fn admin_key(&self) -> Option<&str> {
        self.admin_key.as_deref()
    }
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();

    Ok(Config {
        port: std::env::var("ISU_PORT")
            .unwrap_or_else(|_| "8080".into())
            .parse()
            .unwrap_or(8080),
        database_url: std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/isu_engine".into()),
        room_hosts: std::env::var("ISU_ROOM_HOSTS")
            .unwrap_or_else(|_| "localhost".into())
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        admin_key: std::env::var("ISU_ADMIN_KEY").ok(),
        snapshot_dir: std::env::var("ISU_SNAPSHOT_DIR").unwrap_or_else(|_| ".".into()),
        snapshot_interval_secs: std::env::var("ISU_SNAPSHOT_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_key_is_none_when_unset() {
        let cfg = Config {
            port: 8080,
            database_url: String::new(),
            room_hosts: vec!["localhost".into()],
            admin_key: None,
            snapshot_dir: ".".into(),
            snapshot_interval_secs: 1,
        };
        assert_eq!(cfg.admin_key(), None);
    }
}

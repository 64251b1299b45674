use serde::{Deserialize, Serialize};

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    /// REST 数据源, 未配置时所有查询都走数据库
    #[serde(default)]
    pub rest: Option<RestConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct RestConfig {
    pub url: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

// api_key 不进日志
impl std::fmt::Debug for RestConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestConfig")
            .field("url", &self.url)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .finish()
    }
}

fn default_max_connections() -> u32 {
    20
}

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_DATABASE_URL: &str = "postgres://localhost/dashboard";

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: DEFAULT_HOST.to_string(),
                port: DEFAULT_PORT,
            },
            database: DatabaseConfig {
                url: DEFAULT_DATABASE_URL.to_string(),
                max_connections: default_max_connections(),
            },
            rest: None,
        }
    }
}

impl AppConfig {
    /// 分层加载: [`AppConfig::default`] < `dashboard.toml` (可选) < `DASHBOARD__*` 环境变量
    ///
    /// 例如 `DASHBOARD__DATABASE__URL`、`DASHBOARD__REST__API_KEY`。
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from("dashboard")
    }

    pub fn load_from(file: &str) -> Result<Self, config::ConfigError> {
        let defaults = Self::default();
        config::Config::builder()
            .set_default("server.host", defaults.server.host)?
            .set_default("server.port", i64::from(defaults.server.port))?
            .set_default("database.url", defaults.database.url)?
            .set_default("database.max_connections", i64::from(defaults.database.max_connections))?
            .add_source(config::File::with_name(file).required(false))
            .add_source(config::Environment::with_prefix("DASHBOARD").separator("__"))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_without_file_uses_defaults() {
        let config = AppConfig::load_from("does-not-exist").unwrap();
        let defaults = AppConfig::default();
        assert_eq!(config.server.host, defaults.server.host);
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.database.url, DEFAULT_DATABASE_URL);
        assert_eq!(config.database.max_connections, 20);
        assert!(config.rest.is_none());
    }

    #[test]
    fn file_overrides_defaults() {
        let dir = std::env::temp_dir().join(format!("dashboard-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("dashboard.toml"),
            "[server]\nport = 9000\n\n[rest]\nurl = \"http://localhost:3000\"\n",
        )
        .unwrap();

        let config = AppConfig::load_from(dir.join("dashboard").to_str().unwrap()).unwrap();
        std::fs::remove_dir_all(&dir).unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, DEFAULT_HOST);
        assert_eq!(config.database.max_connections, 20);
        let rest = config.rest.unwrap();
        assert_eq!(rest.url, "http://localhost:3000");
        assert!(rest.api_key.is_none());
    }

    #[test]
    fn debug_hides_api_key() {
        let rest = RestConfig {
            url: "http://localhost:3000".into(),
            api_key: Some("secret-key".into()),
        };
        let rendered = format!("{rest:?}");
        assert!(!rendered.contains("secret-key"));
        assert!(rendered.contains("***"));
    }
}

//! 配置系统
//! 从环境变量加载所有配置，使用 Secret 包装敏感信息

use axum::http::{HeaderName, Uri};
use config::{Config, ConfigError, Environment};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use std::collections::HashSet;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 监听地址，例如 "0.0.0.0:8080"
    pub addr: String,
    /// 单个请求的总处理时限（秒）
    pub request_timeout_secs: u64,
    /// 优雅关闭超时时间（秒）
    pub graceful_shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// 数据库连接 URL（使用 Secret 包装，防止日志泄露）
    pub url: Secret<String>,
    /// 最大连接数
    pub max_connections: u32,
    /// 最小连接数
    pub min_connections: u32,
    /// 获取连接超时时间（秒）
    pub acquire_timeout_secs: u64,
    /// 空闲连接超时时间（秒）
    pub idle_timeout_secs: u64,
    /// 连接最大生命周期（秒）
    pub max_lifetime_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别: trace, debug, info, warn, error
    pub level: String,
    /// 日志格式: json, pretty
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// JWT 签名密钥（使用 Secret 包装，防止日志泄露）
    pub jwt_secret: Secret<String>,
    /// 令牌有效期（秒）
    pub token_ttl_secs: u64,
    /// API Key 请求头名称
    pub api_key_header: String,
    /// 免认证路径，以 `*` 结尾的条目按前缀匹配
    pub bypass_paths: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProxyConfig {
    /// 路由表，每项形如 `/prefix=http://host:port`
    pub routes: Vec<String>,
    /// 上游请求超时时间（秒）
    pub upstream_timeout_secs: u64,
}

/// 解析后的单条转发规则
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    pub prefix: String,
    pub upstream: Uri,
}

impl ProxyConfig {
    /// 解析路由表
    pub fn parse_routes(&self) -> Result<Vec<RouteEntry>, ConfigError> {
        let mut seen = HashSet::new();
        let mut entries = Vec::with_capacity(self.routes.len());

        for raw in self.routes.iter().map(|r| r.trim()).filter(|r| !r.is_empty()) {
            let (prefix, upstream) = raw.split_once('=').ok_or_else(|| {
                ConfigError::Message(format!("Invalid route entry: {raw}. Expected prefix=url"))
            })?;

            let prefix = prefix.trim().trim_end_matches('/');
            if !prefix.starts_with('/') {
                return Err(ConfigError::Message(format!(
                    "Route prefix must start with '/': {raw}"
                )));
            }

            let upstream: Uri = upstream.trim().parse().map_err(|e| {
                ConfigError::Message(format!("Invalid upstream URL in route {raw}: {e}"))
            })?;
            if upstream.scheme_str() != Some("http") || upstream.authority().is_none() {
                return Err(ConfigError::Message(format!(
                    "Upstream must be an absolute http:// URL: {raw}"
                )));
            }

            if !seen.insert(prefix.to_string()) {
                return Err(ConfigError::Message(format!("Duplicate route prefix: {prefix}")));
            }

            entries.push(RouteEntry {
                prefix: prefix.to_string(),
                upstream,
            });
        }

        Ok(entries)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub security: SecurityConfig,
    pub proxy: ProxyConfig,
}

impl AppConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut settings = Config::builder();

        // 添加默认配置
        settings = settings
            .set_default("server.addr", "0.0.0.0:8080")?
            .set_default("server.request_timeout_secs", 30)?
            .set_default("server.graceful_shutdown_timeout_secs", 30)?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout_secs", 5)?
            .set_default("database.idle_timeout_secs", 600)?
            .set_default("database.max_lifetime_secs", 1800)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "json")?
            .set_default("security.jwt_secret", "change-this-secret-in-production-min-32-chars!")?
            .set_default("security.token_ttl_secs", 3600)?
            .set_default("security.api_key_header", "X-API-Key")?
            .set_default("security.bypass_paths", vec!["/healthz*", "/readyz", "/auth/login"])?
            .set_default(
                "proxy.routes",
                vec![
                    "/service-a=http://service-a:8080",
                    "/service-b=http://service-b:8080",
                ],
            )?
            .set_default("proxy.upstream_timeout_secs", 30)?;

        // 从环境变量加载配置（前缀为 GATEWAY_）
        settings = settings.add_source(
            Environment::with_prefix("GATEWAY")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("security.bypass_paths")
                .with_list_parse_key("proxy.routes")
                .try_parsing(true),
        );

        let config: AppConfig = settings.build()?.try_deserialize()?;

        // 验证配置
        config.validate()?;

        Ok(config)
    }

    /// 验证配置合法性
    pub fn validate(&self) -> Result<(), ConfigError> {
        // 验证端口范围
        if let Some(port_str) = self.server.addr.split(':').next_back() {
            if let Ok(port) = port_str.parse::<u16>() {
                if port != 0 && port < 1024 {
                    return Err(ConfigError::Message("Server port should be >= 1024".to_string()));
                }
            }
        }

        if self.server.request_timeout_secs == 0 {
            return Err(ConfigError::Message(
                "request_timeout_secs must be greater than 0".to_string(),
            ));
        }

        // 验证日志级别
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                    self.logging.level
                )))
            }
        }

        // 验证日志格式
        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log format: {}. Must be one of: json, pretty",
                    self.logging.format
                )))
            }
        }

        // 验证数据库连接池配置
        if self.database.max_connections < self.database.min_connections {
            return Err(ConfigError::Message(
                "max_connections must be >= min_connections".to_string(),
            ));
        }

        // 验证 JWT 密钥长度（至少 32 字符）
        if self.security.jwt_secret.expose_secret().len() < 32 {
            return Err(ConfigError::Message(
                "JWT secret must be at least 32 characters long".to_string(),
            ));
        }

        // 验证令牌有效期
        if self.security.token_ttl_secs < 60 || self.security.token_ttl_secs > 86400 {
            return Err(ConfigError::Message(
                "token_ttl_secs must be between 60 and 86400 (1 minute to 24 hours)".to_string(),
            ));
        }

        if HeaderName::from_bytes(self.security.api_key_header.as_bytes()).is_err() {
            return Err(ConfigError::Message(format!(
                "Invalid API key header name: {}",
                self.security.api_key_header
            )));
        }

        for path in &self.security.bypass_paths {
            if !path.trim().starts_with('/') {
                return Err(ConfigError::Message(format!(
                    "Bypass path must start with '/': {path:?}"
                )));
            }
        }

        if self.proxy.upstream_timeout_secs == 0 {
            return Err(ConfigError::Message(
                "upstream_timeout_secs must be greater than 0".to_string(),
            ));
        }

        self.proxy.parse_routes()?;

        Ok(())
    }
}

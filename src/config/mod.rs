// 配置管理模块

use crate::uploader::ProgressSource;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "config/app.toml";

/// 单个分片最大大小（MB）
pub const MAX_CHUNK_SIZE_MB: u64 = 1024;

/// 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// 后端配置
    #[serde(default)]
    pub backend: BackendConfig,
    /// 上传配置
    #[serde(default)]
    pub upload: UploadConfig,
    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 后端配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// 后端 API 根地址
    #[serde(default = "default_backend_url")]
    pub backend_url: String,
    /// 前端地址（用于生成分享链接）
    #[serde(default = "default_frontend_url")]
    pub frontend_url: String,
    /// CSRF Token（后端启用 CSRF 校验时需要）
    #[serde(default)]
    pub csrf_token: Option<String>,
    /// 单个请求超时时间（秒）
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_backend_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_frontend_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_request_timeout_secs() -> u64 {
    300
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            backend_url: default_backend_url(),
            frontend_url: default_frontend_url(),
            csrf_token: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// 上传配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// 分片大小 (MB)
    #[serde(default = "default_chunk_size_mb")]
    pub chunk_size_mb: u64,
    /// 单个分片最多尝试次数（含首次）
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// 进度来源：client（客户端计算）或 backend（使用后端返回值）
    #[serde(default)]
    pub progress_source: ProgressSource,
    /// 重试前是否指数退避
    #[serde(default)]
    pub backoff_enabled: bool,
    /// 事件通道容量
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_chunk_size_mb() -> u64 {
    5
}

fn default_max_attempts() -> u32 {
    3
}

fn default_event_buffer() -> usize {
    64
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            chunk_size_mb: default_chunk_size_mb(),
            max_attempts: default_max_attempts(),
            progress_source: ProgressSource::default(),
            backoff_enabled: false,
            event_buffer: default_event_buffer(),
        }
    }
}

impl UploadConfig {
    /// 分片大小（字节），超出范围时饱和
    pub fn chunk_size_bytes(&self) -> u64 {
        self.chunk_size_mb.saturating_mul(1024 * 1024)
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// 是否启用日志文件持久化
    #[serde(default)]
    pub enabled: bool,
    /// 日志文件保存目录
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// 日志保留天数（默认 7 天）
    #[serde(default = "default_log_retention_days")]
    pub retention_days: u32,
    /// 日志级别（默认 info）
    #[serde(default = "default_log_level")]
    pub level: String,
    /// 单个日志文件最大大小（字节，默认 20MB）
    #[serde(default = "default_log_max_file_size")]
    pub max_file_size: u64,
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_retention_days() -> u32 {
    7
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_max_file_size() -> u64 {
    20 * 1024 * 1024 // 20MB
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            log_dir: default_log_dir(),
            retention_days: default_log_retention_days(),
            level: default_log_level(),
            max_file_size: default_log_max_file_size(),
        }
    }
}

impl AppConfig {
    /// 从文件加载配置
    pub async fn load_from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .context("Failed to read config file")?;

        let config: AppConfig = toml::from_str(&content).context("Failed to parse config file")?;

        config.validate().context("配置文件校验失败")?;

        Ok(config)
    }

    /// 保存配置到文件
    pub async fn save_to_file(&self, path: &str) -> Result<()> {
        self.validate().context("保存配置失败")?;

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        // 确保父目录存在
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .context("Failed to create config directory")?;
            }
        }

        fs::write(path, content)
            .await
            .context("Failed to write config file")?;

        Ok(())
    }

    /// 加载配置，失败时使用默认配置
    ///
    /// 文件不存在时写入一份默认配置；文件存在但无效时保留原文件
    pub async fn load_or_default(path: &str) -> Self {
        match Self::load_from_file(path).await {
            Ok(config) => {
                tracing::info!("配置文件加载成功: {}", path);
                config
            }
            Err(e) => {
                tracing::warn!("配置文件加载失败，使用默认配置: {:#}", e);
                let default_config = Self::default();

                if !std::path::Path::new(path).exists() {
                    if let Err(e) = default_config.save_to_file(path).await {
                        tracing::error!("保存默认配置失败: {:#}", e);
                    } else {
                        tracing::info!("已生成默认配置文件: {}", path);
                    }
                }

                default_config
            }
        }
    }

    /// 使用环境变量覆盖配置（BACKEND_URL / FRONTEND_URL / CSRF_TOKEN）
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// 使用任意来源覆盖配置，空值忽略
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty("BACKEND_URL") {
            tracing::debug!("BACKEND_URL 覆盖后端地址: {}", url);
            self.backend.backend_url = url;
        }
        if let Some(url) = non_empty("FRONTEND_URL") {
            tracing::debug!("FRONTEND_URL 覆盖前端地址: {}", url);
            self.backend.frontend_url = url;
        }
        if let Some(token) = non_empty("CSRF_TOKEN") {
            self.backend.csrf_token = Some(token);
        }
    }

    /// 校验配置
    pub fn validate(&self) -> Result<()> {
        validate_http_url("backend_url", &self.backend.backend_url)?;
        validate_http_url("frontend_url", &self.backend.frontend_url)?;

        if self.upload.chunk_size_mb == 0 {
            anyhow::bail!("分片大小必须大于 0 MB");
        }
        if self.upload.chunk_size_mb > MAX_CHUNK_SIZE_MB {
            anyhow::bail!(
                "分片大小不能超过 {} MB，当前值: {}",
                MAX_CHUNK_SIZE_MB,
                self.upload.chunk_size_mb
            );
        }
        if self.upload.max_attempts == 0 {
            anyhow::bail!("分片最大尝试次数必须大于 0");
        }

        Ok(())
    }
}

fn validate_http_url(name: &str, url: &str) -> Result<()> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        anyhow::bail!("{} 必须以 http:// 或 https:// 开头，当前值: {:?}", name, url)
    }
}

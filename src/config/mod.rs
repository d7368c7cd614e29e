//! 配置管理模块
//!
//! 使用 TOML 文件存储配置，遵循 XDG 规范：
//! - Linux: ~/.config/animal-face/config.toml
//! - macOS: ~/Library/Application Support/com.animal-face.AnimalFace/config.toml
//! - Windows: %APPDATA%\animal-face\AnimalFace\config\config.toml
//!
//! 配置文件不存在时使用默认值，不会写回磁盘。
//! API 密钥只从环境变量读取，从不写入配置文件。

use anyhow::{anyhow, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// 中继服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "default_host")]
    pub host: String,
    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,
    /// 提交路径
    #[serde(default = "default_path")]
    pub path: String,
    /// 请求体上限（字节）
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    3001
}
fn default_path() -> String {
    "/api/analyze".to_string()
}
fn default_max_body_bytes() -> usize {
    50 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            path: default_path(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

/// 图片归一化配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizerConfig {
    /// 最长边上限（像素）
    #[serde(default = "default_max_edge")]
    pub max_edge: u32,
    /// JPEG 质量 (1-100)
    #[serde(default = "default_quality")]
    pub quality: u8,
}

fn default_max_edge() -> u32 {
    1920
}
fn default_quality() -> u8 {
    80
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            max_edge: default_max_edge(),
            quality: default_quality(),
        }
    }
}

/// 推理服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Messages API 端点
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// 协议版本头
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// 模型名称
    #[serde(default = "default_model")]
    pub model: String,
    /// 最大输出 tokens
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// 请求超时（秒），默认不限制
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// 存放 API 密钥的环境变量名
    #[serde(default = "default_credential_env")]
    pub credential_env: String,
}

fn default_endpoint() -> String {
    "https://api.anthropic.com/v1/messages".to_string()
}
fn default_api_version() -> String {
    "2023-06-01".to_string()
}
fn default_model() -> String {
    "claude-haiku-4-5".to_string()
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_credential_env() -> String {
    "CLAUDE_API_KEY".to_string()
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_version: default_api_version(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            timeout_secs: None,
            credential_env: default_credential_env(),
        }
    }
}

/// 应用配置（顶层结构）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// 中继服务配置
    #[serde(default)]
    pub server: ServerConfig,
    /// 图片归一化配置
    #[serde(default)]
    pub normalizer: NormalizerConfig,
    /// 推理服务配置
    #[serde(default)]
    pub inference: InferenceConfig,
}

impl AppConfig {
    /// 获取配置目录路径
    pub fn config_dir() -> Result<PathBuf> {
        if let Some(proj_dirs) = ProjectDirs::from("com", "animal-face", "AnimalFace") {
            Ok(proj_dirs.config_dir().to_path_buf())
        } else {
            // 回退到 ~/.animal-face
            let home = dirs::home_dir().ok_or_else(|| anyhow!("Cannot find home directory"))?;
            Ok(home.join(".animal-face"))
        }
    }

    /// 获取配置文件完整路径
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// 加载配置
    ///
    /// 指定路径时该文件必须存在；否则尝试默认位置，不存在则返回默认配置
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => {
                let path = Self::config_path()?;
                if path.exists() {
                    Self::load_from(&path)
                } else {
                    info!("Config file not found at {}, using defaults", path.display());
                    Ok(Self::default())
                }
            }
        }
    }

    /// 从指定文件加载配置
    pub fn load_from(path: &Path) -> Result<Self> {
        debug!("Loading config from: {}", path.display());
        let content = fs::read_to_string(path)
            .map_err(|e| anyhow!("Failed to read config {}: {}", path.display(), e))?;
        let config: Self = toml::from_str(&content).map_err(|e| {
            warn!("Failed to parse config file: {}", e);
            anyhow!("Invalid config {}: {}", path.display(), e)
        })?;
        config.validate()?;
        info!("Config loaded from: {}", path.display());
        Ok(config)
    }

    /// 检查取值范围
    fn validate(&self) -> Result<()> {
        if self.normalizer.max_edge == 0 {
            return Err(anyhow!("normalizer.max_edge must be greater than 0"));
        }
        Ok(())
    }

    /// 从环境变量读取 API 密钥，仅在启动时调用一次
    pub fn credential(&self) -> Option<Credential> {
        let name = &self.inference.credential_env;
        let credential = std::env::var(name).ok().and_then(Credential::new);
        info!(
            "API key ({}): {}",
            name,
            if credential.is_some() { "configured" } else { "missing" }
        );
        credential
    }
}

/// API 密钥
///
/// `Debug` 输出经过遮蔽，也不实现 `Serialize`，避免意外写入日志或响应。
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// 空白字符串视为未配置
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            None
        } else {
            Some(Self(value))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 3001);
        assert_eq!(config.server.path, "/api/analyze");
        assert_eq!(config.server.max_body_bytes, 50 * 1024 * 1024);
        assert_eq!(config.normalizer.max_edge, 1920);
        assert_eq!(config.normalizer.quality, 80);
        assert_eq!(config.inference.model, "claude-haiku-4-5");
        assert_eq!(config.inference.max_tokens, 1024);
        assert!(config.inference.timeout_secs.is_none());
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[server]"));
        assert!(toml_str.contains("[inference]"));

        // 反序列化回来
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.inference.endpoint, config.inference.endpoint);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nport = 8080\n\n[normalizer]\nmax_edge = 1024").unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.normalizer.max_edge, 1024);
        assert_eq!(config.normalizer.quality, 80);
        assert_eq!(config.inference.api_version, "2023-06-01");
    }

    #[test]
    fn test_zero_max_edge_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[normalizer]\nmax_edge = 0").unwrap();

        let err = AppConfig::load(Some(file.path())).unwrap_err();
        assert!(err.to_string().contains("max_edge"));
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(AppConfig::load(Some(&missing)).is_err());
    }

    #[test]
    fn test_credential_from_env() {
        let mut config = AppConfig::default();
        config.inference.credential_env = "ANIMAL_FACE_TEST_KEY_PRESENT".to_string();
        std::env::set_var("ANIMAL_FACE_TEST_KEY_PRESENT", "sk-test");
        assert_eq!(
            config.credential().map(|c| c.expose().to_string()),
            Some("sk-test".to_string())
        );

        config.inference.credential_env = "ANIMAL_FACE_TEST_KEY_ABSENT".to_string();
        std::env::remove_var("ANIMAL_FACE_TEST_KEY_ABSENT");
        assert!(config.credential().is_none());
    }

    #[test]
    fn test_credential_is_redacted() {
        assert!(Credential::new("   ").is_none());
        let key = Credential::new("sk-secret").unwrap();
        assert!(!format!("{:?}", key).contains("sk-secret"));
    }
}

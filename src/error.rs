//! 错误类型
//!
//! 传输层失败（中继、网络）与语义层失败（解析）保持为不同的变体，
//! 调用方可以按 [`ErrorKind`] 区分处理。

use thiserror::Error;

/// 分析流程中的所有失败
#[derive(Error, Debug)]
pub enum Error {
    /// 输入图片无法解码（空文件、未知格式、数据损坏）
    #[error("Failed to decode image: {0}")]
    Decode(String),

    /// 部署配置错误，例如未设置 API 密钥
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// 调用方请求体不合法
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// 无法连接推理服务，或其成功响应不是 JSON
    #[error("Inference request failed: {0}")]
    Transport(String),

    /// 推理服务返回非成功状态码，body 原样保留
    #[error("Inference API error: {body}")]
    Upstream { status: u16, body: String },

    /// 模型回复无法解释为预期结构
    #[error("Malformed inference response: {0}")]
    MalformedResponse(String),
}

/// 不带负载的错误分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Decode,
    Configuration,
    InvalidRequest,
    Transport,
    Upstream,
    MalformedResponse,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Decode(_) => ErrorKind::Decode,
            Error::Configuration(_) => ErrorKind::Configuration,
            Error::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Error::Transport(_) => ErrorKind::Transport,
            Error::Upstream { .. } => ErrorKind::Upstream,
            Error::MalformedResponse(_) => ErrorKind::MalformedResponse,
        }
    }

    /// 中继对外返回的 HTTP 状态码
    pub fn status_code(&self) -> u16 {
        match self {
            Error::InvalidRequest(_) => 400,
            Error::Upstream { status, .. } => *status,
            _ => 500,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(err.to_string())
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::Decode(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

//! animal-face - 动物脸诊断
//!
//! 核心库：上传前的图片归一化、持有 API 密钥的推理中继、
//! 以及把模型回复解析为结构化结果的解析器。

pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod normalizer;
pub mod parser;
pub mod relay;

pub use client::{Analysis, Analyzer, InferenceBackend, RelayClient};
pub use config::{AppConfig, Credential};
pub use error::{Error, ErrorKind, Result};
pub use models::{
    AnalysisRequest, AnimalResult, AnimalTraits, InferenceResponse, NormalizedImage, RawImage,
};
pub use normalizer::Normalizer;
pub use parser::parse;
pub use relay::{Relay, RelayHandler, RelayReply};

//! 分析流程
//!
//! 归一化 → 推理（本进程中继或远程中继）→ 解析。
//! 每次分析相互独立，失败不重试，由调用方决定是否重新发起。

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::models::{AnalysisRequest, AnimalResult, InferenceResponse, NormalizedImage, RawImage};
use crate::normalizer::Normalizer;
use crate::parser;
use crate::relay::Relay;

/// 推理后端：把归一化后的图片送到推理服务并取回原始信封
#[allow(async_fn_in_trait)]
pub trait InferenceBackend {
    async fn infer(&self, request: &AnalysisRequest) -> Result<InferenceResponse>;
}

impl InferenceBackend for Relay {
    async fn infer(&self, request: &AnalysisRequest) -> Result<InferenceResponse> {
        self.relay(request).await
    }
}

/// 远程中继客户端（相当于浏览器端的调用）
pub struct RelayClient {
    url: String,
    client: reqwest::Client,
}

impl RelayClient {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl InferenceBackend for RelayClient {
    async fn infer(&self, request: &AnalysisRequest) -> Result<InferenceResponse> {
        debug!("POST {}", self.url);
        let response = self.client.post(&self.url).json(request).send().await?;
        let status = response.status();

        if !status.is_success() {
            // 中继失败时返回 {"error": "..."}，取不到就用原始文本
            let text = response.text().await?;
            let body = serde_json::from_str::<serde_json::Value>(&text)
                .ok()
                .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
                .unwrap_or(text);
            return Err(Error::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::Transport(format!("Relay response is not valid JSON: {}", e)))?;
        Ok(InferenceResponse(envelope))
    }
}

/// 一次完整分析的结果
#[derive(Debug, Clone)]
pub struct Analysis {
    /// 上传的图片（含预览 URI）
    pub image: NormalizedImage,
    pub result: AnimalResult,
}

/// 分析器
pub struct Analyzer<B> {
    normalizer: Normalizer,
    backend: B,
}

impl<B: InferenceBackend> Analyzer<B> {
    pub fn new(normalizer: Normalizer, backend: B) -> Self {
        Self {
            normalizer,
            backend,
        }
    }

    /// 对已归一化的图片发起分析
    pub async fn analyze_normalized(&self, image: NormalizedImage) -> Result<Analysis> {
        let response = self.backend.infer(&image.to_request()).await?;
        let result = parser::parse(&response)?;
        info!("Analysis finished: {} ({})", result.animal, result.similarity);
        Ok(Analysis { image, result })
    }

    /// 归一化并分析一张原始图片
    pub async fn analyze(&self, raw: RawImage) -> Result<Analysis> {
        let image = self.normalizer.normalize_async(raw).await?;
        self.analyze_normalized(image).await
    }
}

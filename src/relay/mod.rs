//! 推理中继模块
//!
//! 中继持有 API 密钥，代替不可信的浏览器端向推理服务发出唯一一次请求，
//! 成功时原样返回推理服务的 JSON 信封，不做任何结构校验（交给 [`crate::parser`]）。
//!
//! 两种部署形态共用 [`handler::RelayHandler`]：
//! - 常驻服务：[`server`]（actix-web）
//! - 单次调用：直接调用 [`handler::RelayHandler::handle`]

pub mod handler;
pub mod server;

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::{Credential, InferenceConfig};
use crate::error::{Error, Result};
use crate::models::{AnalysisRequest, InferenceResponse};

pub use handler::{RelayHandler, RelayReply};

/// 候选动物（只是提示，模型可以返回列表之外的动物）
const CANDIDATE_ANIMALS: &str =
    "パンダ🐼、キツネ🦊、猫🐱、犬🐕、ライオン🦁、うさぎ🐰、コアラ🐨、ハムスター🐹、フクロウ🦉、ペンギン🐧など";

/// 构建分析 Prompt
///
/// Prompt 为日文，模型返回的动物名和特征描述也是日文。
pub fn build_prompt() -> String {
    format!(
        r#"この顔写真を分析して、最も似ている動物を1つ選んでください。

以下のJSON形式で回答してください（JSONのみ、他の説明は不要）:
{{
  "animal": "動物名（絵文字付き）",
  "similarity": 85,
  "traits": {{
    "personality": "性格の説明",
    "likes": "好きなもの",
    "dislikes": "苦手なもの",
    "charm": "魅力ポイント"
  }}
}}

動物の候補: {}"#,
        CANDIDATE_ANIMALS
    )
}

/// 推理中继
pub struct Relay {
    config: InferenceConfig,
    credential: Option<Credential>,
    client: reqwest::Client,
}

impl Relay {
    /// 创建中继；密钥在这里注入，之后不再读取环境变量
    pub fn new(config: InferenceConfig, credential: Option<Credential>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| Error::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            config,
            credential,
            client,
        })
    }

    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }

    pub fn has_credential(&self) -> bool {
        self.credential.is_some()
    }

    /// 未配置密钥时返回配置错误
    pub fn ensure_configured(&self) -> Result<&Credential> {
        self.credential
            .as_ref()
            .ok_or_else(|| Error::Configuration("API key is not configured".to_string()))
    }

    /// 构建推理请求体：图片块在前，文本 Prompt 在后
    pub fn build_request_body(&self, request: &AnalysisRequest) -> serde_json::Value {
        serde_json::json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "messages": [{
                "role": "user",
                "content": [
                    {
                        "type": "image",
                        "source": {
                            "type": "base64",
                            "media_type": "image/jpeg",
                            "data": request.image
                        }
                    },
                    {
                        "type": "text",
                        "text": build_prompt()
                    }
                ]
            }]
        })
    }

    /// 转发一次分析请求
    pub async fn relay(&self, request: &AnalysisRequest) -> Result<InferenceResponse> {
        let credential = self.ensure_configured()?;
        let body = self.build_request_body(request);

        info!(
            "Inference API Request: endpoint={}, model={}, max_tokens={}, image_size={}KB",
            self.config.endpoint,
            self.config.model,
            self.config.max_tokens,
            request.image.len() / 1024
        );

        let start_time = Instant::now();

        let response = self
            .client
            .post(&self.config.endpoint)
            .header("x-api-key", credential.expose())
            .header("anthropic-version", &self.config.api_version)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        info!(
            "Inference API Response: status={}, elapsed={:.2}s",
            status,
            start_time.elapsed().as_secs_f64()
        );

        if !status.is_success() {
            // 上游错误按文本原样保留，不尝试解析
            let error = response.text().await?;
            warn!("Inference API Error: status={}, body={}", status, error);
            return Err(Error::Upstream {
                status: status.as_u16(),
                body: error,
            });
        }

        let envelope: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::Transport(format!("Response is not valid JSON: {}", e)))?;

        if let Some(usage) = envelope.get("usage") {
            debug!(
                "Inference API Usage: input_tokens={}, output_tokens={}",
                usage.get("input_tokens").and_then(|v| v.as_i64()).unwrap_or(0),
                usage.get("output_tokens").and_then(|v| v.as_i64()).unwrap_or(0)
            );
        }

        Ok(InferenceResponse(envelope))
    }
}

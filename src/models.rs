//! 数据模型定义

use serde::{Deserialize, Serialize};

/// 用户提供的原始图片
#[derive(Debug, Clone)]
pub struct RawImage {
    pub bytes: Vec<u8>,
    /// 声明的 MIME 类型，仅作为格式提示
    pub mime_type: Option<String>,
}

impl RawImage {
    pub fn new(bytes: Vec<u8>, mime_type: Option<&str>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.map(|s| s.to_string()),
        }
    }
}

/// 归一化后的 JPEG 图片
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedImage {
    /// JPEG 字节的 base64 编码（不含 data URI 前缀）
    pub base64: String,
    /// 可直接用于预览的 data URI
    pub preview_uri: String,
    pub width: u32,
    pub height: u32,
}

impl NormalizedImage {
    pub fn to_request(&self) -> AnalysisRequest {
        AnalysisRequest {
            image: self.base64.clone(),
        }
    }
}

/// 发往中继的请求体：`{"image": "<base64>"}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnalysisRequest {
    pub image: String,
}

/// 推理服务返回的原始信封，未经任何校验
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceResponse(pub serde_json::Value);

impl InferenceResponse {
    pub fn into_inner(self) -> serde_json::Value {
        self.0
    }
}

/// 动物特征
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnimalTraits {
    pub personality: String,
    pub likes: String,
    pub dislikes: String,
    pub charm: String,
}

/// 分析结果
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnimalResult {
    /// 动物名称（可能带 emoji）
    pub animal: String,
    /// 相似度，保留 JSON 解码得到的数值
    pub similarity: serde_json::Number,
    pub traits: AnimalTraits,
}

impl AnimalResult {
    /// 标签的第一段，通常是 emoji
    pub fn symbol(&self) -> &str {
        self.animal.split(' ').next().unwrap_or(&self.animal)
    }

    /// 标签的第二段；没有空格时返回整个标签
    pub fn name(&self) -> &str {
        self.animal.split(' ').nth(1).unwrap_or(&self.animal)
    }
}

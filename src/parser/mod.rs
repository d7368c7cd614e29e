//! 模型回复解析模块
//!
//! 推理服务被要求只输出 JSON，但并不保证。这里从第一个 `{` 截取到
//! 最后一个 `}`，不做括号配对，允许 JSON 前后夹带说明文字或代码块标记。
//! 回复里出现多个对象时不做区分，截取结果通常无法解码并报错。

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::models::{AnimalResult, InferenceResponse};

/// 取第一个 `{` 到最后一个 `}` 之间的片段（含两端）
pub fn extract_brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// 返回信封中第一个文本块的内容
pub fn first_text_block(response: &InferenceResponse) -> Result<&str> {
    let blocks = response
        .0
        .get("content")
        .and_then(|c| c.as_array())
        .filter(|blocks| !blocks.is_empty())
        .ok_or_else(|| Error::MalformedResponse("Response has no content blocks".to_string()))?;

    blocks
        .iter()
        .find(|block| block.get("type").and_then(|t| t.as_str()) == Some("text"))
        .and_then(|block| block.get("text"))
        .and_then(|text| text.as_str())
        .ok_or_else(|| Error::MalformedResponse("Response has no text block".to_string()))
}

/// 解析模型回复的文本部分
pub fn parse_text(text: &str) -> Result<AnimalResult> {
    let json_str = extract_brace_span(text).ok_or_else(|| {
        debug!("Raw: {}", text);
        Error::MalformedResponse("No JSON object found in response text".to_string())
    })?;

    serde_json::from_str::<AnimalResult>(json_str).map_err(|e| {
        warn!("Failed to parse response: {}", e);
        debug!("Raw: {}", text);
        Error::MalformedResponse(e.to_string())
    })
}

/// 把推理服务的原始信封解析为分析结果
pub fn parse(response: &InferenceResponse) -> Result<AnimalResult> {
    let text = first_text_block(response)?;
    debug!("Response text length: {} chars", text.len());
    parse_text(text)
}

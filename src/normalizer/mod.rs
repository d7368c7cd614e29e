//! 图片归一化模块
//!
//! 上传前把任意格式的图片缩放到最长边不超过上限，并统一重新编码为 JPEG，
//! 用于限制请求体积并消除不同设备（相机拍摄、文件上传）带来的格式差异。
//! 归一化本身只在内存中处理，不产生磁盘或网络 I/O。

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageFormat, ImageReader};
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

use crate::config::NormalizerConfig;
use crate::error::{Error, Result};
use crate::models::{NormalizedImage, RawImage};

const JPEG_DATA_URI_PREFIX: &str = "data:image/jpeg;base64,";

/// 计算缩放后的尺寸
///
/// 只在最长边超过 `max_edge` 时缩小，从不放大；短边按同一比例缩放，最少 1 像素。
pub fn target_dimensions(width: u32, height: u32, max_edge: u32) -> (u32, u32) {
    let longer = width.max(height);
    if longer <= max_edge {
        return (width, height);
    }

    let scale = max_edge as f64 / longer as f64;
    let shorten = |edge: u32| ((edge as f64 * scale).round() as u32).max(1);

    if width >= height {
        (max_edge, shorten(height))
    } else {
        (shorten(width), max_edge)
    }
}

/// 图片归一化器
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    config: NormalizerConfig,
}

impl Normalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// 归一化一张图片
    pub fn normalize(&self, raw: &RawImage) -> Result<NormalizedImage> {
        let image = decode(raw)?;
        let (width, height) = (image.width(), image.height());
        let (target_w, target_h) = target_dimensions(width, height, self.config.max_edge);

        // JPEG 不支持透明通道，统一转为 RGB8
        let rgb = if (target_w, target_h) == (width, height) {
            image.to_rgb8()
        } else {
            image::imageops::resize(&image.to_rgb8(), target_w, target_h, FilterType::Triangle)
        };

        let mut buffer = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut buffer, self.config.quality.clamp(1, 100));
        DynamicImage::ImageRgb8(rgb)
            .write_with_encoder(encoder)
            .map_err(|e| Error::Decode(format!("JPEG encoding failed: {}", e)))?;

        debug!(
            "Normalized image: {}x{} -> {}x{}, {} -> {} bytes",
            width,
            height,
            target_w,
            target_h,
            raw.bytes.len(),
            buffer.len()
        );

        let base64 = BASE64.encode(&buffer);
        Ok(NormalizedImage {
            preview_uri: format!("{}{}", JPEG_DATA_URI_PREFIX, base64),
            base64,
            width: target_w,
            height: target_h,
        })
    }

    /// 在阻塞线程池中归一化，不占用调用方的异步任务
    ///
    /// 丢弃返回的 future 即放弃结果，没有其他副作用。
    pub async fn normalize_async(&self, raw: RawImage) -> Result<NormalizedImage> {
        let normalizer = self.clone();
        tokio::task::spawn_blocking(move || normalizer.normalize(&raw))
            .await
            .map_err(|e| Error::Decode(format!("Normalizer task failed: {}", e)))?
    }

    /// 解析 data URI（例如之前生成的预览）并归一化
    pub fn normalize_data_uri(&self, uri: &str) -> Result<NormalizedImage> {
        self.normalize(&raw_from_data_uri(uri)?)
    }
}

/// 读取本地图片文件，MIME 类型按扩展名推断
pub fn read_raw_image(path: &Path) -> Result<RawImage> {
    let bytes = std::fs::read(path)
        .map_err(|e| Error::Decode(format!("Cannot read {}: {}", path.display(), e)))?;
    let mime = ImageFormat::from_path(path).ok().map(|f| f.to_mime_type());
    Ok(RawImage::new(bytes, mime))
}

/// 把 `data:<mime>;base64,<data>` 还原为原始图片
pub fn raw_from_data_uri(uri: &str) -> Result<RawImage> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| Error::Decode("Not a data URI".to_string()))?;
    let (meta, data) = rest
        .split_once(',')
        .ok_or_else(|| Error::Decode("Data URI has no payload".to_string()))?;
    let mime = meta
        .strip_suffix(";base64")
        .ok_or_else(|| Error::Decode("Data URI is not base64 encoded".to_string()))?;

    let bytes = BASE64
        .decode(data.trim())
        .map_err(|e| Error::Decode(format!("Invalid base64 payload: {}", e)))?;
    Ok(RawImage::new(bytes, (!mime.is_empty()).then_some(mime)))
}

/// 解码原始图片：优先按内容识别格式，识别失败时再参考声明的 MIME 类型
///
/// 按 EXIF 方向标记把图片转正，之后的尺寸都以转正后的宽高计算。
fn decode(raw: &RawImage) -> Result<DynamicImage> {
    if raw.bytes.is_empty() {
        return Err(Error::Decode("Empty image data".to_string()));
    }

    let mut reader = ImageReader::new(Cursor::new(raw.bytes.as_slice()))
        .with_guessed_format()
        .map_err(|e| Error::Decode(e.to_string()))?;

    if reader.format().is_none() {
        let hinted = raw.mime_type.as_deref().and_then(ImageFormat::from_mime_type);
        match hinted {
            Some(format) => reader.set_format(format),
            None => return Err(Error::Decode("Unrecognized image format".to_string())),
        }
    }

    let mut decoder = reader.into_decoder()?;
    // 方向标记损坏时按原样处理
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
    let mut image = DynamicImage::from_decoder(decoder)?;
    if orientation != Orientation::NoTransforms {
        debug!("Applying EXIF orientation: {:?}", orientation);
        image.apply_orientation(orientation);
    }
    Ok(image)
}

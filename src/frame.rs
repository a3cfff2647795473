/// 帧缩放 (Frame Normalizer)
/// Bounded-width rescaling that keeps the aspect ratio
use fast_image_resize as fr;
use image::RgbImage;

use crate::error::{PipelineError, PipelineResult};

/// 流水线中的一帧 (RGB, 行优先)
pub type Frame = RgbImage;

/// 计算缩放后的尺寸: 宽度不超过 `max_width`, 高度按同比例四舍五入, 不放大
pub fn target_size(width: u32, height: u32, max_width: u32) -> PipelineResult<(u32, u32)> {
    if width == 0 || height == 0 {
        return Err(PipelineError::Resize(format!(
            "非法帧尺寸 {}x{}",
            width, height
        )));
    }
    if max_width == 0 {
        return Err(PipelineError::Resize("最大宽度不能为0".to_string()));
    }

    let new_width = max_width.min(width);
    if new_width == width {
        return Ok((width, height));
    }
    let ratio = new_width as f64 / width as f64;
    let new_height = ((height as f64) * ratio).round().max(1.0) as u32;
    Ok((new_width, new_height))
}

/// 把帧缩放到不超过 `max_width` 的宽度
///
/// 已经满足约束的帧原样返回
pub fn normalize(frame: Frame, max_width: u32) -> PipelineResult<Frame> {
    let (w, h) = frame.dimensions();
    let (new_w, new_h) = target_size(w, h, max_width)?;
    if (new_w, new_h) == (w, h) {
        return Ok(frame);
    }
    resize_exact(&frame, new_w, new_h)
}

/// 双线性缩放到精确尺寸 (fast_image_resize)
pub fn resize_exact(frame: &Frame, width: u32, height: u32) -> PipelineResult<Frame> {
    let (w, h) = frame.dimensions();
    if w == 0 || h == 0 || width == 0 || height == 0 {
        return Err(PipelineError::Resize(format!(
            "无法从 {}x{} 缩放到 {}x{}",
            w, h, width, height
        )));
    }
    if (w, h) == (width, height) {
        return Ok(frame.clone());
    }

    let src_image = fr::images::Image::from_vec_u8(w, h, frame.as_raw().clone(), fr::PixelType::U8x3)
        .map_err(|e| PipelineError::Resize(e.to_string()))?;
    let mut dst_image = fr::images::Image::new(width, height, fr::PixelType::U8x3);

    let mut resizer = fr::Resizer::new();
    resizer
        .resize(
            &src_image,
            &mut dst_image,
            &fr::ResizeOptions::new()
                .resize_alg(fr::ResizeAlg::Convolution(fr::FilterType::Bilinear)),
        )
        .map_err(|e| PipelineError::Resize(e.to_string()))?;

    RgbImage::from_raw(width, height, dst_image.buffer().to_vec())
        .ok_or_else(|| PipelineError::Resize("缩放结果缓冲区大小不匹配".to_string()))
}

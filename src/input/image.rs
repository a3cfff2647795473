/// 静态图片加载
/// Image loader, format detected from file content
use image::ImageReader;
use std::path::Path;

use crate::error::{PipelineError, PipelineResult};
use crate::frame::Frame;

/// 读取图片并转为 RGB8
pub fn load_image(path: impl AsRef<Path>) -> PipelineResult<Frame> {
    let path = path.as_ref();
    let decode_err = |reason: String| PipelineError::Decode {
        path: path.to_path_buf(),
        reason,
    };

    let reader = ImageReader::open(path)
        .map_err(|e| decode_err(e.to_string()))?
        .with_guessed_format()
        .map_err(|e| decode_err(e.to_string()))?;
    if reader.format().is_none() {
        return Err(decode_err("无法识别的图片格式".to_string()));
    }

    let img = reader.decode().map_err(|e| decode_err(e.to_string()))?;
    tracing::info!(
        "🖼️ 图片加载成功: {} ({}x{})",
        path.display(),
        img.width(),
        img.height()
    );
    Ok(img.to_rgb8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_load_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("image.png");
        RgbImage::from_pixel(12, 8, Rgb([10, 200, 30])).save(&path).unwrap();

        let frame = load_image(&path).unwrap();
        assert_eq!(frame.dimensions(), (12, 8));
        assert_eq!(frame.get_pixel(3, 3).0, [10, 200, 30]);
    }

    #[test]
    fn test_format_guessed_from_content() {
        // 扩展名错误, 内容是PNG
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("picture.dat");
        let png = dir.path().join("src.png");
        RgbImage::new(4, 4).save(&png).unwrap();
        std::fs::copy(&png, &path).unwrap();
        assert_eq!(load_image(&path).unwrap().dimensions(), (4, 4));
    }

    #[test]
    fn test_garbage_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("image.png");
        std::fs::write(&path, b"definitely not an image").unwrap();
        assert!(matches!(load_image(&path), Err(PipelineError::Decode { .. })));
    }
}

/// 输出系统 (Output Sink)
///
/// - 输出目录准备与图片保存
/// - video: 视频写入器 (ffmpeg 子进程编码)
pub mod video;

pub use video::{FfmpegSink, SinkSpec, VideoSink, DEFAULT_CODEC};

use std::fs;
use std::path::Path;

use crate::error::{PipelineError, PipelineResult};
use crate::frame::Frame;

/// 输出目录不存在时创建
pub fn prepare_output_dir(dir: impl AsRef<Path>) -> PipelineResult<()> {
    let dir = dir.as_ref();
    if dir.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(dir).map_err(|e| PipelineError::write(dir, e))?;
    tracing::info!("📁 已创建输出目录: {}", dir.display());
    Ok(())
}

/// 保存标注后的图片, 格式由扩展名决定
pub fn save_image(frame: &Frame, path: impl AsRef<Path>) -> PipelineResult<()> {
    let path = path.as_ref();
    frame.save(path).map_err(|e| PipelineError::write(path, e))?;
    tracing::info!("💾 结果已保存: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_prepare_creates_nested_dir() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("output").join("nested");
        prepare_output_dir(&dir).unwrap();
        assert!(dir.is_dir());
        // 已存在时不报错
        prepare_output_dir(&dir).unwrap();
    }

    #[test]
    fn test_prepare_fails_on_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let dir = file.path().join("sub");
        assert!(matches!(prepare_output_dir(&dir), Err(PipelineError::Write { .. })));
    }

    #[test]
    fn test_save_image_round_trip() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("image_detected.png");
        let frame = RgbImage::from_pixel(5, 3, Rgb([0, 255, 0]));
        save_image(&frame, &path).unwrap();
        assert_eq!(image::open(&path).unwrap().to_rgb8(), frame);
    }

    #[test]
    fn test_save_into_missing_dir_is_write_error() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("missing").join("out.png");
        assert!(matches!(
            save_image(&RgbImage::new(2, 2), &path),
            Err(PipelineError::Write { .. })
        ));
    }
}

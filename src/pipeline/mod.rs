/// 检测流水线 (Detection Pipeline)
///
/// 单线程顺序执行:
/// 输入检查 → 加载 → [逐帧] 缩放 → 行人检测 → 画框 → 输出
/// - image: 静态图片, 任何错误都终止
/// - video: 视频状态机, 时间上限 / 取消 / 跳帧 / 只收尾一次
pub mod image;
pub mod video;

pub use self::image::{ImagePipeline, ImageReport};
pub use video::{
    PipelineState, Step, StopReason, TimeBudget, VideoPipeline, VideoReport, VideoSettings,
};

use std::path::{Path, PathBuf};

// ========== 公共常量 ==========

/// 图片结果文件名
pub const IMAGE_OUTPUT_NAME: &str = "image_detected.png";
/// 视频结果文件名
pub const VIDEO_OUTPUT_NAME: &str = "video_detected.mp4";

/// 一次运行的输入/输出路径
#[derive(Debug, Clone, PartialEq)]
pub struct MediaPaths {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub output: PathBuf,
}

impl MediaPaths {
    /// 输出文件 = 输出目录 + 固定文件名
    pub fn new(input: impl Into<PathBuf>, output_dir: impl Into<PathBuf>, file_name: &str) -> Self {
        let output_dir = output_dir.into();
        Self {
            input: input.into(),
            output: output_dir.join(file_name),
            output_dir,
        }
    }

    pub fn for_image(input: impl Into<PathBuf>, output_dir: impl AsRef<Path>) -> Self {
        Self::new(input, output_dir.as_ref(), IMAGE_OUTPUT_NAME)
    }

    pub fn for_video(input: impl Into<PathBuf>, output_dir: impl AsRef<Path>) -> Self {
        Self::new(input, output_dir.as_ref(), VIDEO_OUTPUT_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_names_are_fixed() {
        let paths = MediaPaths::for_image("input/image.png", "output");
        assert_eq!(paths.output, Path::new("output").join("image_detected.png"));

        let paths = MediaPaths::for_video("clips/street.avi", "/tmp/out");
        assert_eq!(paths.output, Path::new("/tmp/out/video_detected.mp4"));
        assert_eq!(paths.input, Path::new("clips/street.avi"));
    }
}

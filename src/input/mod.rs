/// 输入系统 (Input System)
///
/// - resolve_input: 输入路径检查
/// - image:         静态图片加载
/// - video:         视频源 (ffmpeg 子进程解码)
pub mod image;
pub mod video;

pub use self::image::load_image;
pub use video::{FfmpegSource, VideoMetadata, VideoSource};

use std::path::{Path, PathBuf};

use crate::error::{PipelineError, PipelineResult};

/// 确认输入文件存在, 不做任何解码
pub fn resolve_input(path: impl AsRef<Path>) -> PipelineResult<PathBuf> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(PipelineError::NotFound(path.to_path_buf()));
    }
    tracing::debug!("📂 输入文件: {}", path.display());
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_input_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("video.mp4");
        match resolve_input(&missing) {
            Err(PipelineError::NotFound(p)) => assert_eq!(p, missing),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_existing_input_resolves() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert_eq!(resolve_input(file.path()).unwrap(), file.path());
    }
}

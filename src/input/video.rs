/// 视频源 (Video Source)
/// ffmpeg 子进程把视频解码为 rgb24 原始帧, 通过管道逐帧读取
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Stdio};
use std::thread::{self, JoinHandle};

use crate::error::{PipelineError, PipelineResult};
use crate::ffmpeg;
use crate::frame::Frame;

/// 视频属性, 打开时确定
#[derive(Debug, Clone, PartialEq)]
pub struct VideoMetadata {
    pub fps: f64,
    pub width: u32,
    pub height: u32,
    pub frame_count: Option<u64>,
    pub codec: String,
}

impl VideoMetadata {
    /// 帧率和尺寸必须为正
    pub fn validate(&self) -> PipelineResult<()> {
        if !(self.fps > 0.0) || !self.fps.is_finite() || self.width == 0 || self.height == 0 {
            return Err(PipelineError::InvalidMetadata {
                fps: self.fps,
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }

    /// 单帧 rgb24 字节数
    pub fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

/// 顺序读取帧的视频源
pub trait VideoSource {
    fn metadata(&self) -> &VideoMetadata;

    /// 读取下一帧, `None` 表示流结束
    fn read_frame(&mut self) -> PipelineResult<Option<Frame>>;

    /// 释放解码资源, 重复调用无副作用
    fn close(&mut self);

    fn frames_read(&self) -> u64;
}

impl<S: VideoSource + ?Sized> VideoSource for Box<S> {
    fn metadata(&self) -> &VideoMetadata {
        (**self).metadata()
    }

    fn read_frame(&mut self) -> PipelineResult<Option<Frame>> {
        (**self).read_frame()
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn frames_read(&self) -> u64 {
        (**self).frames_read()
    }
}

/// ffmpeg 解码视频源
pub struct FfmpegSource {
    path: PathBuf,
    metadata: VideoMetadata,
    child: Option<Child>,
    stdout: Option<ChildStdout>,
    stderr: Option<JoinHandle<String>>,
    frames_read: u64,
}

impl FfmpegSource {
    /// 探测并打开视频; 属性校验在启动解码进程之前完成
    pub fn open(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let path = path.as_ref();
        let metadata = ffmpeg::probe(path)?;
        metadata.validate()?;

        let child = ffmpeg::tool_command("ffmpeg")
            .args(["-v", "error", "-nostdin", "-i"])
            .arg(path)
            .args(["-an", "-sn", "-f", "rawvideo", "-pix_fmt", "rgb24", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| PipelineError::Open {
                path: path.to_path_buf(),
                reason: format!("无法启动 ffmpeg 解码: {}", e),
            })?;

        tracing::info!(
            "🎬 视频已打开: {} ({}x{} @ {:.2} FPS, 编码 {}, 帧数 {})",
            path.display(),
            metadata.width,
            metadata.height,
            metadata.fps,
            metadata.codec,
            metadata
                .frame_count
                .map(|n| n.to_string())
                .unwrap_or_else(|| "未知".to_string())
        );

        Ok(Self::from_child(path, metadata, child))
    }

    /// 接管已启动的解码进程: stdout 输出 rgb24 帧, stderr 在后台收集
    pub(crate) fn from_child(path: &Path, metadata: VideoMetadata, mut child: Child) -> Self {
        let stdout = child.stdout.take();
        let stderr = child.stderr.take().map(|mut pipe| {
            thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf);
                String::from_utf8_lossy(&buf).trim().to_string()
            })
        });
        Self {
            path: path.to_path_buf(),
            metadata,
            child: Some(child),
            stdout,
            stderr,
            frames_read: 0,
        }
    }

    fn collect_stderr(&mut self) -> String {
        self.stderr
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default()
    }

    /// 输出结束后回收解码进程; 非零退出视为解码失败
    fn finish_stream(&mut self) -> PipelineResult<()> {
        self.stdout = None;
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let status = child.wait().map_err(|e| PipelineError::Open {
            path: self.path.clone(),
            reason: format!("等待 ffmpeg 解码进程失败: {}", e),
        })?;
        let stderr = self.collect_stderr();
        if !status.success() {
            return Err(PipelineError::Open {
                path: self.path.clone(),
                reason: format!(
                    "ffmpeg 解码异常退出 ({}), 已读取 {} 帧: {}",
                    status, self.frames_read, stderr
                ),
            });
        }
        if !stderr.is_empty() {
            tracing::warn!("⚠️ ffmpeg 解码警告: {}", stderr);
        }
        Ok(())
    }
}

impl VideoSource for FfmpegSource {
    fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    fn read_frame(&mut self) -> PipelineResult<Option<Frame>> {
        let Some(stdout) = self.stdout.as_mut() else {
            return Ok(None);
        };

        let mut buf = vec![0u8; self.metadata.frame_len()];
        let mut filled = 0;
        while filled < buf.len() {
            match stdout.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(PipelineError::Open {
                        path: self.path.clone(),
                        reason: format!("读取解码帧失败: {}", e),
                    })
                }
            }
        }

        if filled < buf.len() {
            if filled > 0 {
                tracing::warn!("⚠️ 末尾不完整帧已丢弃 ({}/{} 字节)", filled, buf.len());
            }
            self.finish_stream()?;
            return Ok(None);
        }

        self.frames_read += 1;
        Ok(Frame::from_raw(self.metadata.width, self.metadata.height, buf))
    }

    fn close(&mut self) {
        self.stdout = None;
        if let Some(mut child) = self.child.take() {
            // 解码进程可能还在输出, 直接结束
            let _ = child.kill();
            let _ = child.wait();
            self.collect_stderr();
            tracing::debug!("视频源已关闭: {} (读取 {} 帧)", self.path.display(), self.frames_read);
        }
    }

    fn frames_read(&self) -> u64 {
        self.frames_read
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(fps: f64, width: u32, height: u32) -> VideoMetadata {
        VideoMetadata {
            fps,
            width,
            height,
            frame_count: None,
            codec: "h264".to_string(),
        }
    }

    #[test]
    fn test_validate_metadata() {
        assert!(meta(30.0, 640, 480).validate().is_ok());
        for bad in [meta(0.0, 640, 480), meta(30.0, 0, 480), meta(30.0, 640, 0), meta(f64::NAN, 1, 1)] {
            assert!(matches!(bad.validate(), Err(PipelineError::InvalidMetadata { .. })));
        }
    }

    #[test]
    fn test_frame_len() {
        assert_eq!(meta(25.0, 4, 2).frame_len(), 24);
    }

    #[cfg(unix)]
    fn scripted_decoder(script: &str) -> Child {
        std::process::Command::new("sh")
            .args(["-c", script])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap()
    }

    #[cfg(unix)]
    #[test]
    fn test_decoder_crash_is_reported() {
        // 1x1 帧 = 3 字节; 输出两帧后异常退出
        let child = scripted_decoder("printf 'abcdef'; echo 'corrupt packet' >&2; exit 1");
        let mut source = FfmpegSource::from_child(Path::new("broken.mp4"), meta(25.0, 1, 1), child);

        assert!(source.read_frame().unwrap().is_some());
        assert!(source.read_frame().unwrap().is_some());
        match source.read_frame() {
            Err(PipelineError::Open { reason, .. }) => {
                assert!(reason.contains("corrupt packet"), "{}", reason);
            }
            other => panic!("unexpected result: {:?}", other.map(|f| f.map(|f| f.dimensions()))),
        }
        assert_eq!(source.frames_read(), 2);
        // 之后的读取和关闭不再报错
        assert!(source.read_frame().unwrap().is_none());
        source.close();
    }

    #[cfg(unix)]
    #[test]
    fn test_clean_decoder_exit_is_end_of_stream() {
        let child = scripted_decoder("printf 'abcdefg'");
        let mut source = FfmpegSource::from_child(Path::new("ok.mp4"), meta(25.0, 1, 1), child);

        let first = source.read_frame().unwrap().unwrap();
        assert_eq!(first.as_raw(), b"abc");
        assert!(source.read_frame().unwrap().is_some());
        // 末尾 1 字节的残帧被丢弃
        assert!(source.read_frame().unwrap().is_none());
        assert!(source.read_frame().unwrap().is_none());
        assert_eq!(source.frames_read(), 2);
    }

    #[test]
    fn test_open_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(FfmpegSource::open(dir.path().join("missing.mp4")).is_err());
    }
}

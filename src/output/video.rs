/// 视频写入器 (Video Sink)
/// rgb24 原始帧通过管道送入 ffmpeg 编码
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Stdio};

use crate::error::{PipelineError, PipelineResult};
use crate::ffmpeg;
use crate::frame::Frame;

/// 默认编码器: MPEG-4 Part 2 (FourCC mp4v)
pub const DEFAULT_CODEC: &str = "mpeg4";

/// 奇数尺寸补齐为偶数, yuv420p 要求
const EVEN_PAD_FILTER: &str = "pad=ceil(iw/2)*2:ceil(ih/2)*2";

/// 写入器参数
#[derive(Debug, Clone, PartialEq)]
pub struct SinkSpec {
    pub codec: String,
    pub fps: f64,
    pub width: u32,
    pub height: u32,
}

impl SinkSpec {
    pub fn new(fps: f64, width: u32, height: u32) -> Self {
        Self {
            codec: DEFAULT_CODEC.to_string(),
            fps,
            width,
            height,
        }
    }

    pub fn with_codec(mut self, codec: impl Into<String>) -> Self {
        self.codec = codec.into();
        self
    }

    pub fn validate(&self) -> PipelineResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(PipelineError::WriterInit(format!(
                "非法输出尺寸 {}x{}",
                self.width, self.height
            )));
        }
        if !(self.fps > 0.0) || !self.fps.is_finite() {
            return Err(PipelineError::WriterInit(format!("非法输出帧率 {}", self.fps)));
        }
        if self.codec.trim().is_empty() {
            return Err(PipelineError::WriterInit("未指定编码器".to_string()));
        }
        Ok(())
    }
}

/// 顺序写入帧的视频输出
pub trait VideoSink {
    fn write_frame(&mut self, frame: &Frame) -> PipelineResult<()>;

    fn frames_written(&self) -> u64;

    /// 结束编码并关闭文件, 重复调用无副作用
    fn finish(&mut self) -> PipelineResult<()>;
}

impl<S: VideoSink + ?Sized> VideoSink for Box<S> {
    fn write_frame(&mut self, frame: &Frame) -> PipelineResult<()> {
        (**self).write_frame(frame)
    }

    fn frames_written(&self) -> u64 {
        (**self).frames_written()
    }

    fn finish(&mut self) -> PipelineResult<()> {
        (**self).finish()
    }
}

/// ffmpeg 编码视频输出
pub struct FfmpegSink {
    path: PathBuf,
    spec: SinkSpec,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    frames_written: u64,
}

impl FfmpegSink {
    pub fn create(path: impl AsRef<Path>, spec: SinkSpec) -> PipelineResult<Self> {
        let path = path.as_ref();
        spec.validate()?;

        let encoders = ffmpeg::available_encoders()?;
        if !encoders.iter().any(|e| e == &spec.codec) {
            return Err(PipelineError::WriterInit(format!(
                "ffmpeg 不支持编码器 '{}'",
                spec.codec
            )));
        }

        let mut cmd = ffmpeg::tool_command("ffmpeg");
        cmd.args(["-v", "error", "-y", "-f", "rawvideo", "-pix_fmt", "rgb24"])
            .args(["-s", &format!("{}x{}", spec.width, spec.height)])
            .args(["-r", &spec.fps.to_string()])
            .args(["-i", "-", "-vf", EVEN_PAD_FILTER])
            .args(["-c:v", &spec.codec, "-pix_fmt", "yuv420p"]);
        if spec.codec == DEFAULT_CODEC {
            cmd.args(["-tag:v", "mp4v", "-q:v", "4"]);
        }
        let mut child = cmd
            .arg(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| PipelineError::WriterInit(format!("无法启动 ffmpeg 编码: {}", e)))?;
        let stdin = child.stdin.take();

        tracing::info!(
            "📼 视频写入器已创建: {} ({}x{} @ {:.2} FPS, 编码 {})",
            path.display(),
            spec.width,
            spec.height,
            spec.fps,
            spec.codec
        );

        Ok(Self {
            path: path.to_path_buf(),
            spec,
            child: Some(child),
            stdin,
            frames_written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl VideoSink for FfmpegSink {
    fn write_frame(&mut self, frame: &Frame) -> PipelineResult<()> {
        if frame.dimensions() != (self.spec.width, self.spec.height) {
            return Err(PipelineError::write(
                &self.path,
                format!(
                    "帧尺寸 {}x{} 与写入器 {}x{} 不一致",
                    frame.width(),
                    frame.height(),
                    self.spec.width,
                    self.spec.height
                ),
            ));
        }
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(PipelineError::write(&self.path, "写入器已关闭"));
        };
        stdin
            .write_all(frame.as_raw())
            .map_err(|e| PipelineError::write(&self.path, e))?;
        self.frames_written += 1;
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.frames_written
    }

    fn finish(&mut self) -> PipelineResult<()> {
        // 关闭 stdin 让 ffmpeg 收尾
        self.stdin = None;
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let status = child
            .wait()
            .map_err(|e| PipelineError::write(&self.path, e))?;
        if !status.success() {
            return Err(PipelineError::write(
                &self.path,
                format!("ffmpeg 编码进程异常退出: {}", status),
            ));
        }
        tracing::info!(
            "✅ 视频写入完成: {} ({} 帧)",
            self.path.display(),
            self.frames_written
        );
        Ok(())
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            tracing::error!("❌ 关闭视频写入器失败: {}", e);
        }
    }
}

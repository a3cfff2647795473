/// 视频检测流水线 (状态机)
///
/// Opened → Validated → Writing → Stopped(原因) → Finalized
///
/// 每次 `step()` 处理一帧; 停止后 `finalize()` 依次释放写入器和视频源,
/// 只执行一次. 窗口前端每渲染一帧调用一次 `step()`, 无界面时用 `run()`.
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::annotate::draw_boxes;
use crate::detection::{DetectParams, PersonDetector};
use crate::error::{PipelineError, PipelineResult};
use crate::frame::{normalize, target_size, Frame};
use crate::input::VideoSource;
use crate::output::{SinkSpec, VideoSink, DEFAULT_CODEC};
use crate::viewer::Viewer;

// ========== 公共常量 ==========

/// 默认运行时间上限 (秒)
pub const DEFAULT_TIME_LIMIT_SECS: u64 = 12;
/// 默认最大输出宽度
pub const DEFAULT_MAX_WIDTH: u32 = 500;

/// 停止原因
#[derive(Debug, Clone, PartialEq)]
pub enum StopReason {
    TimeLimitReached,
    EndOfStream,
    UserCancelled,
    CriticalError(String),
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::TimeLimitReached => write!(f, "达到时间上限"),
            StopReason::EndOfStream => write!(f, "视频结束"),
            StopReason::UserCancelled => write!(f, "用户取消"),
            StopReason::CriticalError(msg) => write!(f, "严重错误: {}", msg),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineState {
    Opened,
    Validated,
    Writing,
    Stopped(StopReason),
    Finalized(StopReason),
}

impl PipelineState {
    pub fn stop_reason(&self) -> Option<&StopReason> {
        match self {
            PipelineState::Stopped(r) | PipelineState::Finalized(r) => Some(r),
            _ => None,
        }
    }
}

/// 运行时间预算
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimeBudget {
    /// 墙钟时间, 从第一帧开始计
    WallClock(Duration),
    /// 视频时间 = 已读帧数 / FPS, 结果与机器速度无关
    StreamTime(Duration),
}

impl TimeBudget {
    pub fn limit(&self) -> Duration {
        match self {
            TimeBudget::WallClock(d) | TimeBudget::StreamTime(d) => *d,
        }
    }
}

impl Default for TimeBudget {
    fn default() -> Self {
        TimeBudget::WallClock(Duration::from_secs(DEFAULT_TIME_LIMIT_SECS))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VideoSettings {
    pub max_width: u32,
    pub params: DetectParams,
    pub budget: TimeBudget,
    /// 每隔多少帧处理一帧, 1 表示每帧都处理
    pub skip_interval: u32,
    pub codec: String,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            max_width: DEFAULT_MAX_WIDTH,
            params: DetectParams::video(),
            budget: TimeBudget::default(),
            skip_interval: 1,
            codec: DEFAULT_CODEC.to_string(),
        }
    }
}

/// 单步结果
#[derive(Debug)]
pub enum Step<'a> {
    /// 标注完成并已写入的帧
    Frame(&'a Frame),
    /// 按跳帧间隔跳过, 或缩放失败被丢弃
    Skipped,
    Stopped(StopReason),
}

/// 视频运行统计
#[derive(Debug, Clone, PartialEq)]
pub struct VideoReport {
    pub reason: Option<StopReason>,
    pub frames_read: u64,
    pub frames_written: u64,
    /// 按跳帧间隔跳过的帧
    pub frames_skipped: u64,
    /// 缩放失败被丢弃的帧
    pub frames_dropped: u64,
    pub detections: u64,
    pub output: PathBuf,
}

impl VideoReport {
    pub fn is_critical(&self) -> bool {
        matches!(self.reason, Some(StopReason::CriticalError(_)))
    }
}

pub struct VideoPipeline<S, K, D>
where
    S: VideoSource,
    K: VideoSink,
    D: PersonDetector,
{
    source: S,
    sink: K,
    detector: D,
    settings: VideoSettings,
    state: PipelineState,
    output: PathBuf,
    output_size: (u32, u32),
    fps: f64,
    started: Option<Instant>,
    cancel_pending: bool,
    frames_read: u64,
    frames_skipped: u64,
    frames_dropped: u64,
    detections: u64,
    current: Option<Frame>,
}

impl<S, K, D> VideoPipeline<S, K, D>
where
    S: VideoSource,
    K: VideoSink,
    D: PersonDetector,
{
    /// 校验视频属性后创建写入器
    ///
    /// 属性无效时不会调用 `open_sink`, 也不会产生任何输出
    pub fn new<F>(
        mut source: S,
        open_sink: F,
        output: impl AsRef<Path>,
        settings: VideoSettings,
        detector: D,
    ) -> PipelineResult<Self>
    where
        F: FnOnce(&Path, SinkSpec) -> PipelineResult<K>,
    {
        let output = output.as_ref().to_path_buf();
        let mut state = PipelineState::Opened;

        let meta = source.metadata().clone();
        let prepared = meta
            .validate()
            .and_then(|_| {
                if settings.skip_interval == 0 {
                    return Err(PipelineError::Config("跳帧间隔必须大于0".to_string()));
                }
                settings.params.validate().map_err(PipelineError::Config)
            })
            .and_then(|_| {
                state = PipelineState::Validated;
                tracing::debug!("状态: Opened → Validated");
                target_size(meta.width, meta.height, settings.max_width)
            })
            .and_then(|(w, h)| {
                let spec = SinkSpec::new(meta.fps, w, h).with_codec(settings.codec.clone());
                open_sink(&output, spec).map(|sink| (sink, (w, h)))
            });

        let (sink, output_size) = match prepared {
            Ok(v) => v,
            Err(e) => {
                source.close();
                tracing::error!("❌ 视频流水线初始化失败 ({:?}): {}", state, e);
                return Err(e);
            }
        };

        tracing::info!(
            "▶️ 开始处理: {}x{} → {}x{}, {:.2} FPS, 时间上限 {:?} ({}), 跳帧间隔 {}",
            meta.width,
            meta.height,
            output_size.0,
            output_size.1,
            meta.fps,
            settings.budget.limit(),
            match settings.budget {
                TimeBudget::WallClock(_) => "墙钟",
                TimeBudget::StreamTime(_) => "视频时间",
            },
            settings.skip_interval
        );

        Ok(Self {
            source,
            sink,
            detector,
            settings,
            state: PipelineState::Writing,
            output,
            output_size,
            fps: meta.fps,
            started: None,
            cancel_pending: false,
            frames_read: 0,
            frames_skipped: 0,
            frames_dropped: 0,
            detections: 0,
            current: None,
        })
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    /// 写入器的帧尺寸 (缩放后)
    pub fn output_size(&self) -> (u32, u32) {
        self.output_size
    }

    pub fn is_finalized(&self) -> bool {
        matches!(self.state, PipelineState::Finalized(_))
    }

    /// 请求停止, 下一次 `step()` 生效
    pub fn cancel(&mut self) {
        if self.state == PipelineState::Writing {
            self.cancel_pending = true;
        }
    }

    fn elapsed(&self) -> Duration {
        match self.settings.budget {
            TimeBudget::WallClock(_) => self.started.map(|t| t.elapsed()).unwrap_or_default(),
            TimeBudget::StreamTime(_) => Duration::from_secs_f64(self.frames_read as f64 / self.fps),
        }
    }

    fn stop(&mut self, reason: StopReason) -> Step<'_> {
        match &reason {
            StopReason::CriticalError(msg) => tracing::error!("❌ 处理中止: {}", msg),
            other => tracing::info!("⏹️ 停止: {}", other),
        }
        self.state = PipelineState::Stopped(reason.clone());
        Step::Stopped(reason)
    }

    /// 处理一帧
    pub fn step(&mut self) -> Step<'_> {
        match &self.state {
            PipelineState::Writing => {}
            PipelineState::Stopped(r) | PipelineState::Finalized(r) => {
                return Step::Stopped(r.clone())
            }
            // 构造完成后不会停留在这两个状态
            PipelineState::Opened | PipelineState::Validated => {
                return Step::Stopped(StopReason::CriticalError("流水线未就绪".to_string()))
            }
        }

        if self.cancel_pending {
            return self.stop(StopReason::UserCancelled);
        }

        self.started.get_or_insert_with(Instant::now);
        if self.elapsed() >= self.settings.budget.limit() {
            return self.stop(StopReason::TimeLimitReached);
        }

        let frame = match self.source.read_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => return self.stop(StopReason::EndOfStream),
            Err(e) => return self.stop(StopReason::CriticalError(e.to_string())),
        };
        let index = self.frames_read;
        self.frames_read += 1;

        if index % self.settings.skip_interval as u64 != 0 {
            self.frames_skipped += 1;
            return Step::Skipped;
        }

        let mut frame = match normalize(frame, self.settings.max_width) {
            Ok(frame) => frame,
            Err(e) if !e.is_fatal_in_loop() => {
                tracing::warn!("⚠️ 第 {} 帧已丢弃: {}", index, e);
                self.frames_dropped += 1;
                return Step::Skipped;
            }
            Err(e) => return self.stop(StopReason::CriticalError(e.to_string())),
        };

        let boxes = match self.detector.detect(&frame, &self.settings.params) {
            Ok(boxes) => boxes,
            Err(e) => return self.stop(StopReason::CriticalError(e.to_string())),
        };
        self.detections += boxes.len() as u64;
        tracing::trace!("第 {} 帧: {} 个行人", index, boxes.len());

        draw_boxes(&mut frame, &boxes);
        if let Err(e) = self.sink.write_frame(&frame) {
            return self.stop(StopReason::CriticalError(e.to_string()));
        }

        Step::Frame(self.current.insert(frame))
    }

    /// 释放写入器和视频源, 只执行一次
    ///
    /// 未停止时按用户取消处理. 返回写入器收尾的结果
    pub fn finalize(&mut self) -> PipelineResult<()> {
        let reason = match &self.state {
            PipelineState::Finalized(_) => return Ok(()),
            PipelineState::Stopped(r) => r.clone(),
            _ => StopReason::UserCancelled,
        };
        self.state = PipelineState::Finalized(reason);

        let result = self.sink.finish();
        self.source.close();
        self.current = None;

        tracing::info!(
            "🏁 已收尾: 读取 {} 帧, 写入 {} 帧, 跳过 {} 帧, 丢弃 {} 帧, 累计 {} 个检测框",
            self.frames_read,
            self.sink.frames_written(),
            self.frames_skipped,
            self.frames_dropped,
            self.detections
        );
        result
    }

    pub fn report(&self) -> VideoReport {
        VideoReport {
            reason: self.state.stop_reason().cloned(),
            frames_read: self.frames_read,
            frames_written: self.sink.frames_written(),
            frames_skipped: self.frames_skipped,
            frames_dropped: self.frames_dropped,
            detections: self.detections,
            output: self.output.clone(),
        }
    }

    /// 阻塞运行到停止, 然后收尾并关闭显示
    pub fn run<V: Viewer + ?Sized>(&mut self, viewer: &mut V) -> PipelineResult<VideoReport> {
        let mut display_ok = true;
        loop {
            if viewer.cancel_requested() {
                self.cancel();
            }
            match self.step() {
                Step::Frame(frame) => {
                    if display_ok {
                        if let Err(e) = viewer.show(frame) {
                            tracing::warn!("⚠️ {}, 继续无界面运行", e);
                            display_ok = false;
                        }
                    }
                }
                Step::Skipped => {}
                Step::Stopped(_) => break,
            }
        }

        let finished = self.finalize();
        viewer.close();
        finished?;
        Ok(self.report())
    }
}

impl<S, K, D> Drop for VideoPipeline<S, K, D>
where
    S: VideoSource,
    K: VideoSink,
    D: PersonDetector,
{
    fn drop(&mut self) {
        if !self.is_finalized() {
            if let Err(e) = self.finalize() {
                tracing::error!("❌ 收尾失败: {}", e);
            }
        }
    }
}

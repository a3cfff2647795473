//! 集成测试用的内存替身: 视频源 / 写入器 / 检测器 / 显示
#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use image::{Rgb, RgbImage};
use pedestrian_rs::detection::{BoundingBox, DetectParams, PersonDetector};
use pedestrian_rs::error::{PipelineError, PipelineResult};
use pedestrian_rs::frame::Frame;
use pedestrian_rs::input::{VideoMetadata, VideoSource};
use pedestrian_rs::output::{SinkSpec, VideoSink};
use pedestrian_rs::viewer::Viewer;

/// 测试日志, 重复调用无副作用
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "debug".into()),
        )
        .with_test_writer()
        .try_init();
}

pub fn metadata(fps: f64, width: u32, height: u32) -> VideoMetadata {
    VideoMetadata {
        fps,
        width,
        height,
        frame_count: None,
        codec: "h264".to_string(),
    }
}

/// 生成固定数量的纯色帧
pub struct MockSource {
    meta: VideoMetadata,
    total: u64,
    read: u64,
    fail_at: Option<u64>,
    empty_at: Option<u64>,
    pub closes: Rc<Cell<u32>>,
}

impl MockSource {
    pub fn new(meta: VideoMetadata, total: u64) -> Self {
        Self {
            meta,
            total,
            read: 0,
            fail_at: None,
            empty_at: None,
            closes: Rc::new(Cell::new(0)),
        }
    }

    /// 第 `index` 次读取返回错误
    pub fn failing_at(mut self, index: u64) -> Self {
        self.fail_at = Some(index);
        self
    }

    /// 第 `index` 帧是 0x0 的空帧 (无法缩放)
    pub fn empty_frame_at(mut self, index: u64) -> Self {
        self.empty_at = Some(index);
        self
    }
}

impl VideoSource for MockSource {
    fn metadata(&self) -> &VideoMetadata {
        &self.meta
    }

    fn read_frame(&mut self) -> PipelineResult<Option<Frame>> {
        if self.fail_at == Some(self.read) {
            return Err(PipelineError::Open {
                path: PathBuf::from("mock.mp4"),
                reason: "decoder crashed".to_string(),
            });
        }
        if self.read >= self.total {
            return Ok(None);
        }
        self.read += 1;
        if self.empty_at == Some(self.read - 1) {
            return Ok(Some(RgbImage::new(0, 0)));
        }
        Ok(Some(RgbImage::from_pixel(
            self.meta.width,
            self.meta.height,
            Rgb([90, 90, 90]),
        )))
    }

    fn close(&mut self) {
        self.closes.set(self.closes.get() + 1);
    }

    fn frames_read(&self) -> u64 {
        self.read
    }
}

/// 写入器的共享记录
#[derive(Debug, Default)]
pub struct SinkLog {
    pub spec: Option<SinkSpec>,
    pub path: Option<PathBuf>,
    pub frames: Vec<(u32, u32)>,
    pub green_frames: u64,
    pub finishes: u32,
}

pub struct MockSink {
    spec: SinkSpec,
    log: Rc<RefCell<SinkLog>>,
    fail_at: Option<usize>,
    written: u64,
}

impl VideoSink for MockSink {
    fn write_frame(&mut self, frame: &Frame) -> PipelineResult<()> {
        let mut log = self.log.borrow_mut();
        if self.fail_at == Some(log.frames.len()) {
            return Err(PipelineError::Write {
                path: PathBuf::from("out.mp4"),
                reason: "disk full".to_string(),
            });
        }
        if frame.dimensions() != (self.spec.width, self.spec.height) {
            return Err(PipelineError::Write {
                path: PathBuf::from("out.mp4"),
                reason: "size mismatch".to_string(),
            });
        }
        if frame.pixels().any(|p| p.0 == [0, 255, 0]) {
            log.green_frames += 1;
        }
        log.frames.push(frame.dimensions());
        self.written += 1;
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.written
    }

    fn finish(&mut self) -> PipelineResult<()> {
        self.log.borrow_mut().finishes += 1;
        Ok(())
    }
}

/// 记录写入器创建次数, 返回可直接交给 `VideoPipeline::new` 的工厂
pub struct SinkFactory {
    pub log: Rc<RefCell<SinkLog>>,
    pub opened: Rc<Cell<u32>>,
    fail_at: Option<usize>,
}

impl SinkFactory {
    pub fn new() -> Self {
        Self {
            log: Rc::new(RefCell::new(SinkLog::default())),
            opened: Rc::new(Cell::new(0)),
            fail_at: None,
        }
    }

    /// 第 `index` 次写入失败
    pub fn failing_at(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }

    pub fn opener(&self) -> impl FnOnce(&Path, SinkSpec) -> PipelineResult<MockSink> {
        let log = Rc::clone(&self.log);
        let opened = Rc::clone(&self.opened);
        let fail_at = self.fail_at;
        move |path: &Path, spec: SinkSpec| {
            spec.validate()?;
            opened.set(opened.get() + 1);
            {
                let mut l = log.borrow_mut();
                l.spec = Some(spec.clone());
                l.path = Some(path.to_path_buf());
            }
            Ok(MockSink {
                spec,
                log,
                fail_at,
                written: 0,
            })
        }
    }
}

/// 每帧返回相同的检测框, 可以指定第几次调用失败
pub struct FixedDetector {
    boxes: Vec<BoundingBox>,
    fail_on_call: Option<usize>,
    delay: Option<Duration>,
    pub calls: Rc<Cell<usize>>,
}

impl FixedDetector {
    pub fn new(boxes: Vec<BoundingBox>) -> Self {
        Self {
            boxes,
            fail_on_call: None,
            delay: None,
            calls: Rc::new(Cell::new(0)),
        }
    }

    pub fn failing_on_call(mut self, call: usize) -> Self {
        self.fail_on_call = Some(call);
        self
    }

    /// 每次检测前休眠, 模拟慢速检测
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

impl PersonDetector for FixedDetector {
    fn detect(&mut self, _frame: &Frame, _params: &DetectParams) -> PipelineResult<Vec<BoundingBox>> {
        let call = self.calls.get();
        self.calls.set(call + 1);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if self.fail_on_call == Some(call) {
            return Err(PipelineError::Detection("classifier exploded".to_string()));
        }
        Ok(self.boxes.clone())
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

/// 显示了 `cancel_after` 帧之后请求取消
#[derive(Default)]
pub struct ScriptedViewer {
    pub shown: u64,
    pub waits: u32,
    pub closes: u32,
    pub cancel_after: Option<u64>,
    pub fail_show: bool,
}

impl Viewer for ScriptedViewer {
    fn show(&mut self, _frame: &Frame) -> PipelineResult<()> {
        if self.fail_show {
            return Err(PipelineError::Display("no display server".to_string()));
        }
        self.shown += 1;
        Ok(())
    }

    fn cancel_requested(&mut self) -> bool {
        self.cancel_after.map_or(false, |n| self.shown >= n)
    }

    fn wait_any_key(&mut self) {
        self.waits += 1;
    }

    fn close(&mut self) {
        self.closes += 1;
    }
}

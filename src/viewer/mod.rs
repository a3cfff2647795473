/// 画面显示 (Viewer)
///
/// - Viewer:        显示接口 (显示帧 / 查询取消 / 等待按键)
/// - HeadlessViewer: 无界面运行
/// - window:        macroquad 窗口前端
pub mod window;

pub use window::{run_video_window, ImageWindow};

use crate::error::PipelineResult;
use crate::frame::Frame;

/// 视频模式下的取消按键
pub const CANCEL_KEY: char = 'q';

pub trait Viewer {
    fn show(&mut self, frame: &Frame) -> PipelineResult<()>;

    /// 用户是否请求停止 (视频模式按 q)
    fn cancel_requested(&mut self) -> bool;

    /// 阻塞直到任意键按下 (图片模式)
    fn wait_any_key(&mut self);

    /// 关闭显示, 重复调用无副作用
    fn close(&mut self);
}

impl<V: Viewer + ?Sized> Viewer for Box<V> {
    fn show(&mut self, frame: &Frame) -> PipelineResult<()> {
        (**self).show(frame)
    }

    fn cancel_requested(&mut self) -> bool {
        (**self).cancel_requested()
    }

    fn wait_any_key(&mut self) {
        (**self).wait_any_key()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// 不显示任何画面, 从不取消
#[derive(Debug, Default)]
pub struct HeadlessViewer {
    frames_shown: u64,
}

impl HeadlessViewer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames_shown(&self) -> u64 {
        self.frames_shown
    }
}

impl Viewer for HeadlessViewer {
    fn show(&mut self, _frame: &Frame) -> PipelineResult<()> {
        self.frames_shown += 1;
        Ok(())
    }

    fn cancel_requested(&mut self) -> bool {
        false
    }

    fn wait_any_key(&mut self) {}

    fn close(&mut self) {}
}

/// 当前环境能否打开窗口
#[cfg(all(unix, not(target_os = "macos")))]
pub fn display_available() -> bool {
    ["DISPLAY", "WAYLAND_DISPLAY"]
        .iter()
        .any(|var| std::env::var_os(var).map_or(false, |v| !v.is_empty()))
}

#[cfg(not(all(unix, not(target_os = "macos"))))]
pub fn display_available() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[test]
    fn test_headless_viewer_never_cancels() {
        let mut viewer = HeadlessViewer::new();
        viewer.show(&RgbImage::new(2, 2)).unwrap();
        viewer.show(&RgbImage::new(2, 2)).unwrap();
        assert!(!viewer.cancel_requested());
        viewer.wait_any_key();
        viewer.close();
        viewer.close();
        assert_eq!(viewer.frames_shown(), 2);
    }

    #[test]
    fn test_boxed_viewer_delegates() {
        let mut viewer: Box<dyn Viewer> = Box::new(HeadlessViewer::new());
        assert!(viewer.show(&RgbImage::new(1, 1)).is_ok());
        assert!(!viewer.cancel_requested());
    }
}

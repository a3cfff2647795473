/// macroquad 窗口前端
///
/// - ImageWindow:      图片模式, 显示结果直到任意键按下
/// - run_video_window: 视频模式, 每渲染一帧推进一次流水线, 按 q 取消
use macroquad::prelude::*;
use macroquad::Window;
use std::cell::RefCell;
use std::rc::Rc;

use super::Viewer;
use crate::detection::PersonDetector;
use crate::error::{PipelineError, PipelineResult};
use crate::frame::Frame;
use crate::input::VideoSource;
use crate::output::VideoSink;
use crate::pipeline::{Step, VideoPipeline, VideoReport};

fn window_conf(title: &str, width: u32, height: u32) -> Conf {
    Conf {
        window_title: title.to_string(),
        window_width: width.max(1) as i32,
        window_height: height.max(1) as i32,
        window_resizable: true,
        ..Default::default()
    }
}

/// RGB 帧转为 macroquad 需要的 RGBA 字节
fn rgba_bytes(frame: &Frame) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(frame.width() as usize * frame.height() as usize * 4);
    for px in frame.pixels() {
        bytes.extend_from_slice(&[px[0], px[1], px[2], 255]);
    }
    bytes
}

/// 纹理尺寸上限为 u16
fn texture_size(frame: &Frame) -> PipelineResult<(u16, u16)> {
    match (u16::try_from(frame.width()), u16::try_from(frame.height())) {
        (Ok(w), Ok(h)) => Ok((w, h)),
        _ => Err(PipelineError::Display(format!(
            "帧尺寸 {}x{} 超出纹理上限 {}",
            frame.width(),
            frame.height(),
            u16::MAX
        ))),
    }
}

/// 上传帧到纹理; 尺寸不变时复用纹理
fn upload(texture: &mut Option<Texture2D>, frame: &Frame) -> PipelineResult<()> {
    let (w, h) = texture_size(frame)?;
    let bytes = rgba_bytes(frame);
    match texture {
        Some(tex) if tex.width() == w as f32 && tex.height() == h as f32 => {
            tex.update(&Image {
                bytes,
                width: w,
                height: h,
            });
        }
        _ => {
            let tex = Texture2D::from_rgba8(w, h, &bytes);
            tex.set_filter(FilterMode::Linear);
            *texture = Some(tex);
        }
    }
    Ok(())
}

fn draw_frame(texture: &Option<Texture2D>) {
    clear_background(BLACK);
    if let Some(tex) = texture {
        draw_texture_ex(
            tex,
            0.0,
            0.0,
            WHITE,
            DrawTextureParams {
                dest_size: Some(vec2(screen_width(), screen_height())),
                ..Default::default()
            },
        );
    }
}

/// 图片结果窗口
pub struct ImageWindow {
    title: String,
    frame: Option<Frame>,
}

impl ImageWindow {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            frame: None,
        }
    }
}

impl Viewer for ImageWindow {
    fn show(&mut self, frame: &Frame) -> PipelineResult<()> {
        texture_size(frame)?;
        self.frame = Some(frame.clone());
        Ok(())
    }

    fn cancel_requested(&mut self) -> bool {
        false
    }

    fn wait_any_key(&mut self) {
        let Some(frame) = self.frame.take() else {
            return;
        };
        let conf = window_conf(&self.title, frame.width(), frame.height());
        tracing::info!("🖥️ 按任意键关闭窗口");
        Window::from_config(conf, async move {
            let mut texture = None;
            if let Err(e) = upload(&mut texture, &frame) {
                tracing::warn!("⚠️ {}", e);
                return;
            }
            loop {
                draw_frame(&texture);
                if get_last_key_pressed().is_some() {
                    break;
                }
                next_frame().await;
            }
        });
    }

    fn close(&mut self) {
        self.frame = None;
    }
}

/// 在窗口中运行视频流水线
///
/// 窗口被直接关闭时按用户取消处理; 无论哪种方式结束都只收尾一次
pub fn run_video_window<S, K, D>(
    pipeline: VideoPipeline<S, K, D>,
    title: &str,
) -> PipelineResult<VideoReport>
where
    S: VideoSource + 'static,
    K: VideoSink + 'static,
    D: PersonDetector + 'static,
{
    let (w, h) = pipeline.output_size();
    let shared = Rc::new(RefCell::new(pipeline));
    let driver = Rc::clone(&shared);

    tracing::info!("🖥️ 按 q 停止处理");
    Window::from_config(window_conf(title, w, h), async move {
        let mut texture: Option<Texture2D> = None;
        let mut display_ok = true;
        loop {
            let stopped = {
                let mut pipeline = driver.borrow_mut();
                if is_key_pressed(KeyCode::Q) {
                    pipeline.cancel();
                }
                match pipeline.step() {
                    Step::Frame(frame) => {
                        if display_ok {
                            if let Err(e) = upload(&mut texture, frame) {
                                tracing::warn!("⚠️ {}, 继续处理但不再刷新画面", e);
                                display_ok = false;
                            }
                        }
                        false
                    }
                    Step::Skipped => false,
                    Step::Stopped(_) => true,
                }
            };
            if stopped {
                break;
            }
            draw_frame(&texture);
            next_frame().await;
        }
    });

    let mut pipeline = shared.borrow_mut();
    pipeline.finalize()?;
    Ok(pipeline.report())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_rgba_bytes() {
        let frame = RgbImage::from_pixel(2, 1, Rgb([1, 2, 3]));
        assert_eq!(rgba_bytes(&frame), vec![1, 2, 3, 255, 1, 2, 3, 255]);
    }

    #[test]
    fn test_texture_size_limit() {
        assert_eq!(texture_size(&RgbImage::new(500, 281)).unwrap(), (500, 281));
        assert!(matches!(
            texture_size(&RgbImage::new(70_000, 1)),
            Err(PipelineError::Display(_))
        ));

        let mut window = ImageWindow::new("test");
        assert!(window.show(&RgbImage::new(1, 70_000)).is_err());
        assert!(window.frame.is_none());
    }

    #[test]
    fn test_window_conf_uses_frame_size() {
        let conf = window_conf("Pedestrian Detection", 500, 281);
        assert_eq!(conf.window_width, 500);
        assert_eq!(conf.window_height, 281);
        assert_eq!(conf.window_title, "Pedestrian Detection");
    }
}

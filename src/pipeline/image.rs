/// 图片检测流水线
use std::path::PathBuf;
use std::time::Instant;

use super::MediaPaths;
use crate::annotate::draw_boxes;
use crate::detection::{DetectParams, PersonDetector};
use crate::error::PipelineResult;
use crate::frame::normalize;
use crate::input::{load_image, resolve_input};
use crate::output::{prepare_output_dir, save_image};
use crate::viewer::Viewer;

/// 图片运行结果
#[derive(Debug, Clone, PartialEq)]
pub struct ImageReport {
    /// 缩放后的尺寸
    pub width: u32,
    pub height: u32,
    pub detections: usize,
    pub output: PathBuf,
}

pub struct ImagePipeline {
    max_width: u32,
    params: DetectParams,
}

impl ImagePipeline {
    pub fn new(max_width: u32, params: DetectParams) -> Self {
        Self { max_width, params }
    }

    pub fn params(&self) -> &DetectParams {
        &self.params
    }

    /// 检测单张图片并保存; 可选显示后等待按键
    ///
    /// 显示失败只告警, 其余任何错误都直接返回
    pub fn run<D, V>(
        &self,
        paths: &MediaPaths,
        detector: &mut D,
        viewer: Option<&mut V>,
    ) -> PipelineResult<ImageReport>
    where
        D: PersonDetector + ?Sized,
        V: Viewer + ?Sized,
    {
        let start = Instant::now();
        let input = resolve_input(&paths.input)?;
        prepare_output_dir(&paths.output_dir)?;

        let frame = load_image(&input)?;
        let mut frame = normalize(frame, self.max_width)?;
        let (width, height) = frame.dimensions();
        tracing::debug!("缩放后尺寸: {}x{}", width, height);

        let boxes = detector.detect(&frame, &self.params)?;
        tracing::info!("🚶 检测到 {} 个行人 ({})", boxes.len(), detector.name());

        draw_boxes(&mut frame, &boxes);
        save_image(&frame, &paths.output)?;

        if let Some(viewer) = viewer {
            match viewer.show(&frame) {
                Ok(()) => viewer.wait_any_key(),
                Err(e) => tracing::warn!("⚠️ {}", e),
            }
            viewer.close();
        }

        tracing::info!("⏱️ 图片处理完成, 耗时 {:.2}s", start.elapsed().as_secs_f64());
        Ok(ImageReport {
            width,
            height,
            detections: boxes.len(),
            output: paths.output.clone(),
        })
    }
}

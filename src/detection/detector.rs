/// HOG + 线性SVM 多尺度行人检测器
///
/// 流程: 图像金字塔 → 每层 reflect-101 补边 → block直方图网格 → 滑动窗口打分 → 聚类
use std::borrow::Cow;
use std::path::Path;
use std::time::Instant;

use super::grouping::{group_rectangles, non_max_suppression};
use super::hog::{pad_reflect101, BlockGrid, HogDescriptor, BLOCK_STRIDE, WIN_HEIGHT, WIN_WIDTH};
use super::svm::LinearSvm;
use super::types::{BoundingBox, DetectParams, Detection};
use super::PersonDetector;
use crate::error::{PipelineError, PipelineResult};
use crate::frame::{resize_exact, Frame};

/// 金字塔最多层数
const MAX_LEVELS: usize = 64;

pub struct HogPersonDetector {
    descriptor: HogDescriptor,
    svm: LinearSvm,
}

impl HogPersonDetector {
    pub fn new(svm: LinearSvm) -> PipelineResult<Self> {
        let descriptor = HogDescriptor::new();
        if svm.len() != descriptor.descriptor_len() {
            return Err(PipelineError::Model(format!(
                "SVM维度 {} 与HOG描述子维度 {} 不一致",
                svm.len(),
                descriptor.descriptor_len()
            )));
        }
        Ok(Self { descriptor, svm })
    }

    /// 从系数文件加载
    pub fn load(model_path: impl AsRef<Path>) -> PipelineResult<Self> {
        let detector = Self::new(LinearSvm::load(model_path)?)?;
        tracing::info!("✅ HOG行人检测器初始化完成");
        Ok(detector)
    }

    pub fn svm(&self) -> &LinearSvm {
        &self.svm
    }

    /// 各层相对原图的缩放系数
    ///
    /// 第0层总是保留; 之后的层只有缩放后仍能容纳一个检测窗口才加入
    pub fn level_scales(width: u32, height: u32, scale: f64) -> Vec<f64> {
        let mut levels = vec![1.0f64];
        if scale <= 1.0 {
            return levels;
        }
        let mut s = scale;
        while levels.len() < MAX_LEVELS {
            if (width as f64 / s).round() < WIN_WIDTH as f64
                || (height as f64 / s).round() < WIN_HEIGHT as f64
            {
                break;
            }
            levels.push(s);
            s *= scale;
        }
        levels
    }

    /// 多尺度扫描, 返回未聚类的原始命中
    pub fn detect_raw(&self, frame: &Frame, params: &DetectParams) -> PipelineResult<Vec<Detection>> {
        let (w, h) = frame.dimensions();
        if w == 0 || h == 0 {
            return Err(PipelineError::Detection(format!("非法帧尺寸 {}x{}", w, h)));
        }
        params.validate().map_err(PipelineError::Detection)?;

        let win_stride = (params.win_stride.0 as usize, params.win_stride.1 as usize);
        let grid_step = (gcd(win_stride.0, BLOCK_STRIDE), gcd(win_stride.1, BLOCK_STRIDE));
        let (pad_x, pad_y) = params.padding;

        let mut hits = Vec::new();
        for level_scale in Self::level_scales(w, h, params.scale) {
            let sw = (w as f64 / level_scale).round() as u32;
            let sh = (h as f64 / level_scale).round() as u32;
            if sw == 0 || sh == 0 {
                break;
            }

            let level: Cow<Frame> = if (sw, sh) == (w, h) {
                Cow::Borrowed(frame)
            } else {
                Cow::Owned(
                    resize_exact(frame, sw, sh)
                        .map_err(|e| PipelineError::Detection(e.to_string()))?,
                )
            };

            let padded = pad_reflect101(&level, pad_x, pad_y);
            let grid = BlockGrid::build(&self.descriptor, &padded, grid_step);

            let before = hits.len();
            for (wx, wy) in grid.window_positions(win_stride) {
                let score = grid.window_score(wx, wy, &self.svm);
                if score < params.hit_threshold {
                    continue;
                }
                let x = wx as f64 - pad_x as f64;
                let y = wy as f64 - pad_y as f64;
                hits.push(Detection {
                    bbox: BoundingBox::new(
                        (x * level_scale).round() as i32,
                        (y * level_scale).round() as i32,
                        (WIN_WIDTH as f64 * level_scale).round() as i32,
                        (WIN_HEIGHT as f64 * level_scale).round() as i32,
                    ),
                    weight: score,
                });
            }
            tracing::trace!(
                "金字塔层 scale={:.3} size={}x{} 命中 {}",
                level_scale,
                sw,
                sh,
                hits.len() - before
            );
        }
        Ok(hits)
    }
}

impl PersonDetector for HogPersonDetector {
    fn detect(&mut self, frame: &Frame, params: &DetectParams) -> PipelineResult<Vec<BoundingBox>> {
        let start = Instant::now();
        let raw = self.detect_raw(frame, params)?;
        let grouped = match params.nms_iou {
            Some(iou) => {
                let mut kept = raw.clone();
                non_max_suppression(&mut kept, iou);
                kept
            }
            None => group_rectangles(&raw, params.group_threshold, params.group_eps),
        };
        tracing::debug!(
            "HOG检测: {} 个原始命中 → {} 个行人, 耗时 {:.1}ms",
            raw.len(),
            grouped.len(),
            start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(grouped.into_iter().map(|d| d.bbox).collect())
    }

    fn name(&self) -> &str {
        "hog-svm"
    }
}

fn gcd(a: usize, b: usize) -> usize {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

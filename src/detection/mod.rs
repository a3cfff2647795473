/// 行人检测系统 (Person Detection)
///
/// - hog:      HOG特征描述子与block直方图网格
/// - svm:      线性SVM系数
/// - detector: 多尺度滑动窗口检测器
/// - grouping: 检测框聚类 / NMS
pub mod detector;
pub mod grouping;
pub mod hog;
pub mod svm;
pub mod types;

pub use detector::HogPersonDetector;
pub use grouping::{group_rectangles, non_max_suppression};
pub use hog::HogDescriptor;
pub use svm::LinearSvm;
pub use types::{BoundingBox, DetectParams, Detection};

use crate::error::PipelineResult;
use crate::frame::Frame;

/// 行人检测器接口
///
/// 返回帧坐标下的检测框, 顺序无意义, 空列表是合法结果
pub trait PersonDetector {
    fn detect(&mut self, frame: &Frame, params: &DetectParams) -> PipelineResult<Vec<BoundingBox>>;

    fn name(&self) -> &str;
}

impl<D: PersonDetector + ?Sized> PersonDetector for Box<D> {
    fn detect(&mut self, frame: &Frame, params: &DetectParams) -> PipelineResult<Vec<BoundingBox>> {
        (**self).detect(frame, params)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

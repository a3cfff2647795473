/// 行人检测数据结构定义
/// Data structures for the pedestrian detector
use serde::{Deserialize, Serialize};

// ========== 数据结构 ==========

/// 检测框 (x, y, width, height), 帧像素坐标
///
/// padding 允许检测窗口越过图像边界, 所以坐标可以为负
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BoundingBox {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn area(&self) -> i64 {
        self.width.max(0) as i64 * self.height.max(0) as i64
    }

    /// `other` 是否完全落在 self 内 (允许 dx/dy 的余量)
    pub fn contains(&self, other: &BoundingBox, dx: i32, dy: i32) -> bool {
        other.x >= self.x - dx
            && other.y >= self.y - dy
            && other.right() <= self.right() + dx
            && other.bottom() <= self.bottom() + dy
    }

    /// 交并比 (用于NMS)
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let l = self.x.max(other.x);
        let r = self.right().min(other.right());
        let t = self.y.max(other.y);
        let b = self.bottom().min(other.bottom());
        let inter = (r - l).max(0) as i64 * (b - t).max(0) as i64;
        let union = self.area() + other.area() - inter;
        if union <= 0 {
            return 0.0;
        }
        inter as f32 / union as f32
    }
}

/// 带置信度的原始检测 (SVM得分或模型置信度)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub weight: f32,
}

/// 检测参数
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectParams {
    /// 滑动窗口步长 (像素)
    pub win_stride: (u32, u32),
    /// 每个候选窗口周围补充的上下文像素
    pub padding: (u32, u32),
    /// 相邻金字塔层的缩放比 (>1.0)
    pub scale: f64,
    /// SVM得分阈值
    #[serde(default)]
    pub hit_threshold: f32,
    /// 聚类后最少需要多于多少个邻居才保留 (0 = 不聚类)
    #[serde(default = "default_group_threshold")]
    pub group_threshold: usize,
    /// 聚类相似度容差
    #[serde(default = "default_group_eps")]
    pub group_eps: f64,
    /// 设置后用 NMS 代替聚类 (IoU阈值)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nms_iou: Option<f32>,
}

fn default_group_threshold() -> usize {
    2
}

fn default_group_eps() -> f64 {
    0.2
}

impl DetectParams {
    /// 图片检测预设: 精度优先
    pub fn image() -> Self {
        Self {
            win_stride: (4, 4),
            padding: (4, 4),
            scale: 1.05,
            hit_threshold: 0.0,
            group_threshold: default_group_threshold(),
            group_eps: default_group_eps(),
            nms_iou: None,
        }
    }

    /// 视频检测预设: 更大的padding与scale, 换取逐帧速度
    pub fn video() -> Self {
        Self {
            win_stride: (4, 4),
            padding: (8, 8),
            scale: 1.06,
            ..Self::image()
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.win_stride.0 == 0 || self.win_stride.1 == 0 {
            return Err(format!("窗口步长必须为正: {:?}", self.win_stride));
        }
        if !(self.scale > 1.0) || !self.scale.is_finite() {
            return Err(format!("缩放比必须大于1.0: {}", self.scale));
        }
        if !(self.group_eps >= 0.0) {
            return Err(format!("聚类容差不能为负: {}", self.group_eps));
        }
        if let Some(iou) = self.nms_iou {
            if !(0.0..=1.0).contains(&iou) {
                return Err(format!("NMS阈值必须在 [0, 1] 内: {}", iou));
            }
        }
        Ok(())
    }
}

impl Default for DetectParams {
    fn default() -> Self {
        Self::image()
    }
}

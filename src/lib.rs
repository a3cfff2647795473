#![allow(clippy::type_complexity)]
// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod annotate; // 检测框绘制
pub mod config; // 命令行与检测参数
pub mod detection; // HOG行人检测
pub mod error; // 错误类型
pub mod ffmpeg; // ffmpeg/ffprobe 子进程封装
pub mod frame; // 帧缩放
pub mod input; // 图片/视频输入
pub mod logging; // 日志初始化
pub mod output; // 图片/视频输出
pub mod pipeline; // 图片/视频流水线
pub mod viewer; // 画面显示

pub use crate::detection::{BoundingBox, DetectParams, HogPersonDetector, PersonDetector};
pub use crate::error::{PipelineError, PipelineResult};
pub use crate::frame::Frame;
pub use crate::pipeline::{
    ImagePipeline, ImageReport, MediaPaths, StopReason, VideoPipeline, VideoReport, VideoSettings,
};

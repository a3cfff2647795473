// 错误处理模块
//
// 每个流水线阶段一个变体, 消息里带上阶段名和原因

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("输入文件不存在: {}", .0.display())]
    NotFound(PathBuf),

    #[error("图片解码失败 '{}': {reason}", path.display())]
    Decode { path: PathBuf, reason: String },

    #[error("视频打开失败 '{}': {reason}", path.display())]
    Open { path: PathBuf, reason: String },

    #[error("视频属性无效: {width}x{height} @ {fps} FPS")]
    InvalidMetadata { fps: f64, width: u32, height: u32 },

    #[error("帧缩放失败: {0}")]
    Resize(String),

    #[error("行人检测失败: {0}")]
    Detection(String),

    #[error("输出写入失败 '{}': {reason}", path.display())]
    Write { path: PathBuf, reason: String },

    #[error("视频写入器初始化失败: {0}")]
    WriterInit(String),

    #[error("无法显示画面: {0}")]
    Display(String),

    #[error("检测模型加载失败: {0}")]
    Model(String),

    #[error("配置错误: {0}")]
    Config(String),
}

impl PipelineError {
    /// 出错的流水线阶段 (用于日志)
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::NotFound(_) => "input",
            PipelineError::Decode { .. }
            | PipelineError::Open { .. }
            | PipelineError::InvalidMetadata { .. } => "loader",
            PipelineError::Resize(_) => "normalizer",
            PipelineError::Detection(_) | PipelineError::Model(_) => "detector",
            PipelineError::Write { .. } | PipelineError::WriterInit(_) => "output",
            PipelineError::Display(_) => "display",
            PipelineError::Config(_) => "config",
        }
    }

    /// 视频逐帧循环中是否需要终止循环
    ///
    /// 缩放失败只跳过当前帧, 显示失败只告警, 其余都视为严重错误
    pub fn is_fatal_in_loop(&self) -> bool {
        !matches!(self, PipelineError::Resize(_) | PipelineError::Display(_))
    }

    /// 转为带阶段说明的 anyhow 错误 (可执行文件顶层使用)
    pub fn into_report(self) -> anyhow::Error {
        let stage = self.stage();
        anyhow::Error::new(self).context(format!("{} 阶段失败", stage))
    }

    pub(crate) fn write(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        PipelineError::Write {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loop_policy() {
        assert!(!PipelineError::Resize("0x0".into()).is_fatal_in_loop());
        assert!(!PipelineError::Display("no display".into()).is_fatal_in_loop());
        assert!(PipelineError::Detection("bad frame".into()).is_fatal_in_loop());
        assert!(PipelineError::write("out.mp4", "broken pipe").is_fatal_in_loop());
    }

    #[test]
    fn test_message_names_stage() {
        let err = PipelineError::NotFound(PathBuf::from("input/video.mp4"));
        assert_eq!(err.stage(), "input");
        assert!(err.to_string().contains("input/video.mp4"));

        let err = PipelineError::InvalidMetadata {
            fps: 0.0,
            width: 640,
            height: 480,
        };
        assert_eq!(err.stage(), "loader");
        assert!(err.to_string().contains("640x480"));
    }

    #[test]
    fn test_report_keeps_stage_and_cause() {
        let report = PipelineError::Resize("0x0".into()).into_report();
        let text = format!("{:#}", report);
        assert!(text.contains("normalizer"));
        assert!(text.contains("0x0"));
        assert!(report.downcast_ref::<PipelineError>().is_some());
    }
}

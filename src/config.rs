//! 命令行与检测参数配置
//!
//! 检测参数可以放在 JSON 文件里调整, 文件不存在时按预设值创建

use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::detection::DetectParams;
use crate::error::{PipelineError, PipelineResult};
use crate::output::DEFAULT_CODEC;
use crate::pipeline::{MediaPaths, TimeBudget, VideoSettings};

// ========== 默认值 ==========

pub const DEFAULT_IMAGE_INPUT: &str = "input/image.png";
pub const DEFAULT_VIDEO_INPUT: &str = "input/video.mp4";
pub const DEFAULT_OUTPUT_DIR: &str = "output";
pub const DEFAULT_MODEL: &str = "models/hog_people.txt";
/// 指定SVM系数文件的环境变量
pub const MODEL_ENV: &str = "PEDESTRIAN_MODEL";
pub const DEFAULT_IMAGE_MAX_WIDTH: u32 = 400;
pub const DEFAULT_VIDEO_MAX_WIDTH: u32 = 500;

/// 图片行人检测
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "图片行人检测 (HOG + 线性SVM)", long_about = None)]
pub struct ImageArgs {
    /// 输入图片
    #[arg(short, long, default_value = DEFAULT_IMAGE_INPUT)]
    pub input: PathBuf,

    /// 输出目录 (结果保存为 image_detected.png)
    #[arg(short, long, default_value = DEFAULT_OUTPUT_DIR)]
    pub output_dir: PathBuf,

    /// 缩放后的最大宽度
    #[arg(long, default_value_t = DEFAULT_IMAGE_MAX_WIDTH)]
    pub max_width: u32,

    /// SVM系数文件 (默认依次查找 $PEDESTRIAN_MODEL, ./models/, 可执行文件旁的 models/)
    #[arg(short, long)]
    pub model: Option<PathBuf>,

    /// 检测参数 JSON 文件 (不存在时按预设创建)
    #[arg(long)]
    pub params: Option<PathBuf>,

    /// 用NMS代替聚类 (IoU阈值)
    #[arg(long)]
    pub nms: Option<f32>,

    /// 不打开窗口
    #[arg(long)]
    pub headless: bool,

    /// 日志详细程度 (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl ImageArgs {
    pub fn paths(&self) -> MediaPaths {
        MediaPaths::for_image(&self.input, &self.output_dir)
    }

    pub fn detect_params(&self) -> PipelineResult<DetectParams> {
        resolve_params(self.params.as_deref(), DetectParams::image(), self.nms)
    }

    pub fn model_path(&self) -> PipelineResult<PathBuf> {
        resolve_model_path(self.model.as_deref())
    }
}

/// 视频行人检测
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "视频行人检测 (HOG + 线性SVM)", long_about = None)]
pub struct VideoArgs {
    /// 输入视频
    #[arg(short, long, default_value = DEFAULT_VIDEO_INPUT)]
    pub input: PathBuf,

    /// 输出目录 (结果保存为 video_detected.mp4)
    #[arg(short, long, default_value = DEFAULT_OUTPUT_DIR)]
    pub output_dir: PathBuf,

    /// 缩放后的最大宽度
    #[arg(long, default_value_t = DEFAULT_VIDEO_MAX_WIDTH)]
    pub max_width: u32,

    /// SVM系数文件 (默认依次查找 $PEDESTRIAN_MODEL, ./models/, 可执行文件旁的 models/)
    #[arg(short, long)]
    pub model: Option<PathBuf>,

    /// 检测参数 JSON 文件 (不存在时按预设创建)
    #[arg(long)]
    pub params: Option<PathBuf>,

    /// 用NMS代替聚类 (IoU阈值)
    #[arg(long)]
    pub nms: Option<f32>,

    /// 运行时间上限 (秒)
    #[arg(short, long, default_value_t = 12.0)]
    pub time_limit: f64,

    /// 按视频时间 (帧数/FPS) 计时, 而不是墙钟时间
    #[arg(long)]
    pub stream_time: bool,

    /// 每隔 N 帧处理一帧
    #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub skip: u32,

    /// ffmpeg 视频编码器
    #[arg(long, default_value = DEFAULT_CODEC)]
    pub codec: String,

    /// 不打开窗口
    #[arg(long)]
    pub headless: bool,

    /// 日志详细程度 (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl VideoArgs {
    pub fn paths(&self) -> MediaPaths {
        MediaPaths::for_video(&self.input, &self.output_dir)
    }

    pub fn model_path(&self) -> PipelineResult<PathBuf> {
        resolve_model_path(self.model.as_deref())
    }

    pub fn settings(&self) -> PipelineResult<VideoSettings> {
        if !(self.time_limit > 0.0) || !self.time_limit.is_finite() {
            return Err(PipelineError::Config(format!(
                "时间上限必须为正数: {}",
                self.time_limit
            )));
        }
        let limit = Duration::from_secs_f64(self.time_limit);
        Ok(VideoSettings {
            max_width: self.max_width,
            params: resolve_params(self.params.as_deref(), DetectParams::video(), self.nms)?,
            budget: if self.stream_time {
                TimeBudget::StreamTime(limit)
            } else {
                TimeBudget::WallClock(limit)
            },
            skip_interval: self.skip,
            codec: self.codec.clone(),
        })
    }
}

/// 系数文件查找顺序: 命令行 > 环境变量 > 工作目录 models/ > 可执行文件旁 models/
fn model_candidates(
    explicit: Option<&Path>,
    env: Option<PathBuf>,
    exe_dir: Option<PathBuf>,
) -> Vec<PathBuf> {
    if let Some(path) = explicit {
        return vec![path.to_path_buf()];
    }
    let mut candidates: Vec<PathBuf> = env.into_iter().collect();
    candidates.push(PathBuf::from(DEFAULT_MODEL));
    if let Some(dir) = exe_dir {
        candidates.push(dir.join(DEFAULT_MODEL));
    }
    candidates
}

fn pick_model(candidates: Vec<PathBuf>, explicit: bool) -> PipelineResult<PathBuf> {
    if explicit {
        // 显式指定的路径交给加载阶段报告具体错误
        return candidates
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::Model("未指定SVM系数文件".to_string()));
    }
    if let Some(found) = candidates.iter().find(|p| p.is_file()) {
        return Ok(found.clone());
    }
    let searched: Vec<String> = candidates.iter().map(|p| p.display().to_string()).collect();
    Err(PipelineError::Model(format!(
        "未找到SVM系数文件 (已查找: {}). 请用 --model 或环境变量 {} 指定 \
         OpenCV HOGDescriptor::getDefaultPeopleDetector() 导出的 {} 个权重加 1 个偏置",
        searched.join(", "),
        MODEL_ENV,
        crate::detection::hog::DESCRIPTOR_LEN
    )))
}

/// 解析SVM系数文件路径
pub fn resolve_model_path(explicit: Option<&Path>) -> PipelineResult<PathBuf> {
    let env = std::env::var_os(MODEL_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from);
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf));
    let path = pick_model(model_candidates(explicit, env, exe_dir), explicit.is_some())?;
    tracing::debug!("SVM系数文件: {}", path.display());
    Ok(path)
}

fn resolve_params(
    file: Option<&Path>,
    preset: DetectParams,
    nms: Option<f32>,
) -> PipelineResult<DetectParams> {
    let mut params = match file {
        Some(path) => load_params(path, preset)?,
        None => preset,
    };
    if nms.is_some() {
        params.nms_iou = nms;
    }
    params.validate().map_err(PipelineError::Config)?;
    Ok(params)
}

/// 从JSON文件加载检测参数; 文件不存在时写入预设值
pub fn load_params(path: &Path, preset: DetectParams) -> PipelineResult<DetectParams> {
    match fs::read_to_string(path) {
        Ok(json) => {
            let params: DetectParams = serde_json::from_str(&json).map_err(|e| {
                PipelineError::Config(format!("解析 '{}' 失败: {}", path.display(), e))
            })?;
            tracing::info!("✅ 检测参数已从 {} 加载", path.display());
            Ok(params)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!("📝 参数文件不存在, 创建默认配置...");
            save_params(path, &preset)?;
            Ok(preset)
        }
        Err(e) => Err(PipelineError::Config(format!(
            "读取 '{}' 失败: {}",
            path.display(),
            e
        ))),
    }
}

/// 保存检测参数到JSON文件
pub fn save_params(path: &Path, params: &DetectParams) -> PipelineResult<()> {
    let json = serde_json::to_string_pretty(params)
        .map_err(|e| PipelineError::Config(format!("序列化参数失败: {}", e)))?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| PipelineError::write(parent, e))?;
    }
    fs::write(path, json).map_err(|e| PipelineError::write(path, e))?;
    tracing::info!("💾 检测参数已保存到 {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_defaults() {
        let args = ImageArgs::parse_from(["pedestrian-image"]);
        assert_eq!(args.input, PathBuf::from("input/image.png"));
        assert_eq!(args.max_width, 400);
        assert!(!args.headless);
        assert_eq!(args.paths().output, Path::new("output").join("image_detected.png"));
        assert_eq!(args.detect_params().unwrap(), DetectParams::image());
    }

    #[test]
    fn test_video_defaults() {
        let args = VideoArgs::parse_from(["pedestrian-video"]);
        assert_eq!(args.input, PathBuf::from("input/video.mp4"));
        let settings = args.settings().unwrap();
        assert_eq!(settings, VideoSettings::default());
        assert_eq!(args.paths().output, Path::new("output").join("video_detected.mp4"));
    }

    #[test]
    fn test_video_flags() {
        let args = VideoArgs::parse_from([
            "pedestrian-video",
            "--stream-time",
            "-t",
            "5",
            "--skip",
            "3",
            "--nms",
            "0.4",
            "--headless",
        ]);
        let settings = args.settings().unwrap();
        assert_eq!(settings.budget, TimeBudget::StreamTime(Duration::from_secs(5)));
        assert_eq!(settings.skip_interval, 3);
        assert_eq!(settings.params.nms_iou, Some(0.4));
        assert!(args.headless);
    }

    #[test]
    fn test_model_flag_is_optional() {
        assert_eq!(ImageArgs::parse_from(["pedestrian-image"]).model, None);
        let args = VideoArgs::parse_from(["pedestrian-video", "-m", "svm.json"]);
        assert_eq!(args.model_path().unwrap(), PathBuf::from("svm.json"));
    }

    #[test]
    fn test_model_candidates_order() {
        let candidates = model_candidates(
            None,
            Some(PathBuf::from("/opt/people.txt")),
            Some(PathBuf::from("/usr/local/bin")),
        );
        assert_eq!(
            candidates,
            vec![
                PathBuf::from("/opt/people.txt"),
                PathBuf::from(DEFAULT_MODEL),
                Path::new("/usr/local/bin").join(DEFAULT_MODEL),
            ]
        );

        let explicit = model_candidates(Some(Path::new("mine.txt")), Some(PathBuf::from("/opt/x")), None);
        assert_eq!(explicit, vec![PathBuf::from("mine.txt")]);
    }

    #[test]
    fn test_pick_model_uses_first_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.txt");
        let present = dir.path().join("models").join("hog_people.txt");
        fs::create_dir_all(present.parent().unwrap()).unwrap();
        fs::write(&present, "0.0").unwrap();

        let picked = pick_model(vec![missing.clone(), present.clone()], false).unwrap();
        assert_eq!(picked, present);

        // 显式路径不做存在性检查
        assert_eq!(pick_model(vec![missing.clone()], true).unwrap(), missing);
    }

    #[test]
    fn test_missing_model_error_names_search_paths() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nowhere.txt");
        match pick_model(vec![missing.clone()], false) {
            Err(PipelineError::Model(msg)) => {
                assert!(msg.contains(&missing.display().to_string()));
                assert!(msg.contains(MODEL_ENV));
                assert!(msg.contains("3780"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_skip_zero_rejected_by_parser() {
        assert!(VideoArgs::try_parse_from(["pedestrian-video", "--skip", "0"]).is_err());
    }

    #[test]
    fn test_non_positive_time_limit() {
        let args = VideoArgs::parse_from(["pedestrian-video", "-t", "0"]);
        assert!(matches!(args.settings(), Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_missing_params_file_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg").join("params.json");
        let params = load_params(&path, DetectParams::video()).unwrap();
        assert_eq!(params, DetectParams::video());
        assert!(path.exists());

        // 修改后重新加载
        let mut edited = params.clone();
        edited.win_stride = (8, 8);
        save_params(&path, &edited).unwrap();
        assert_eq!(load_params(&path, DetectParams::video()).unwrap(), edited);
    }

    #[test]
    fn test_broken_params_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("params.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            load_params(&path, DetectParams::image()),
            Err(PipelineError::Config(_))
        ));
    }
}

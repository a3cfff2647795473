// FFmpeg 命令行封装
//
// 视频解码/编码通过 ffmpeg / ffprobe 子进程完成, 这里负责
// 工具路径解析、ffprobe JSON 解析和编码器列表查询

use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::{PipelineError, PipelineResult};
use crate::input::VideoMetadata;

/// 指定 ffmpeg/ffprobe 所在目录的环境变量
pub const TOOL_DIR_ENV: &str = "PEDESTRIAN_FFMPEG_DIR";

// `ffmpeg -encoders` 的条目行, 例如 " V....D mpeg4    MPEG-4 part 2"
static ENCODER_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*([VAS])[A-Z.]{5}\s+([A-Za-z0-9_\-]+)\s").unwrap());

static ENCODER_CACHE: OnceCell<Vec<String>> = OnceCell::new();

/// 解析工具路径: 环境变量目录 > 可执行文件旁的 ffmpeg/ 目录 > 同级目录 > PATH
pub fn resolve_tool_path(tool_name: &str) -> PathBuf {
    let file_name = format!("{}{}", tool_name, std::env::consts::EXE_SUFFIX);

    if let Some(dir) = std::env::var_os(TOOL_DIR_ENV) {
        let tool_path = Path::new(&dir).join(&file_name);
        if tool_path.exists() {
            return tool_path;
        }
    }

    if let Some(exe_dir) = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
    {
        for candidate in [exe_dir.join("ffmpeg").join(&file_name), exe_dir.join(&file_name)] {
            if candidate.exists() {
                return candidate;
            }
        }
    }

    PathBuf::from(tool_name)
}

/// 创建工具命令 (Windows 下不弹出控制台窗口)
#[cfg(target_os = "windows")]
pub fn tool_command(tool_name: &str) -> Command {
    use std::os::windows::process::CommandExt;
    const CREATE_NO_WINDOW: u32 = 0x08000000;

    let mut cmd = Command::new(resolve_tool_path(tool_name));
    cmd.creation_flags(CREATE_NO_WINDOW);
    cmd
}

#[cfg(not(target_os = "windows"))]
pub fn tool_command(tool_name: &str) -> Command {
    Command::new(resolve_tool_path(tool_name))
}

/// 解析 "30000/1001" 或 "25" 形式的帧率, 无法解析时返回 0
pub fn parse_frame_rate(text: &str) -> f64 {
    let text = text.trim();
    match text.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().unwrap_or(0.0);
            let den: f64 = den.trim().parse().unwrap_or(0.0);
            if den > 0.0 {
                num / den
            } else {
                0.0
            }
        }
        None => text.parse().unwrap_or(0.0),
    }
}

/// 从 ffprobe 的 JSON 输出中取第一个视频流的属性 (不做有效性检查)
pub fn parse_probe_output(json_text: &str) -> Result<VideoMetadata, String> {
    let json: serde_json::Value =
        serde_json::from_str(json_text).map_err(|e| format!("解析 ffprobe 输出失败: {}", e))?;

    let streams = json["streams"]
        .as_array()
        .ok_or_else(|| "无法获取流信息".to_string())?;

    let stream = streams
        .iter()
        .find(|s| s["codec_type"].as_str() == Some("video"))
        .ok_or_else(|| "文件中没有视频流".to_string())?;

    let fps = stream["r_frame_rate"]
        .as_str()
        .map(parse_frame_rate)
        .filter(|fps| *fps > 0.0)
        .or_else(|| stream["avg_frame_rate"].as_str().map(parse_frame_rate))
        .unwrap_or(0.0);

    Ok(VideoMetadata {
        fps,
        width: stream["width"].as_u64().unwrap_or(0) as u32,
        height: stream["height"].as_u64().unwrap_or(0) as u32,
        frame_count: stream["nb_frames"]
            .as_str()
            .and_then(|s| s.parse::<u64>().ok()),
        codec: stream["codec_name"].as_str().unwrap_or("").to_string(),
    })
}

/// 用 ffprobe 读取视频属性
pub fn probe(path: &Path) -> PipelineResult<VideoMetadata> {
    let open_err = |reason: String| PipelineError::Open {
        path: path.to_path_buf(),
        reason,
    };

    let output = tool_command("ffprobe")
        .args(["-v", "quiet", "-print_format", "json", "-show_streams"])
        .arg(path)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| open_err(format!("ffprobe 执行失败: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(open_err(format!("ffprobe 错误: {}", stderr.trim())));
    }

    parse_probe_output(&String::from_utf8_lossy(&output.stdout)).map_err(open_err)
}

/// 从 `ffmpeg -encoders` 的输出中提取视频编码器名称
pub fn parse_encoder_list(text: &str) -> Vec<String> {
    ENCODER_LINE
        .captures_iter(text)
        .filter(|cap| &cap[1] == "V")
        .map(|cap| cap[2].to_string())
        .collect()
}

/// 本机 ffmpeg 支持的视频编码器 (首次查询后缓存)
pub fn available_encoders() -> PipelineResult<&'static [String]> {
    ENCODER_CACHE
        .get_or_try_init(|| {
            let output = tool_command("ffmpeg")
                .args(["-hide_banner", "-encoders"])
                .stdin(Stdio::null())
                .stderr(Stdio::null())
                .output()
                .map_err(|e| PipelineError::WriterInit(format!("无法启动 ffmpeg: {}", e)))?;
            if !output.status.success() {
                return Err(PipelineError::WriterInit(
                    "ffmpeg -encoders 执行失败".to_string(),
                ));
            }
            let encoders = parse_encoder_list(&String::from_utf8_lossy(&output.stdout));
            tracing::debug!("ffmpeg 可用视频编码器 {} 个", encoders.len());
            Ok(encoders)
        })
        .map(Vec::as_slice)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_rate() {
        assert_eq!(parse_frame_rate("30/1"), 30.0);
        assert!((parse_frame_rate("30000/1001") - 29.97).abs() < 0.01);
        assert_eq!(parse_frame_rate("25"), 25.0);
        assert_eq!(parse_frame_rate("0/0"), 0.0);
        assert_eq!(parse_frame_rate("abc"), 0.0);
    }

    #[test]
    fn test_parse_probe_output() {
        let json = r#"{
            "streams": [
                { "codec_type": "audio", "codec_name": "aac" },
                {
                    "codec_type": "video",
                    "codec_name": "h264",
                    "width": 1280,
                    "height": 720,
                    "r_frame_rate": "30/1",
                    "nb_frames": "900"
                }
            ]
        }"#;
        let meta = parse_probe_output(json).unwrap();
        assert_eq!(meta.width, 1280);
        assert_eq!(meta.height, 720);
        assert_eq!(meta.fps, 30.0);
        assert_eq!(meta.frame_count, Some(900));
        assert_eq!(meta.codec, "h264");
    }

    #[test]
    fn test_probe_output_without_video_stream() {
        let json = r#"{ "streams": [ { "codec_type": "audio" } ] }"#;
        assert!(parse_probe_output(json).is_err());
        assert!(parse_probe_output("not json").is_err());
    }

    #[test]
    fn test_zero_rate_falls_back_to_average() {
        let json = r#"{ "streams": [ {
            "codec_type": "video", "width": 64, "height": 64,
            "r_frame_rate": "0/0", "avg_frame_rate": "24/1"
        } ] }"#;
        assert_eq!(parse_probe_output(json).unwrap().fps, 24.0);
    }

    #[test]
    fn test_parse_encoder_list() {
        let text = "Encoders:\n \
            V..... = Video\n \
            A..... = Audio\n \
            ------\n \
            V....D libx264              libx264 H.264 / AVC\n \
            V....D mpeg4                MPEG-4 part 2\n \
            A....D aac                  AAC (Advanced Audio Coding)\n";
        let encoders = parse_encoder_list(text);
        assert_eq!(encoders, vec!["libx264".to_string(), "mpeg4".to_string()]);
    }
}

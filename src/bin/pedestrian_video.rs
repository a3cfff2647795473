/// 视频行人检测
/// 逐帧: 缩放 → HOG检测 → 画框 → 写入; 时间上限 / 按 q 停止
use anyhow::Result;
use clap::Parser;
use std::path::Path;

use pedestrian_rs::config::VideoArgs;
use pedestrian_rs::detection::HogPersonDetector;
use pedestrian_rs::error::{PipelineError, PipelineResult};
use pedestrian_rs::input::{resolve_input, FfmpegSource};
use pedestrian_rs::logging;
use pedestrian_rs::output::{prepare_output_dir, FfmpegSink, SinkSpec};
use pedestrian_rs::pipeline::{VideoPipeline, VideoReport};
use pedestrian_rs::viewer::{display_available, run_video_window, HeadlessViewer};

const WINDOW_TITLE: &str = "Pedestrian Detection";

fn main() {
    let args = VideoArgs::parse();
    logging::init(args.verbose);

    match run(&args) {
        Ok(report) if report.is_critical() => std::process::exit(1),
        Ok(_) => {}
        Err(e) => {
            tracing::error!("❌ {:#}", e);
            std::process::exit(1);
        }
    }
}

fn run(args: &VideoArgs) -> Result<VideoReport> {
    println!("🚶 视频行人检测");
    let paths = args.paths();
    let settings = args.settings().map_err(PipelineError::into_report)?;

    let input = resolve_input(&paths.input).map_err(PipelineError::into_report)?;
    let model = args.model_path().map_err(PipelineError::into_report)?;
    let detector = HogPersonDetector::load(model).map_err(PipelineError::into_report)?;
    let source = FfmpegSource::open(&input).map_err(PipelineError::into_report)?;

    // 输出目录在属性校验通过后才创建
    let output_dir = paths.output_dir.clone();
    let open_sink = move |path: &Path, spec: SinkSpec| -> PipelineResult<FfmpegSink> {
        prepare_output_dir(&output_dir)?;
        FfmpegSink::create(path, spec)
    };
    let mut pipeline = VideoPipeline::new(source, open_sink, &paths.output, settings, detector)
        .map_err(PipelineError::into_report)?;

    let windowed = !args.headless && display_available();
    if !args.headless && !windowed {
        let warning = PipelineError::Display("未检测到图形界面, 无界面运行".to_string());
        tracing::warn!("⚠️ {}", warning);
    }

    let report = if windowed {
        run_video_window(pipeline, WINDOW_TITLE)
    } else {
        pipeline.run(&mut HeadlessViewer::new())
    }
    .map_err(PipelineError::into_report)?;

    println!(
        "✅ {}: 写入 {} 帧 (读取 {}, 跳过 {}, 丢弃 {}), 结果已保存到 {}",
        report
            .reason
            .as_ref()
            .map(|r| r.to_string())
            .unwrap_or_default(),
        report.frames_written,
        report.frames_read,
        report.frames_skipped,
        report.frames_dropped,
        report.output.display()
    );
    Ok(report)
}

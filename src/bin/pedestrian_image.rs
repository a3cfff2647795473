/// 图片行人检测
/// 读取图片 → 缩放 → HOG检测 → 画框 → 保存 (可选窗口显示)
use anyhow::Result;
use clap::Parser;

use pedestrian_rs::config::ImageArgs;
use pedestrian_rs::detection::HogPersonDetector;
use pedestrian_rs::error::PipelineError;
use pedestrian_rs::logging;
use pedestrian_rs::pipeline::ImagePipeline;
use pedestrian_rs::viewer::{display_available, HeadlessViewer, ImageWindow, Viewer};

const WINDOW_TITLE: &str = "Pedestrian Detection";

fn main() {
    let args = ImageArgs::parse();
    logging::init(args.verbose);

    if let Err(e) = run(&args) {
        tracing::error!("❌ {:#}", e);
        std::process::exit(1);
    }
}

fn run(args: &ImageArgs) -> Result<()> {
    println!("🚶 图片行人检测");
    let paths = args.paths();
    let params = args.detect_params().map_err(PipelineError::into_report)?;
    let model = args.model_path().map_err(PipelineError::into_report)?;
    let mut detector = HogPersonDetector::load(model).map_err(PipelineError::into_report)?;
    let pipeline = ImagePipeline::new(args.max_width, params);

    let mut viewer: Box<dyn Viewer> = if args.headless {
        Box::new(HeadlessViewer::new())
    } else if display_available() {
        Box::new(ImageWindow::new(WINDOW_TITLE))
    } else {
        let warning = PipelineError::Display("未检测到图形界面, 跳过显示".to_string());
        tracing::warn!("⚠️ {}", warning);
        Box::new(HeadlessViewer::new())
    };

    let report = pipeline
        .run(&paths, &mut detector, Some(&mut viewer))
        .map_err(PipelineError::into_report)?;

    println!(
        "✅ 检测到 {} 个行人 ({}x{}), 结果已保存到 {}",
        report.detections,
        report.width,
        report.height,
        report.output.display()
    );
    Ok(())
}

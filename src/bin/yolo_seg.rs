// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! YOLO 检测 + 实例分割
//!
//! 流程: 读图 → net → nms → mask → 画布 → 叠加原图 → 保存 PNG
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context};
use clap::Parser;
use image::RgbaImage;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use yolo_seg_rs::{
    compose, gen_time_string, Args, BoxRenderer, ColorPalette, Detector, Endpoint, Labels,
    OrtBackend, OrtConfig, OrtEP,
};

const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "bmp", "webp", "tiff"];

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();
    let config = args.detect_config().context("读取配置失败")?;
    info!("🚀 启动 | {:?}", config);

    let ep = if args.trt {
        OrtEP::Trt(args.device_id)
    } else if args.cuda {
        OrtEP::CUDA(args.device_id)
    } else {
        OrtEP::CPU
    };

    // ========== 加载三个子模型 ==========
    let net = load("net", &args.net, ep)?;
    let nms = load("nms", &args.nms, ep)?;
    let mask = match &args.mask {
        Some(path) => Some(load("mask", path, ep)?),
        None => {
            info!("未提供 mask 模型, 仅检测");
            None
        }
    };

    let palette = ColorPalette::ultralytics();
    let labels = match &args.labels {
        Some(path) => Labels::from_json_file(path)
            .with_context(|| format!("读取类别文件失败: {}", path.display()))?,
        None => Labels::coco(),
    };
    if labels.is_empty() {
        bail!("类别名称为空");
    }
    if labels.len() < config.num_classes {
        warn!(
            "⚠️ 类别名称 {} 个, 少于模型类别数 {}, 缺失的以数字显示",
            labels.len(),
            config.num_classes
        );
    }
    let renderer = BoxRenderer::from_optional_font(args.font.as_deref())?;

    let (model_width, model_height) = (config.model_width(), config.model_height());
    let mut detector = Detector::new(net, nms, mask, config).with_profile(args.profile);

    let sources = collect_sources(&args.source)?;
    if sources.is_empty() {
        bail!("没有找到图片: {}", args.source.display());
    }
    std::fs::create_dir_all(&args.output)
        .with_context(|| format!("创建输出目录失败: {}", args.output.display()))?;

    for path in sources {
        let t = Instant::now();
        let image =
            image::open(&path).with_context(|| format!("读取图片失败: {}", path.display()))?;

        let mut surface = RgbaImage::new(model_width, model_height);
        let detections = detector
            .detect_and_render(&image, &mut surface, &palette, &renderer, &labels)
            .with_context(|| format!("检测失败: {}", path.display()))?;

        let result = compose(&image, &surface);
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        let save_path = args
            .output
            .join(format!("{}-{}.png", stem, gen_time_string("-")));
        result
            .save(&save_path)
            .with_context(|| format!("保存失败: {}", save_path.display()))?;

        info!(
            "📷 {} | {} 个目标 | {:?} → {}",
            path.display(),
            detections.len(),
            t.elapsed(),
            save_path.display()
        );
        for det in &detections {
            info!(
                "    {} {:.1}% {:?}",
                labels.name(det.label),
                det.probability * 100.0,
                det.bounding.to_array()
            );
        }
    }

    Ok(())
}

fn load(name: &str, f: &Path, ep: OrtEP) -> anyhow::Result<Box<dyn Endpoint>> {
    let backend = OrtBackend::build(OrtConfig {
        name: name.to_string(),
        f: f.to_path_buf(),
        ep,
    })
    .with_context(|| format!("加载 {} 模型失败: {}", name, f.display()))?;
    Ok(Box::new(backend))
}

/// 单个文件, 或目录下的图片 (按文件名排序)
fn collect_sources(source: &Path) -> anyhow::Result<Vec<PathBuf>> {
    if source.is_file() {
        return Ok(vec![source.to_path_buf()]);
    }
    let mut files: Vec<PathBuf> = std::fs::read_dir(source)
        .with_context(|| format!("读取目录失败: {}", source.display()))?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    Ok(files)
}

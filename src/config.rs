// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// 模型配置参数

use std::path::{Path, PathBuf};

use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::Result;

/// 检测流程参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectConfig {
    /// NMS 每类最多保留框数
    pub top_k: u32,
    pub iou_threshold: f32,
    /// NMS 置信度阈值
    pub conf_threshold: f32,
    /// 类别分数阈值 (max(cls) * obj >= class_threshold 才保留)
    pub class_threshold: f32,
    /// 模型输入 [N, C, H, W]
    pub input_shape: [usize; 4],
    pub stride: u32,
    pub num_classes: usize,
    /// 掩膜系数个数, 0 表示仅检测
    pub mask_coefficients: usize,
    /// 主网络输入名
    pub net_input: String,
}

impl Default for DetectConfig {
    fn default() -> Self {
        Self {
            top_k: 100,
            iou_threshold: 0.45,
            conf_threshold: 0.25,
            class_threshold: 0.2,
            input_shape: [1, 3, 640, 640],
            stride: 32,
            num_classes: 80,
            mask_coefficients: 32,
            net_input: "images".to_string(),
        }
    }
}

impl DetectConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn model_width(&self) -> u32 {
        self.input_shape[3] as u32
    }

    pub fn model_height(&self) -> u32 {
        self.input_shape[2] as u32
    }

    /// NMS 配置向量 [topK, iouThreshold, confThreshold]
    pub fn nms_config(&self) -> [f32; 3] {
        [self.top_k as f32, self.iou_threshold, self.conf_threshold]
    }

    pub fn segmentation_enabled(&self) -> bool {
        self.mask_coefficients > 0
    }
}

/// 命令行参数
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "YOLO 目标检测 + 实例分割", long_about = None)]
pub struct Args {
    /// 主网络 ONNX 模型
    #[arg(long)]
    pub net: PathBuf,

    /// NMS ONNX 模型
    #[arg(long)]
    pub nms: PathBuf,

    /// 掩膜过滤 ONNX 模型 (缺省则仅检测)
    #[arg(long)]
    pub mask: Option<PathBuf>,

    /// 输入图片或目录
    #[arg(short, long)]
    pub source: PathBuf,

    /// 输出目录
    #[arg(short, long, default_value = "runs")]
    pub output: PathBuf,

    /// JSON 配置文件 (命令行参数优先)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// 类别名称 JSON 文件 (缺省为 COCO)
    #[arg(long)]
    pub labels: Option<PathBuf>,

    /// 标签字体 (ttf/otf)
    #[arg(long)]
    pub font: Option<PathBuf>,

    #[arg(long)]
    pub topk: Option<u32>,

    #[arg(long)]
    pub iou: Option<f32>,

    #[arg(long)]
    pub conf: Option<f32>,

    #[arg(long)]
    pub class_threshold: Option<f32>,

    #[arg(long)]
    pub width: Option<u32>,

    #[arg(long)]
    pub height: Option<u32>,

    #[arg(long)]
    pub stride: Option<u32>,

    /// 类别数
    #[arg(long)]
    pub nc: Option<usize>,

    /// 掩膜系数个数
    #[arg(long)]
    pub nm: Option<usize>,

    /// 使用 CUDA
    #[arg(long)]
    pub cuda: bool,

    /// 使用 TensorRT
    #[arg(long)]
    pub trt: bool,

    #[arg(long, default_value_t = 0)]
    pub device_id: i32,

    /// 打印各阶段耗时
    #[arg(long)]
    pub profile: bool,
}

impl Args {
    /// 合并配置: 配置文件为底, 显式给出的命令行参数覆盖
    pub fn detect_config(&self) -> Result<DetectConfig> {
        let mut config = match &self.config {
            Some(path) => DetectConfig::from_json_file(path)?,
            None => DetectConfig::default(),
        };

        if let Some(v) = self.topk {
            config.top_k = v;
        }
        if let Some(v) = self.iou {
            config.iou_threshold = v;
        }
        if let Some(v) = self.conf {
            config.conf_threshold = v;
        }
        if let Some(v) = self.class_threshold {
            config.class_threshold = v;
        }
        if let Some(v) = self.width {
            config.input_shape[3] = v as usize;
        }
        if let Some(v) = self.height {
            config.input_shape[2] = v as usize;
        }
        if let Some(v) = self.stride {
            config.stride = v;
        }
        if let Some(v) = self.nc {
            config.num_classes = v;
        }
        if let Some(v) = self.nm {
            config.mask_coefficients = v;
        }
        if self.mask.is_none() {
            config.mask_coefficients = 0;
        }

        Ok(config)
    }
}

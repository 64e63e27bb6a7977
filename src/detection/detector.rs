// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// 检测器: 预处理 → net → nms → 解码 → mask → 画布

use std::time::Instant;

use image::DynamicImage;
use tracing::{debug, info};

use super::decode::{decode_rows, rows_view};
use super::mask::{mask_config, mask_query, MaskOverlay};
use super::types::{Detection, RowLayout, SelectedIndices};
use crate::config::DetectConfig;
use crate::labels::Labels;
use crate::models::{Endpoint, Tensor};
use crate::palette::ColorPalette;
use crate::preprocess::preprocess;
use crate::renderer::{BoxRenderer, Surface};
use crate::{Result, SegError};

// 端点张量名
pub const OUTPUT0: &str = "output0";
pub const OUTPUT1: &str = "output1";
pub const NMS_DETECTION: &str = "detection";
pub const NMS_CONFIG: &str = "config";
pub const SELECTED_IDX: &str = "selected_idx";
pub const MASK_DETECTION: &str = "detection";
pub const MASK_PROTO: &str = "mask";
pub const MASK_CONFIG: &str = "config";
pub const MASK_FILTER: &str = "mask_filter";

/// 掩膜上色透明度
pub const MASK_ALPHA: u8 = 120;

/// 一次检测的结果 (尚未写到画布)
#[derive(Debug, Clone)]
pub struct DetectOutput {
    pub detections: Vec<Detection>,
    pub overlay: MaskOverlay,
    pub x_ratio: f32,
    pub y_ratio: f32,
    pub max_size: u32,
}

pub struct Detector {
    net: Box<dyn Endpoint>,
    nms: Box<dyn Endpoint>,
    mask: Option<Box<dyn Endpoint>>,
    config: DetectConfig,
    profile: bool,
}

impl Detector {
    pub fn new(
        net: Box<dyn Endpoint>,
        nms: Box<dyn Endpoint>,
        mask: Option<Box<dyn Endpoint>>,
        config: DetectConfig,
    ) -> Self {
        Self {
            net,
            nms,
            mask,
            config,
            profile: false,
        }
    }

    pub fn with_profile(mut self, profile: bool) -> Self {
        self.profile = profile;
        self
    }

    pub fn config(&self) -> &DetectConfig {
        &self.config
    }

    /// 不做分割时不要求行内带掩膜系数
    pub fn layout(&self) -> RowLayout {
        let nm = if self.segmentation_enabled() {
            self.config.mask_coefficients
        } else {
            0
        };
        RowLayout::new(self.config.num_classes, nm)
    }

    /// 配置了掩膜系数且提供了 mask 端点
    pub fn segmentation_enabled(&self) -> bool {
        self.config.segmentation_enabled() && self.mask.is_some()
    }

    pub fn detect(&mut self, image: &DynamicImage, palette: &ColorPalette) -> Result<DetectOutput> {
        let (model_width, model_height) = (self.config.model_width(), self.config.model_height());
        let segmenting = self.segmentation_enabled();

        // 预处理
        let t = Instant::now();
        let pre = preprocess(image, model_width, model_height, self.config.stride)?;
        let (ratios, max_size) = (pre.ratios(), pre.max_size);
        let input = Tensor::F32(pre.tensor);
        if self.profile {
            info!("[Preprocess]: {:?}", t.elapsed());
        }

        // 主网络
        let t = Instant::now();
        let mut ys = self
            .net
            .run(&[(self.config.net_input.as_str(), &input)])?;
        let output0 = ys.take(OUTPUT0)?;
        let output1 = if segmenting {
            Some(ys.take(OUTPUT1)?)
        } else {
            None
        };
        if self.profile {
            info!("[{}]: {:?}", self.net.name(), t.elapsed());
        }

        // NMS
        let t = Instant::now();
        let nms_config = Tensor::from_slice(&self.config.nms_config());
        let mut ys = self
            .nms
            .run(&[(NMS_DETECTION, &output0), (NMS_CONFIG, &nms_config)])?;
        let selected_idx = ys.take(SELECTED_IDX)?;

        // 解码
        let rows = output0
            .as_f32()
            .ok_or_else(|| SegError::bad_shape(OUTPUT0, "expected float tensor"))?;
        let row_count = rows_view(&rows)?.nrows();
        let selected = SelectedIndices::from_tensor(&selected_idx, row_count);
        if self.profile {
            info!(
                "[{}]: {:?} | 选中 {}/{} 行",
                self.nms.name(),
                t.elapsed(),
                selected.len(),
                row_count
            );
        }
        let candidates = decode_rows(
            &rows,
            &selected,
            &self.layout(),
            ratios,
            self.config.class_threshold,
            palette,
        )?;

        // 掩膜, 每个候选依次调用一次
        let t = Instant::now();
        let max_dim = model_width.max(model_height);
        let mut overlay = MaskOverlay::new(model_width, model_height);
        let mut detections = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let det = candidate.detection;
            debug!(
                "label={} prob={:.3} box={:?} max_size={}",
                det.label,
                det.probability,
                det.bounding.to_array(),
                max_size
            );

            if let (Some(mask), Some(proto)) = (self.mask.as_mut(), output1.as_ref()) {
                let query = mask_query(candidate.model_box, &candidate.coefficients);
                let config = mask_config(max_dim, &det.bounding, det.color, MASK_ALPHA);
                let mut ys = mask.run(&[
                    (MASK_DETECTION, &query),
                    (MASK_PROTO, proto),
                    (MASK_CONFIG, &config),
                ])?;
                overlay.add(&ys.take(MASK_FILTER)?.to_u8())?;
            }
            detections.push(det);
        }
        if self.profile && segmenting {
            info!("[Mask x{}]: {:?}", detections.len(), t.elapsed());
        }

        Ok(DetectOutput {
            detections,
            overlay,
            x_ratio: ratios.0,
            y_ratio: ratios.1,
            max_size,
        })
    }

    /// 检测并绘制; 任一端点失败时画布保持原样
    pub fn detect_and_render<S: Surface>(
        &mut self,
        image: &DynamicImage,
        surface: &mut S,
        palette: &ColorPalette,
        renderer: &BoxRenderer,
        labels: &Labels,
    ) -> Result<Vec<Detection>> {
        let output = self.detect(image, palette)?;
        output.overlay.flush(surface);
        renderer.render_boxes(surface, &output.detections, labels);
        Ok(output.detections)
    }
}

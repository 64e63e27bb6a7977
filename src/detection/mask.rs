// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// 掩膜: 查询向量构造 + 叠加层

use image::{imageops, Rgba, RgbaImage};
use ndarray::{ArrayD, ArrayView3, Ix3, Ix4};

use super::types::BoundingBox;
use crate::models::Tensor;
use crate::renderer::Surface;
use crate::{Result, SegError};

/// 掩膜查询: [x, y, w, h, coef_0..nm] (模型空间, 未缩放)
pub fn mask_query(model_box: [f32; 4], coefficients: &[f32]) -> Tensor {
    let mut values = Vec::with_capacity(4 + coefficients.len());
    values.extend_from_slice(&model_box);
    values.extend_from_slice(coefficients);
    Tensor::from_slice(&values)
}

/// 掩膜配置: [max(model_w, model_h), X, Y, W, H, r, g, b, alpha]
pub fn mask_config(max_dim: u32, bounding: &BoundingBox, color: Rgba<u8>, alpha: u8) -> Tensor {
    let [r, g, b, _] = color.0;
    Tensor::from_slice(&[
        max_dim as f32,
        bounding.x as f32,
        bounding.y as f32,
        bounding.width as f32,
        bounding.height as f32,
        r as f32,
        g as f32,
        b as f32,
        alpha as f32,
    ])
}

/// 掩膜叠加层, 与模型输入同尺寸, 初始全透明
#[derive(Debug, Clone)]
pub struct MaskOverlay {
    image: RgbaImage,
}

impl MaskOverlay {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::new(width, height),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    pub fn is_blank(&self) -> bool {
        self.image.as_raw().iter().all(|&v| v == 0)
    }

    /// 逐元素饱和相加; 接受 [H, W, 4] 或 [1, H, W, 4]
    pub fn add(&mut self, mask_filter: &ArrayD<u8>) -> Result<()> {
        let view = mask_view(mask_filter)?;
        let (h, w, c) = view.dim();
        if c != 4 || w != self.width() as usize || h != self.height() as usize {
            return Err(SegError::bad_shape(
                "mask_filter",
                format!(
                    "expected [{}, {}, 4], got {:?}",
                    self.height(),
                    self.width(),
                    mask_filter.shape()
                ),
            ));
        }

        for (x, y, pixel) in self.image.enumerate_pixels_mut() {
            for (i, v) in pixel.0.iter_mut().enumerate() {
                *v = v.saturating_add(view[[y as usize, x as usize, i]]);
            }
        }
        Ok(())
    }

    /// 写到画布: 尺寸不同先缩放, 清空后整体替换
    pub fn flush<S: Surface>(&self, surface: &mut S) {
        let (w, h) = surface.dimensions();
        surface.clear_rect(0, 0, w, h);
        if self.image.dimensions() == (w, h) {
            surface.put_image_data(&self.image, 0, 0);
        } else {
            let resized = imageops::resize(&self.image, w, h, imageops::FilterType::Triangle);
            surface.put_image_data(&resized, 0, 0);
        }
    }
}

fn mask_view(mask_filter: &ArrayD<u8>) -> Result<ArrayView3<'_, u8>> {
    match mask_filter.ndim() {
        3 => Ok(mask_filter.view().into_dimensionality::<Ix3>()?),
        4 if mask_filter.shape()[0] == 1 => {
            let v = mask_filter.view().into_dimensionality::<Ix4>()?;
            Ok(v.index_axis_move(ndarray::Axis(0), 0))
        }
        _ => Err(SegError::bad_shape(
            "mask_filter",
            format!("expected [H, W, 4], got {:?}", mask_filter.shape()),
        )),
    }
}

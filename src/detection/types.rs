// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// 检测流程数据结构定义

use std::collections::HashSet;

use image::Rgba;

use crate::models::Tensor;

// ========== 行布局常量 ==========

/// [cx, cy, w, h] 偏移
pub const CXYWH_OFFSET: usize = 4;
/// objectness 所在列
pub const OBJECTNESS_INDEX: usize = 4;
/// 类别分数起始列
pub const CLASS_OFFSET: usize = 5;

// ========== 数据结构 ==========

/// output0 单行布局: [cx, cy, w, h, obj, cls_0..nc, coef_0..nm]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowLayout {
    pub num_classes: usize,
    /// 掩膜系数个数, 仅检测时为 0
    pub mask_coefficients: usize,
}

impl RowLayout {
    pub fn new(num_classes: usize, mask_coefficients: usize) -> Self {
        Self {
            num_classes,
            mask_coefficients,
        }
    }

    /// 所需最小行宽
    pub fn width(&self) -> usize {
        CLASS_OFFSET + self.num_classes + self.mask_coefficients
    }

    pub fn coefficient_offset(&self) -> usize {
        CLASS_OFFSET + self.num_classes
    }
}

/// 检测框 (左上角 + 宽高, 整数像素)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BoundingBox {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// 浮点框向下取整
    pub fn floor(xywh: [f32; 4]) -> Self {
        Self::new(
            xywh[0].floor() as i32,
            xywh[1].floor() as i32,
            xywh[2].floor() as i32,
            xywh[3].floor() as i32,
        )
    }

    pub fn to_array(&self) -> [i32; 4] {
        [self.x, self.y, self.width, self.height]
    }
}

/// 解码后的检测结果
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub label: usize,
    /// max(class_scores) * objectness
    pub probability: f32,
    pub bounding: BoundingBox,
    pub color: Rgba<u8>,
}

/// 通过阈值、尚未做掩膜的候选
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub detection: Detection,
    /// 模型空间的左上角框 [x, y, w, h] (未缩放)
    pub model_box: [f32; 4],
    pub coefficients: Vec<f32>,
}

/// NMS 选中的行号集合
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectedIndices {
    indices: HashSet<usize>,
}

impl SelectedIndices {
    /// 丢弃负数以及 >= row_count 的行号
    pub fn new<I: IntoIterator<Item = i64>>(indices: I, row_count: usize) -> Self {
        let indices = indices
            .into_iter()
            .filter(|&i| i >= 0 && (i as u64) < row_count as u64)
            .map(|i| i as usize)
            .collect();
        Self { indices }
    }

    pub fn from_tensor(tensor: &Tensor, row_count: usize) -> Self {
        Self::new(tensor.to_indices(), row_count)
    }

    pub fn contains(&self, idx: usize) -> bool {
        self.indices.contains(&idx)
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn test_row_layout() {
        assert_eq!(RowLayout::new(80, 32).width(), 117);
        assert_eq!(RowLayout::new(80, 0).width(), 85);
        assert_eq!(RowLayout::new(80, 32).coefficient_offset(), 85);
    }

    #[test]
    fn test_bounding_box_floor() {
        let b = BoundingBox::floor([-0.5, 10.9, 3.2, 7.99]);
        assert_eq!(b.to_array(), [-1, 10, 3, 7]);
    }

    #[test]
    fn test_selected_indices_bounds() {
        let selected = SelectedIndices::new(vec![2, 5, -1, 10, 5], 10);
        assert_eq!(selected.len(), 2);
        assert!(selected.contains(2));
        assert!(selected.contains(5));
        assert!(!selected.contains(9));
    }

    #[test]
    fn test_selected_indices_from_2d_tensor() {
        let t = Tensor::I64(arr2(&[[0i64], [3]]).into_dyn());
        let selected = SelectedIndices::from_tensor(&t, 4);
        assert!(selected.contains(0) && selected.contains(3));
    }
}

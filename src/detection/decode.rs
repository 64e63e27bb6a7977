// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// output0 解码: 选中行 → 阈值过滤 → 坐标还原

use ndarray::{s, ArrayView2, ArrayViewD, Axis, Ix2, Ix3};

use super::types::{
    BoundingBox, Candidate, Detection, RowLayout, SelectedIndices, CLASS_OFFSET, CXYWH_OFFSET,
    OBJECTNESS_INDEX,
};
use crate::palette::ColorPalette;
use crate::{Result, SegError};

/// 中心点格式 → 左上角格式
pub fn center_to_corner(cx: f32, cy: f32, w: f32, h: f32) -> [f32; 4] {
    [cx - 0.5 * w, cy - 0.5 * h, w, h]
}

/// 模型空间框乘以补边比例
pub fn scale_box(xywh: [f32; 4], (x_ratio, y_ratio): (f32, f32)) -> [f32; 4] {
    [
        xywh[0] * x_ratio,
        xywh[1] * y_ratio,
        xywh[2] * x_ratio,
        xywh[3] * y_ratio,
    ]
}

/// output0 视为 [N, row] 二维; 接受 [1, N, row] 或 [N, row]
pub fn rows_view<'a>(output0: &'a ArrayViewD<'_, f32>) -> Result<ArrayView2<'a, f32>> {
    match output0.ndim() {
        3 => {
            if output0.shape()[0] != 1 {
                return Err(SegError::bad_shape(
                    "output0",
                    format!("batch must be 1, got {:?}", output0.shape()),
                ));
            }
            let v = output0.view().into_dimensionality::<Ix3>()?;
            Ok(v.index_axis_move(Axis(0), 0))
        }
        2 => Ok(output0.view().into_dimensionality::<Ix2>()?),
        _ => Err(SegError::bad_shape(
            "output0",
            format!("expected [1, N, row], got {:?}", output0.shape()),
        )),
    }
}

/// 解码选中行
///
/// 只处理 `selected` 中的行; 分数 = max(cls) * obj, 小于 `class_threshold` 丢弃 (等于保留)。
pub fn decode_rows(
    output0: &ArrayViewD<f32>,
    selected: &SelectedIndices,
    layout: &RowLayout,
    ratios: (f32, f32),
    class_threshold: f32,
    palette: &ColorPalette,
) -> Result<Vec<Candidate>> {
    let rows = rows_view(output0)?;
    if layout.num_classes == 0 || rows.ncols() < layout.width() {
        return Err(SegError::bad_shape(
            "output0",
            format!(
                "row width {} < {} (nc={}, nm={})",
                rows.ncols(),
                layout.width(),
                layout.num_classes,
                layout.mask_coefficients
            ),
        ));
    }

    let coef_offset = layout.coefficient_offset();
    let mut candidates = Vec::new();
    for (idx, row) in rows.axis_iter(Axis(0)).enumerate() {
        if !selected.contains(idx) {
            continue;
        }

        let confidence = row[OBJECTNESS_INDEX];
        let scores = row.slice(s![CLASS_OFFSET..coef_offset]);
        // 取第一个最大值
        let Some((label, max_score)) = scores
            .iter()
            .copied()
            .enumerate()
            .reduce(|max, x| if x.1 > max.1 { x } else { max })
        else {
            continue;
        };
        let score = max_score * confidence;

        if score >= class_threshold {
            let bbox = row.slice(s![0..CXYWH_OFFSET]);
            let model_box = center_to_corner(bbox[0], bbox[1], bbox[2], bbox[3]);
            let bounding = BoundingBox::floor(scale_box(model_box, ratios));
            let coefficients = row
                .slice(s![coef_offset..coef_offset + layout.mask_coefficients])
                .to_vec();

            candidates.push(Candidate {
                detection: Detection {
                    label,
                    probability: score,
                    bounding,
                    color: palette.color(label),
                },
                model_box,
                coefficients,
            });
        }
    }

    Ok(candidates)
}

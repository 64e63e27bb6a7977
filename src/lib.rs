// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod config; // 检测参数与命令行
pub mod detection; // 解码 / 掩膜 / 检测器
pub mod error; // 错误类型
pub mod labels; // 类别名称
pub mod models; // 推理端点接口
pub mod ort_backend; // ONNX Runtime 端点
pub mod palette; // 类别调色板
pub mod preprocess; // 预处理
pub mod renderer; // 画布与检测框绘制

pub use crate::config::{Args, DetectConfig};
pub use crate::detection::{
    BoundingBox, DetectOutput, Detection, Detector, MaskOverlay, RowLayout, SelectedIndices,
};
pub use crate::error::{Result, SegError};
pub use crate::labels::Labels;
pub use crate::models::{Endpoint, Outputs, Tensor};
pub use crate::ort_backend::{OrtBackend, OrtConfig, OrtEP};
pub use crate::palette::ColorPalette;
pub use crate::preprocess::{div_stride, preprocess, Preprocessed};
pub use crate::renderer::{compose, BoxRenderer, Surface};

/// 本地时间字符串, 用作输出文件名
pub fn gen_time_string(delimiter: &str) -> String {
    let t_now = chrono::Local::now();
    let fmt = format!(
        "%Y{}%m{}%d{}%H{}%M{}%S{}%f",
        delimiter, delimiter, delimiter, delimiter, delimiter, delimiter
    );
    t_now.format(&fmt).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gen_time_string() {
        let s = gen_time_string("-");
        let parts: Vec<&str> = s.split('-').collect();
        assert_eq!(parts.len(), 7);
        assert_eq!(parts[0].len(), 4);
        assert!(parts.iter().all(|p| p.chars().all(|c| c.is_ascii_digit())));
    }
}

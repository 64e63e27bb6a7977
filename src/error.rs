// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// 流水线错误类型

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SegError>;

#[derive(Error, Debug)]
pub enum SegError {
    /// 推理引擎 (ONNX Runtime) 报错,原样透传
    #[error("ONNX Runtime 错误: {0}")]
    Ort(String),

    #[error("推理端点 `{endpoint}` 缺少输出 `{output}`")]
    MissingOutput { endpoint: String, output: String },

    #[error("推理端点 `{endpoint}` 的输出 `{output}` 元素类型不受支持")]
    UnsupportedTensor { endpoint: String, output: String },

    #[error("张量 `{name}` 形状不符: {detail}")]
    BadShape { name: String, detail: String },

    #[error("形状错误: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("图像错误: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON 解析错误: {0}")]
    Json(#[from] serde_json::Error),

    #[error("图像按步长对齐后为空 ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },

    #[error("字体加载失败: {0}")]
    Font(String),
}

impl SegError {
    pub fn ort(e: impl std::fmt::Display) -> Self {
        SegError::Ort(e.to_string())
    }

    pub fn bad_shape(name: &str, detail: impl Into<String>) -> Self {
        SegError::BadShape {
            name: name.to_string(),
            detail: detail.into(),
        }
    }
}

// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 推理端点统一接口
//!
//! # 架构说明
//!
//! 检测流程依赖三个预训练子模型,均抽象为 [`Endpoint`]:
//! - **net**:  主网络,输出 `output0` (逐框行) 与 `output1` (掩膜原型)
//! - **nms**:  非极大值抑制,输出 `selected_idx`
//! - **mask**: 掩膜过滤,输出 `mask_filter` ([H, W, 4] RGBA)
//!
//! ## 核心流程
//! ```text
//! 预处理张量 → net.run → output0 ─┬→ nms.run → selected_idx
//!                      output1 ─┴→ mask.run (每个保留的检测一次) → mask_filter
//! ```
//!
//! 真实实现见 `ort_backend.rs` (ONNX Runtime),测试中用内存桩替代。
use std::collections::HashMap;

use ndarray::{Array1, ArrayD, ArrayViewD};

use crate::{Result, SegError};

/// 端点输入/输出张量
#[derive(Debug, Clone, PartialEq)]
pub enum Tensor {
    F32(ArrayD<f32>),
    I64(ArrayD<i64>),
    I32(ArrayD<i32>),
    U8(ArrayD<u8>),
}

impl Tensor {
    pub fn shape(&self) -> &[usize] {
        match self {
            Tensor::F32(a) => a.shape(),
            Tensor::I64(a) => a.shape(),
            Tensor::I32(a) => a.shape(),
            Tensor::U8(a) => a.shape(),
        }
    }

    /// 一维 f32 张量
    pub fn from_slice(values: &[f32]) -> Self {
        Tensor::F32(Array1::from(values.to_vec()).into_dyn())
    }

    pub fn as_f32(&self) -> Option<ArrayViewD<'_, f32>> {
        match self {
            Tensor::F32(a) => Some(a.view()),
            _ => None,
        }
    }

    /// 展平为整数 (NMS 的 selected_idx 可能是 int32/int64/float)
    pub fn to_indices(&self) -> Vec<i64> {
        match self {
            Tensor::F32(a) => a.iter().map(|&v| v as i64).collect(),
            Tensor::I64(a) => a.iter().copied().collect(),
            Tensor::I32(a) => a.iter().map(|&v| v as i64).collect(),
            Tensor::U8(a) => a.iter().map(|&v| v as i64).collect(),
        }
    }

    /// 转为 u8 像素 (浮点按 [0,255] 截断)
    pub fn to_u8(&self) -> ArrayD<u8> {
        match self {
            Tensor::U8(a) => a.clone(),
            Tensor::F32(a) => a.mapv(|v| v.round().clamp(0.0, 255.0) as u8),
            Tensor::I64(a) => a.mapv(|v| v.clamp(0, 255) as u8),
            Tensor::I32(a) => a.mapv(|v| v.clamp(0, 255) as u8),
        }
    }
}

impl From<ArrayD<f32>> for Tensor {
    fn from(a: ArrayD<f32>) -> Self {
        Tensor::F32(a)
    }
}

impl From<ArrayD<i64>> for Tensor {
    fn from(a: ArrayD<i64>) -> Self {
        Tensor::I64(a)
    }
}

impl From<ArrayD<i32>> for Tensor {
    fn from(a: ArrayD<i32>) -> Self {
        Tensor::I32(a)
    }
}

impl From<ArrayD<u8>> for Tensor {
    fn from(a: ArrayD<u8>) -> Self {
        Tensor::U8(a)
    }
}

/// 端点输出 (按名称)
#[derive(Debug, Default, Clone)]
pub struct Outputs {
    endpoint: String,
    tensors: HashMap<String, Tensor>,
}

impl Outputs {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            tensors: HashMap::new(),
        }
    }

    pub fn with(mut self, name: &str, tensor: impl Into<Tensor>) -> Self {
        self.insert(name, tensor);
        self
    }

    pub fn insert(&mut self, name: &str, tensor: impl Into<Tensor>) {
        self.tensors.insert(name.to_string(), tensor.into());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tensors.contains_key(name)
    }

    /// 取出指定输出,缺失时报 `MissingOutput`
    pub fn take(&mut self, name: &str) -> Result<Tensor> {
        self.tensors
            .remove(name)
            .ok_or_else(|| SegError::MissingOutput {
                endpoint: self.endpoint.clone(),
                output: name.to_string(),
            })
    }
}

/// 推理端点
///
/// 一次调用即一次前向推理;失败直接向上传递,不重试。
pub trait Endpoint {
    /// 端点名称 (日志/错误信息用)
    fn name(&self) -> &str;

    /// 以命名输入执行推理
    fn run(&mut self, inputs: &[(&str, &Tensor)]) -> Result<Outputs>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr1;

    #[test]
    fn test_to_indices() {
        let t = Tensor::I32(arr1(&[2, 5]).into_dyn());
        assert_eq!(t.to_indices(), vec![2, 5]);
        let t = Tensor::F32(arr1(&[1.0, 3.0]).into_dyn());
        assert_eq!(t.to_indices(), vec![1, 3]);
    }

    #[test]
    fn test_to_u8_clamps() {
        let t = Tensor::F32(arr1(&[-3.0, 120.4, 300.0]).into_dyn());
        assert_eq!(t.to_u8().into_raw_vec_and_offset().0, vec![0, 120, 255]);
    }

    #[test]
    fn test_outputs_take() {
        let mut outputs = Outputs::new("nms").with("selected_idx", arr1(&[0i64]).into_dyn());
        assert!(outputs.contains("selected_idx"));
        assert!(outputs.take("selected_idx").is_ok());
        match outputs.take("selected_idx") {
            Err(SegError::MissingOutput { endpoint, output }) => {
                assert_eq!(endpoint, "nms");
                assert_eq!(output, "selected_idx");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_from_slice() {
        let t = Tensor::from_slice(&[100.0, 0.45, 0.25]);
        assert_eq!(t.shape(), &[3]);
        assert_eq!(t.as_f32().unwrap()[[1]], 0.45);
    }
}

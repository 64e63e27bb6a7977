// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// ONNX Runtime 推理后端: 每个子模型 (net / nms / mask) 一个会话

use std::path::PathBuf;

use ndarray::ArrayD;
use ort::execution_providers::{
    CPUExecutionProvider, CUDAExecutionProvider, ExecutionProviderDispatch,
    TensorRTExecutionProvider,
};
use ort::session::{builder::GraphOptimizationLevel, Session, SessionInputValue};
use ort::value::{DynValue, Tensor as OrtTensor};
use tracing::{debug, info};

use crate::models::{Endpoint, Outputs, Tensor};
use crate::{Result, SegError};

/// 执行设备
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrtEP {
    CPU,
    CUDA(i32),
    Trt(i32),
}

impl OrtEP {
    /// 依次尝试, 失败时由 ORT 回退到后面的设备
    fn providers(&self) -> Vec<ExecutionProviderDispatch> {
        match *self {
            OrtEP::CPU => vec![CPUExecutionProvider::default().build()],
            OrtEP::CUDA(device_id) => vec![
                CUDAExecutionProvider::default()
                    .with_device_id(device_id)
                    .build(),
                CPUExecutionProvider::default().build(),
            ],
            OrtEP::Trt(device_id) => vec![
                TensorRTExecutionProvider::default()
                    .with_device_id(device_id)
                    .build(),
                CUDAExecutionProvider::default()
                    .with_device_id(device_id)
                    .build(),
                CPUExecutionProvider::default().build(),
            ],
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrtConfig {
    /// 端点名称 (net / nms / mask)
    pub name: String,
    /// 模型文件
    pub f: PathBuf,
    pub ep: OrtEP,
}

pub struct OrtBackend {
    session: Session,
    name: String,
    ep: OrtEP,
    inputs: Vec<String>,
    outputs: Vec<String>,
}

impl OrtBackend {
    pub fn build(config: OrtConfig) -> Result<Self> {
        let session = Session::builder()
            .map_err(SegError::ort)?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(SegError::ort)?
            .with_execution_providers(config.ep.providers())
            .map_err(SegError::ort)?
            .commit_from_file(&config.f)
            .map_err(SegError::ort)?;

        let inputs = session.inputs.iter().map(|x| x.name.clone()).collect();
        let outputs = session.outputs.iter().map(|x| x.name.clone()).collect();

        let backend = Self {
            session,
            name: config.name,
            ep: config.ep,
            inputs,
            outputs,
        };
        backend.summary(&config.f);
        Ok(backend)
    }

    fn summary(&self, f: &std::path::Path) {
        info!(
            "✅ 模型加载成功 [{}] {} | EP: {:?}{} | inputs: {:?} | outputs: {:?}",
            self.name,
            f.display(),
            self.ep,
            if let OrtEP::CPU = self.ep {
                ""
            } else {
                " (May still fall back to CPU)"
            },
            self.inputs,
            self.outputs,
        );
    }
}

impl Endpoint for OrtBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&mut self, inputs: &[(&str, &Tensor)]) -> Result<Outputs> {
        let mut xs: Vec<(String, SessionInputValue<'static>)> = Vec::with_capacity(inputs.len());
        for (name, tensor) in inputs {
            xs.push((name.to_string(), to_value(tensor)?.into()));
        }

        let ys = self.session.run(xs).map_err(SegError::ort)?;

        let mut outputs = Outputs::new(&self.name);
        for name in &self.outputs {
            let value = ys.get(name.as_str()).ok_or_else(|| SegError::MissingOutput {
                endpoint: self.name.clone(),
                output: name.clone(),
            })?;
            let tensor = from_value(value).ok_or_else(|| SegError::UnsupportedTensor {
                endpoint: self.name.clone(),
                output: name.clone(),
            })?;
            debug!("[{}] {} -> {:?}", self.name, name, tensor.shape());
            outputs.insert(name, tensor);
        }

        Ok(outputs)
    }
}

fn to_value(tensor: &Tensor) -> Result<DynValue> {
    let value = match tensor {
        Tensor::F32(a) => OrtTensor::from_array(a.clone())
            .map_err(SegError::ort)?
            .into_dyn(),
        Tensor::I64(a) => OrtTensor::from_array(a.clone())
            .map_err(SegError::ort)?
            .into_dyn(),
        Tensor::I32(a) => OrtTensor::from_array(a.clone())
            .map_err(SegError::ort)?
            .into_dyn(),
        Tensor::U8(a) => OrtTensor::from_array(a.clone())
            .map_err(SegError::ort)?
            .into_dyn(),
    };
    Ok(value)
}

/// 按 f32 → f16 → i64 → i32 → u8 依次尝试取出
fn from_value(value: &DynValue) -> Option<Tensor> {
    if let Ok(a) = value.try_extract_array::<f32>() {
        return Some(Tensor::F32(a.to_owned()));
    }
    if let Ok(a) = value.try_extract_array::<half::f16>() {
        let a: ArrayD<f32> = a.mapv(|x| x.to_f32());
        return Some(Tensor::F32(a));
    }
    if let Ok(a) = value.try_extract_array::<i64>() {
        return Some(Tensor::I64(a.to_owned()));
    }
    if let Ok(a) = value.try_extract_array::<i32>() {
        return Some(Tensor::I32(a.to_owned()));
    }
    if let Ok(a) = value.try_extract_array::<u8>() {
        return Some(Tensor::U8(a.to_owned()));
    }
    None
}

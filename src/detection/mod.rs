// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 检测与分割后处理
//!
//! - types:    行布局、检测框、NMS 选中集合
//! - decode:   output0 解码 (阈值 + 坐标还原)
//! - mask:     掩膜查询构造与叠加层
//! - detector: 串联 net / nms / mask 三个端点
pub mod decode;
pub mod detector;
pub mod mask;
pub mod types;

pub use decode::{center_to_corner, decode_rows, scale_box};
pub use detector::{DetectOutput, Detector, MASK_ALPHA};
pub use mask::{mask_config, mask_query, MaskOverlay};
pub use types::{BoundingBox, Candidate, Detection, RowLayout, SelectedIndices};

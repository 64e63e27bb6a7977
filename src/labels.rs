// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// 类别名称

use std::borrow::Cow;
use std::path::Path;

use crate::Result;

/// COCO 数据集类别名称
pub const COCO_CLASSES: [&str; 80] = [
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat", "dog",
    "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack", "umbrella",
    "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball", "kite",
    "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket", "bottle",
    "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich", "orange",
    "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch", "potted plant",
    "bed", "dining table", "toilet", "tv", "laptop", "mouse", "remote", "keyboard", "cell phone",
    "microwave", "oven", "toaster", "sink", "refrigerator", "book", "clock", "vase", "scissors",
    "teddy bear", "hair drier", "toothbrush",
];

#[derive(Debug, Clone, PartialEq)]
pub struct Labels {
    names: Vec<String>,
}

impl Default for Labels {
    fn default() -> Self {
        Self::coco()
    }
}

impl Labels {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    pub fn coco() -> Self {
        Self::new(COCO_CLASSES.iter().map(|s| s.to_string()).collect())
    }

    /// 从 JSON 数组文件加载, 如 `["person", "bicycle", ...]`
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let names: Vec<String> = serde_json::from_str(&text)?;
        Ok(Self::new(names))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// 类别名称,缺失时退化为数字 id
    pub fn name(&self, label: usize) -> Cow<'_, str> {
        match self.names.get(label) {
            Some(name) => Cow::Borrowed(name.as_str()),
            None => Cow::Owned(label.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_coco_names() {
        let labels = Labels::coco();
        assert_eq!(labels.len(), 80);
        assert_eq!(labels.name(0), "person");
        assert_eq!(labels.name(79), "toothbrush");
        assert_eq!(labels.name(80), "80");
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"["cat", "dog"]"#).unwrap();
        let labels = Labels::from_json_file(file.path()).unwrap();
        assert_eq!(labels.len(), 2);
        assert_eq!(labels.name(1), "dog");
    }

    #[test]
    fn test_from_json_file_rejects_object() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"0": "cat"}}"#).unwrap();
        assert!(Labels::from_json_file(file.path()).is_err());
    }
}

// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// 类别调色板: 启动时构造一次,之后只读

use image::Rgba;

/// Ultralytics 默认调色板
pub const ULTRALYTICS_HEX: [&str; 20] = [
    "FF3838", "FF9D97", "FF701F", "FFB21D", "CFD231", "48F90A", "92CC17", "3DDB86", "1A9334",
    "00D4BB", "2C99A8", "00C2FF", "344593", "6473FF", "0018EC", "8438FF", "520085", "CB38FF",
    "FF95C8", "FF37C7",
];

/// 类别 id → 颜色 的只读查找表
///
/// 由调用方构造并以引用传入检测流程,不存在全局状态。
#[derive(Debug, Clone, PartialEq)]
pub struct ColorPalette {
    colors: Vec<(u8, u8, u8)>,
}

impl Default for ColorPalette {
    fn default() -> Self {
        Self::ultralytics()
    }
}

impl ColorPalette {
    pub fn new(colors: Vec<(u8, u8, u8)>) -> Self {
        // 空调色板退化为白色
        let colors = if colors.is_empty() {
            vec![(255, 255, 255)]
        } else {
            colors
        };
        Self { colors }
    }

    pub fn ultralytics() -> Self {
        Self::new(ULTRALYTICS_HEX.iter().filter_map(|h| parse_hex(h)).collect())
    }

    /// 从十六进制字符串构造 (如 "FF3838" 或 "#FF3838"),非法项被忽略
    pub fn from_hex(hex: &[&str]) -> Self {
        Self::new(hex.iter().filter_map(|h| parse_hex(h)).collect())
    }

    /// 类别颜色 (不透明)
    pub fn color(&self, label: usize) -> Rgba<u8> {
        self.rgba_with_alpha(label, 255)
    }

    pub fn rgba_with_alpha(&self, label: usize, alpha: u8) -> Rgba<u8> {
        let (r, g, b) = self.colors[label % self.colors.len()];
        Rgba([r, g, b, alpha])
    }
}

fn parse_hex(hex: &str) -> Option<(u8, u8, u8)> {
    let hex = hex.trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some((r, g, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ultralytics_palette() {
        let palette = ColorPalette::ultralytics();
        assert_eq!(palette.colors.len(), 20);
        assert_eq!(palette.color(0), Rgba([0xFF, 0x38, 0x38, 255]));
        assert_eq!(palette.color(11), Rgba([0x00, 0xC2, 0xFF, 255]));
    }

    #[test]
    fn test_palette_wraps_and_is_stable() {
        let palette = ColorPalette::ultralytics();
        assert_eq!(palette.color(3), palette.color(23));
        assert_eq!(palette.color(79), palette.color(79 % 20));
        let again = ColorPalette::ultralytics();
        for label in 0..80 {
            assert_eq!(palette.color(label), again.color(label));
        }
    }

    #[test]
    fn test_from_hex_skips_invalid() {
        let palette = ColorPalette::from_hex(&["#00FF00", "zzzzzz", "123"]);
        assert_eq!(palette.colors.len(), 1);
        assert_eq!(palette.rgba_with_alpha(5, 120), Rgba([0, 255, 0, 120]));
    }

    #[test]
    fn test_empty_palette_falls_back() {
        let palette = ColorPalette::new(vec![]);
        assert_eq!(palette.color(7), Rgba([255, 255, 255, 255]));
    }
}

// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// 预处理: 原图 → 步长对齐 → 补边成正方形 → 缩放到模型输入 → NCHW 张量

use image::{imageops, DynamicImage, RgbImage};
use ndarray::{Array, IxDyn};

use crate::{Result, SegError};

/// 预处理结果
#[derive(Debug, Clone)]
pub struct Preprocessed {
    /// [1, 3, H, W], RGB, 取值 [0, 1]
    pub tensor: Array<f32, IxDyn>,
    /// 模型空间坐标 → 显示坐标 的缩放比例 (>= 1)
    pub x_ratio: f32,
    pub y_ratio: f32,
    /// 补边后正方形的边长
    pub max_size: u32,
    pub aligned_width: u32,
    pub aligned_height: u32,
}

impl Preprocessed {
    pub fn ratios(&self) -> (f32, f32) {
        (self.x_ratio, self.y_ratio)
    }
}

/// 将宽高四舍五入到 `stride` 的整数倍 (余数 >= stride/2 进位, 否则舍去)
pub fn div_stride(stride: u32, width: u32, height: u32) -> (u32, u32) {
    (align(stride, width), align(stride, height))
}

fn align(stride: u32, v: u32) -> u32 {
    if stride == 0 {
        return v;
    }
    let rem = v % stride;
    if rem == 0 {
        v
    } else if rem >= stride - rem {
        // 进位溢出 u32 时舍去
        (v / stride + 1).checked_mul(stride).unwrap_or(v - rem)
    } else {
        v - rem
    }
}

/// 右侧/下方补黑边成 max(w, h) 的正方形, 返回 (正方形, x_ratio, y_ratio)
pub fn pad_to_square(img: &RgbImage) -> (RgbImage, f32, f32) {
    let (w, h) = img.dimensions();
    let max_size = w.max(h);
    let mut padded = RgbImage::new(max_size, max_size);
    imageops::replace(&mut padded, img, 0, 0);
    (
        padded,
        max_size as f32 / w as f32,
        max_size as f32 / h as f32,
    )
}

pub fn preprocess(
    image: &DynamicImage,
    model_width: u32,
    model_height: u32,
    stride: u32,
) -> Result<Preprocessed> {
    if model_width == 0 || model_height == 0 {
        return Err(SegError::bad_shape(
            "input_shape",
            format!("model input {}x{} is empty", model_width, model_height),
        ));
    }

    // 1. RGBA → 3通道 (网络按 RGB 训练)
    let rgb = image.to_rgb8();

    // 2. 步长对齐
    let (w, h) = div_stride(stride, rgb.width(), rgb.height());
    if w == 0 || h == 0 {
        return Err(SegError::EmptyImage {
            width: w,
            height: h,
        });
    }

    // 3. 缩放到对齐尺寸
    let resized = if rgb.dimensions() == (w, h) {
        rgb
    } else {
        imageops::resize(&rgb, w, h, imageops::FilterType::Triangle)
    };

    // 4. 补边成正方形
    let (padded, x_ratio, y_ratio) = pad_to_square(&resized);
    let max_size = padded.width();

    // 5. 缩放到模型输入尺寸并归一化
    let input = imageops::resize(
        &padded,
        model_width,
        model_height,
        imageops::FilterType::Triangle,
    );
    let mut tensor: Array<f32, IxDyn> =
        Array::zeros((1, 3, model_height as usize, model_width as usize)).into_dyn();
    for (x, y, rgb) in input.enumerate_pixels() {
        let x = x as usize;
        let y = y as usize;
        let [r, g, b] = rgb.0;
        tensor[[0, 0, y, x]] = (r as f32) / 255.0;
        tensor[[0, 1, y, x]] = (g as f32) / 255.0;
        tensor[[0, 2, y, x]] = (b as f32) / 255.0;
    }

    Ok(Preprocessed {
        tensor,
        x_ratio,
        y_ratio,
        max_size,
        aligned_width: w,
        aligned_height: h,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, Rgba, RgbaImage};

    fn solid(width: u32, height: u32, color: [u8; 4]) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba(color)))
    }

    #[test]
    fn test_div_stride_aligned_is_noop() {
        for (w, h) in [(640, 480), (32, 32), (1280, 736)] {
            assert_eq!(div_stride(32, w, h), (w, h));
        }
    }

    #[test]
    fn test_div_stride_rounding() {
        assert_eq!(div_stride(32, 800, 600), (800, 608));
        assert_eq!(div_stride(32, 810, 590), (800, 576));
        // 恰好一半时进位
        assert_eq!(div_stride(32, 48, 16), (64, 32));
        assert_eq!(div_stride(32, 47, 15), (32, 0));
    }

    #[test]
    fn test_div_stride_huge_stride() {
        // 2 * rem 超出 u32
        assert_eq!(div_stride(4_000_000_000, 3_000_000_000, 10), (4_000_000_000, 0));
        // 进位结果超出 u32
        assert_eq!(
            div_stride(2_500_000_000, 4_000_000_000, u32::MAX),
            (2_500_000_000, 2_500_000_000)
        );
        assert_eq!(div_stride(0, 17, 5), (17, 5));
    }

    #[test]
    fn test_pad_to_square_side_is_max() {
        for (w, h) in [(800, 608), (320, 640), (64, 64), (1, 5)] {
            let (padded, xr, yr) = pad_to_square(&RgbImage::new(w, h));
            assert_eq!(padded.dimensions(), (w.max(h), w.max(h)));
            assert!(xr >= 1.0 && yr >= 1.0);
        }
    }

    #[test]
    fn test_preprocess_800x600() {
        let img = solid(800, 600, [255, 255, 255, 255]);
        let pre = preprocess(&img, 640, 640, 32).unwrap();

        assert_eq!((pre.aligned_width, pre.aligned_height), (800, 608));
        assert_eq!(pre.max_size, 800);
        assert_eq!(pre.x_ratio, 1.0);
        assert!((pre.y_ratio - 800.0 / 608.0).abs() < 1e-6);
        assert!((pre.y_ratio - 1.3158).abs() < 1e-4);
        assert_eq!(pre.tensor.shape(), &[1, 3, 640, 640]);

        // 图像区域为白, 底部补边区域为黑
        assert!(pre.tensor[[0, 0, 10, 320]] > 0.99);
        assert_eq!(pre.tensor[[0, 2, 630, 320]], 0.0);
    }

    #[test]
    fn test_preprocess_square_has_unit_ratios() {
        let img = solid(640, 640, [0, 0, 0, 255]);
        let pre = preprocess(&img, 640, 640, 32).unwrap();
        assert_eq!(pre.ratios(), (1.0, 1.0));
        assert_eq!(pre.max_size, 640);
    }

    #[test]
    fn test_preprocess_channel_order_is_rgb() {
        let img = solid(64, 64, [255, 0, 0, 255]);
        let pre = preprocess(&img, 32, 32, 32).unwrap();
        assert!(pre.tensor[[0, 0, 16, 16]] > 0.99);
        assert_eq!(pre.tensor[[0, 1, 16, 16]], 0.0);
        assert_eq!(pre.tensor[[0, 2, 16, 16]], 0.0);
    }

    #[test]
    fn test_preprocess_values_normalized() {
        let mut img = RgbImage::new(64, 32);
        img.put_pixel(3, 3, Rgb([128, 64, 255]));
        let pre = preprocess(&DynamicImage::ImageRgb8(img), 64, 64, 32).unwrap();
        assert!(pre.tensor.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn test_preprocess_empty_after_alignment() {
        let img = solid(10, 10, [1, 2, 3, 255]);
        match preprocess(&img, 640, 640, 32) {
            Err(SegError::EmptyImage { width, height }) => assert_eq!((width, height), (0, 0)),
            other => panic!("unexpected: {:?}", other.map(|p| p.max_size)),
        }
    }
}

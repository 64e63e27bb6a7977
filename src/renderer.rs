// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// 绘制: 掩膜画布 + 检测框 + 标签

use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use image::{imageops, DynamicImage, Pixel, Rgba, RgbaImage};
use imageproc::drawing::{
    draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size, Canvas,
};
use imageproc::rect::Rect;
use tracing::{info, warn};

use crate::detection::{BoundingBox, Detection};
use crate::labels::Labels;
use crate::{Result, SegError};

/// 框内填充透明度 (0.2)
const FILL_ALPHA: u8 = 51;
const TEXT_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// RGBA 绘制目标
///
/// `clear_rect` 置为全透明, `put_image_data` 直接替换像素 (不混合)。
pub trait Surface: Canvas<Pixel = Rgba<u8>> {
    fn clear_rect(&mut self, x: i32, y: i32, width: u32, height: u32) {
        let (w, h) = self.dimensions();
        let x0 = x.max(0) as u32;
        let y0 = y.max(0) as u32;
        let x1 = ((x as i64 + width as i64).clamp(0, w as i64)) as u32;
        let y1 = ((y as i64 + height as i64).clamp(0, h as i64)) as u32;
        for py in y0..y1 {
            for px in x0..x1 {
                self.draw_pixel(px, py, Rgba([0, 0, 0, 0]));
            }
        }
    }

    fn put_image_data(&mut self, data: &RgbaImage, dx: i32, dy: i32) {
        let (w, h) = self.dimensions();
        for (sx, sy, pixel) in data.enumerate_pixels() {
            let x = dx as i64 + sx as i64;
            let y = dy as i64 + sy as i64;
            if x < 0 || y < 0 || x >= w as i64 || y >= h as i64 {
                continue;
            }
            self.draw_pixel(x as u32, y as u32, *pixel);
        }
    }
}

impl Surface for RgbaImage {}

/// 检测框绘制器
pub struct BoxRenderer {
    font: Option<FontVec>,
    font_size: f32,
}

impl Default for BoxRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl BoxRenderer {
    /// 不带字体, 只画框
    pub fn new() -> Self {
        Self {
            font: None,
            font_size: 16.0,
        }
    }

    pub fn with_font(mut self, font: FontVec) -> Self {
        self.font = Some(font);
        self
    }

    pub fn with_font_size(mut self, font_size: f32) -> Self {
        self.font_size = font_size;
        self
    }

    pub fn from_font_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        let font = FontVec::try_from_vec(data)
            .map_err(|e| SegError::Font(format!("{}: {}", path.as_ref().display(), e)))?;
        info!("字体已加载: {}", path.as_ref().display());
        Ok(Self::new().with_font(font))
    }

    /// 未给字体时只警告一次, 之后不画标签
    pub fn from_optional_font(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_font_file(p),
            None => {
                warn!("⚠️ 未指定字体, 只绘制检测框, 不绘制标签");
                Ok(Self::new())
            }
        }
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// 线宽: max(min(w, h) / 200, 2.5) 四舍五入
    pub fn line_width(canvas_width: u32, canvas_height: u32) -> u32 {
        let base = canvas_width.min(canvas_height) as f32 / 200.0;
        base.max(2.5).round() as u32
    }

    pub fn render_boxes<S: Surface>(
        &self,
        surface: &mut S,
        detections: &[Detection],
        labels: &Labels,
    ) {
        let (cw, ch) = surface.dimensions();
        let thickness = Self::line_width(cw, ch);

        for det in detections {
            let Some(b) = clip_box(&det.bounding, cw, ch, thickness as i64) else {
                continue;
            };

            let mut fill = det.color;
            fill.0[3] = FILL_ALPHA;
            fill_blend(surface, b.x, b.y, b.width as u32, b.height as u32, fill);
            stroke_rect(surface, b.x, b.y, b.width, b.height, thickness, det.color);

            if let Some(font) = &self.font {
                let text = format!(
                    "{} - {:.1}%",
                    labels.name(det.label),
                    det.probability * 100.0
                );
                let scale = PxScale::from(self.font_size);
                let (tw, th) = text_size(scale, font, &text);
                let pad = thickness as i32;
                // 标签放在框上方, 放不下时放进框内
                let ty = if b.y - th as i32 - 2 * pad >= 0 {
                    b.y - th as i32 - 2 * pad
                } else {
                    b.y
                };
                let tx = b.x - pad / 2;
                let bg = Rect::at(tx, ty).of_size(tw + 2 * pad as u32, th + 2 * pad as u32);
                draw_filled_rect_mut(surface, bg, det.color);
                draw_text_mut(surface, TEXT_COLOR, tx + pad, ty + pad, scale, font, &text);
            }
        }
    }
}

/// 裁剪到画布 (四周留 `margin`), 空框或完全在画布外时返回 None
fn clip_box(b: &BoundingBox, cw: u32, ch: u32, margin: i64) -> Option<BoundingBox> {
    if b.width <= 0 || b.height <= 0 {
        return None;
    }
    let x0 = (b.x as i64).max(-margin);
    let y0 = (b.y as i64).max(-margin);
    let x1 = (b.x as i64 + b.width as i64).min(cw as i64 + margin);
    let y1 = (b.y as i64 + b.height as i64).min(ch as i64 + margin);
    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    Some(BoundingBox::new(
        x0 as i32,
        y0 as i32,
        (x1 - x0) as i32,
        (y1 - y0) as i32,
    ))
}

/// 半透明填充 (与底色混合)
fn fill_blend<S: Surface>(surface: &mut S, x: i32, y: i32, w: u32, h: u32, color: Rgba<u8>) {
    let (cw, ch) = surface.dimensions();
    let x0 = x.max(0) as u32;
    let y0 = y.max(0) as u32;
    let x1 = ((x as i64 + w as i64).clamp(0, cw as i64)) as u32;
    let y1 = ((y as i64 + h as i64).clamp(0, ch as i64)) as u32;
    for py in y0..y1 {
        for px in x0..x1 {
            let mut p = surface.get_pixel(px, py);
            p.blend(&color);
            surface.draw_pixel(px, py, p);
        }
    }
}

/// 以框线为中心画 `thickness` 像素宽的边框
fn stroke_rect<S: Surface>(
    surface: &mut S,
    x: i32,
    y: i32,
    w: i32,
    h: i32,
    thickness: u32,
    color: Rgba<u8>,
) {
    let half = thickness as i32 / 2;
    for i in 0..thickness as i32 {
        let off = i - half;
        let rw = w - 2 * off;
        let rh = h - 2 * off;
        if rw <= 0 || rh <= 0 {
            break;
        }
        draw_hollow_rect_mut(
            surface,
            Rect::at(x + off, y + off).of_size(rw as u32, rh as u32),
            color,
        );
    }
}

/// 原图拉伸到画布大小, 再把画布叠在上面
pub fn compose(background: &DynamicImage, overlay: &RgbaImage) -> RgbaImage {
    let (w, h) = overlay.dimensions();
    let mut base = imageops::resize(
        &background.to_rgba8(),
        w,
        h,
        imageops::FilterType::Triangle,
    );
    imageops::overlay(&mut base, overlay, 0, 0);
    base
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::BoundingBox;

    fn detection(x: i32, y: i32, w: i32, h: i32) -> Detection {
        Detection {
            label: 0,
            probability: 0.9,
            bounding: BoundingBox::new(x, y, w, h),
            color: Rgba([255, 56, 56, 255]),
        }
    }

    #[test]
    fn test_clear_rect_is_transparent() {
        let mut img = RgbaImage::from_pixel(8, 8, Rgba([9, 9, 9, 255]));
        img.clear_rect(2, 2, 3, 3);
        assert_eq!(img.get_pixel(2, 2), &Rgba([0, 0, 0, 0]));
        assert_eq!(img.get_pixel(4, 4), &Rgba([0, 0, 0, 0]));
        assert_eq!(img.get_pixel(5, 5), &Rgba([9, 9, 9, 255]));

        // 越界部分忽略
        img.clear_rect(-4, -4, 100, 100);
        assert!(img.pixels().all(|p| p.0 == [0, 0, 0, 0]));
    }

    #[test]
    fn test_put_image_data_replaces() {
        let mut img = RgbaImage::from_pixel(4, 4, Rgba([255, 255, 255, 255]));
        let data = RgbaImage::from_pixel(2, 2, Rgba([10, 20, 30, 40]));
        img.put_image_data(&data, 3, 3);
        assert_eq!(img.get_pixel(3, 3), &Rgba([10, 20, 30, 40]));
        assert_eq!(img.get_pixel(2, 2), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_line_width() {
        assert_eq!(BoxRenderer::line_width(640, 640), 3);
        assert_eq!(BoxRenderer::line_width(100, 300), 3);
        assert_eq!(BoxRenderer::line_width(1920, 1080), 5);
    }

    #[test]
    fn test_render_boxes_without_font() {
        let mut img = RgbaImage::new(64, 64);
        let renderer = BoxRenderer::new();
        assert!(!renderer.has_font());
        renderer.render_boxes(&mut img, &[detection(10, 10, 20, 20)], &Labels::coco());

        // 边框
        assert_eq!(img.get_pixel(10, 20), &Rgba([255, 56, 56, 255]));
        // 框内半透明
        let inside = img.get_pixel(20, 20);
        assert!(inside.0[3] > 0 && inside.0[3] < 255);
        // 框外不动
        assert_eq!(img.get_pixel(50, 50), &Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn test_render_boxes_skips_empty() {
        let mut img = RgbaImage::new(16, 16);
        BoxRenderer::new().render_boxes(
            &mut img,
            &[detection(2, 2, 0, 5), detection(2, 2, 4, -1)],
            &Labels::coco(),
        );
        assert!(img.pixels().all(|p| p.0 == [0, 0, 0, 0]));
    }

    #[test]
    fn test_render_boxes_extreme_coordinates() {
        let mut img = RgbaImage::new(16, 16);
        let far = [f32::INFINITY, f32::NEG_INFINITY, f32::INFINITY, f32::INFINITY];
        BoxRenderer::new().render_boxes(
            &mut img,
            &[
                Detection {
                    bounding: BoundingBox::floor(far),
                    ..detection(0, 0, 1, 1)
                },
                detection(i32::MIN, i32::MIN, i32::MAX, i32::MAX),
                detection(i32::MAX - 1, 0, i32::MAX, 10),
            ],
            &Labels::coco(),
        );
        assert!(img.pixels().all(|p| p.0 == [0, 0, 0, 0]));

        // 覆盖整幅画布的框被裁剪后照常绘制
        BoxRenderer::new().render_boxes(
            &mut img,
            &[detection(-10, -10, i32::MAX, i32::MAX)],
            &Labels::coco(),
        );
        assert!(img.pixels().all(|p| p.0[3] > 0));
    }

    #[test]
    fn test_compose_stretches_background() {
        let bg =
            DynamicImage::ImageRgba8(RgbaImage::from_pixel(20, 10, Rgba([0, 0, 255, 255])));
        let mut overlay = RgbaImage::new(8, 8);
        overlay.put_pixel(1, 1, Rgba([255, 0, 0, 255]));
        let out = compose(&bg, &overlay);
        assert_eq!(out.dimensions(), (8, 8));
        assert_eq!(out.get_pixel(1, 1), &Rgba([255, 0, 0, 255]));
        let p = out.get_pixel(5, 5);
        assert!(p.0[0] == 0 && p.0[2] > 250 && p.0[3] > 250);
    }

    #[test]
    fn test_missing_font_file() {
        let err = BoxRenderer::from_font_file("/nonexistent/font.ttf");
        assert!(matches!(err, Err(SegError::Io(_))));
        assert!(!BoxRenderer::from_optional_font(None).unwrap().has_font());
    }
}

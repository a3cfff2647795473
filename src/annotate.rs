/// 检测框绘制 (Annotator)
use image::Rgb;
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use crate::detection::BoundingBox;
use crate::frame::Frame;

// ========== 公共常量 ==========

/// 检测框颜色 (绿色)
pub const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
/// 检测框线宽 (像素)
pub const BOX_THICKNESS: u32 = 2;

/// 在帧上绘制空心矩形框, 角点 (x, y) 与 (x+width, y+height)
///
/// 超出画面的部分被裁掉; 宽或高非正的框忽略
pub fn draw_boxes(frame: &mut Frame, boxes: &[BoundingBox]) {
    for bbox in boxes {
        draw_box(frame, bbox);
    }
}

fn draw_box(frame: &mut Frame, bbox: &BoundingBox) {
    if bbox.width <= 0 || bbox.height <= 0 {
        return;
    }
    // 第i圈向内收缩i个像素
    for i in 0..BOX_THICKNESS as i32 {
        let w = bbox.width - 2 * i + 1;
        let h = bbox.height - 2 * i + 1;
        if w <= 0 || h <= 0 {
            break;
        }
        let rect = Rect::at(bbox.x + i, bbox.y + i).of_size(w as u32, h as u32);
        draw_hollow_rect_mut(frame, rect, BOX_COLOR);
    }
}

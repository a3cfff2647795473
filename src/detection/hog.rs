/// HOG特征提取 (Histogram of Oriented Gradients)
///
/// 与 OpenCV `HOGDescriptor` 默认配置保持一致, 以便直接加载其默认行人SVM系数:
/// - 窗口 64x128, block 16x16, block步长 8x8, cell 8x8, 9个无符号方向bin
/// - Gaussian block加权 (σ = 4), 三线性插值投票
/// - L2-Hys归一化 (截断阈值 0.2), gamma校正 (开平方)
/// - 描述子排列: block按列优先, block内cell按列优先, 每个cell 9个bin → 3780维
use image::RgbImage;
use ndarray::{s, Array1, Array2, Array3, ArrayView1};
use std::f32::consts::PI;

use super::svm::LinearSvm;

// ========== 公共常量 ==========

pub const WIN_WIDTH: usize = 64;
pub const WIN_HEIGHT: usize = 128;
pub const BLOCK_SIZE: usize = 16;
pub const BLOCK_STRIDE: usize = 8;
pub const CELL_SIZE: usize = 8;
pub const NBINS: usize = 9;

const CELLS_PER_BLOCK: usize = BLOCK_SIZE / CELL_SIZE;
const BLOCK_HIST_LEN: usize = CELLS_PER_BLOCK * CELLS_PER_BLOCK * NBINS;
const BLOCKS_X: usize = (WIN_WIDTH - BLOCK_SIZE) / BLOCK_STRIDE + 1;
const BLOCKS_Y: usize = (WIN_HEIGHT - BLOCK_SIZE) / BLOCK_STRIDE + 1;

/// 单个窗口描述子长度 (105 blocks × 36)
pub const DESCRIPTOR_LEN: usize = BLOCKS_X * BLOCKS_Y * BLOCK_HIST_LEN;

const L2HYS_THRESHOLD: f32 = 0.2;

/// block内某个像素对各cell的投票权重 (已乘Gaussian权重)
#[derive(Debug, Clone, Copy, Default)]
struct PixelVote {
    cells: [(usize, f32); 4],
    count: usize,
}

/// HOG描述子计算器
#[derive(Debug, Clone)]
pub struct HogDescriptor {
    gamma_lut: [f32; 256],
    votes: Vec<PixelVote>, // BLOCK_SIZE × BLOCK_SIZE, 行优先
}

impl Default for HogDescriptor {
    fn default() -> Self {
        Self::new()
    }
}

impl HogDescriptor {
    pub fn new() -> Self {
        let mut gamma_lut = [0f32; 256];
        for (i, v) in gamma_lut.iter_mut().enumerate() {
            *v = (i as f32).sqrt();
        }

        let sigma = (BLOCK_SIZE + BLOCK_SIZE) as f32 / 8.0;
        let gauss_scale = 1.0 / (sigma * sigma * 2.0);

        let mut votes = Vec::with_capacity(BLOCK_SIZE * BLOCK_SIZE);
        for py in 0..BLOCK_SIZE {
            for px in 0..BLOCK_SIZE {
                let di = py as f32 - BLOCK_SIZE as f32 * 0.5;
                let dj = px as f32 - BLOCK_SIZE as f32 * 0.5;
                let gauss = (-(di * di + dj * dj) * gauss_scale).exp();

                // 像素中心在cell坐标系中的位置
                let cell_x = (px as f32 + 0.5) / CELL_SIZE as f32 - 0.5;
                let cell_y = (py as f32 + 0.5) / CELL_SIZE as f32 - 0.5;
                let cx0 = cell_x.floor() as i32;
                let cy0 = cell_y.floor() as i32;
                let fx = cell_x - cx0 as f32;
                let fy = cell_y - cy0 as f32;

                let mut vote = PixelVote::default();
                for (cx, wx) in [(cx0, 1.0 - fx), (cx0 + 1, fx)] {
                    for (cy, wy) in [(cy0, 1.0 - fy), (cy0 + 1, fy)] {
                        if cx < 0 || cy < 0 {
                            continue;
                        }
                        let (cx, cy) = (cx as usize, cy as usize);
                        if cx >= CELLS_PER_BLOCK || cy >= CELLS_PER_BLOCK {
                            continue;
                        }
                        // cell按列优先排列
                        let offset = (cx * CELLS_PER_BLOCK + cy) * NBINS;
                        vote.cells[vote.count] = (offset, gauss * wx * wy);
                        vote.count += 1;
                    }
                }
                votes.push(vote);
            }
        }

        Self { gamma_lut, votes }
    }

    pub fn window_size(&self) -> (usize, usize) {
        (WIN_WIDTH, WIN_HEIGHT)
    }

    pub fn descriptor_len(&self) -> usize {
        DESCRIPTOR_LEN
    }

    /// 计算整幅图的梯度: 每个像素两个相邻bin及其权重
    pub fn gradients(&self, img: &RgbImage) -> Gradients {
        let (w, h) = (img.width() as usize, img.height() as usize);
        let raw = img.as_raw();
        let mut bins = Array3::<u8>::zeros((h, w, 2));
        let mut weights = Array3::<f32>::zeros((h, w, 2));
        let angle_scale = NBINS as f32 / PI;

        let px = |x: usize, y: usize, c: usize| self.gamma_lut[raw[(y * w + x) * 3 + c] as usize];

        for y in 0..h {
            let y_prev = reflect101(y as i64 - 1, h);
            let y_next = reflect101(y as i64 + 1, h);
            for x in 0..w {
                let x_prev = reflect101(x as i64 - 1, w);
                let x_next = reflect101(x as i64 + 1, w);

                // 取梯度幅值最大的通道
                let (mut dx, mut dy, mut mag2) = (0f32, 0f32, -1f32);
                for c in 0..3 {
                    let cdx = px(x_next, y, c) - px(x_prev, y, c);
                    let cdy = px(x, y_next, c) - px(x, y_prev, c);
                    let cm2 = cdx * cdx + cdy * cdy;
                    if cm2 > mag2 {
                        dx = cdx;
                        dy = cdy;
                        mag2 = cm2;
                    }
                }
                let mag = mag2.sqrt();

                let mut angle = dy.atan2(dx);
                if angle < 0.0 {
                    angle += 2.0 * PI;
                }
                let ang = angle * angle_scale - 0.5;
                let floor = ang.floor();
                let frac = ang - floor;
                let mut hidx = floor as i32;
                if hidx < 0 {
                    hidx += NBINS as i32;
                } else if hidx >= NBINS as i32 {
                    hidx -= NBINS as i32;
                }
                let hidx = (hidx as usize).min(NBINS - 1);

                bins[[y, x, 0]] = hidx as u8;
                bins[[y, x, 1]] = ((hidx + 1) % NBINS) as u8;
                weights[[y, x, 0]] = mag * (1.0 - frac);
                weights[[y, x, 1]] = mag * frac;
            }
        }

        Gradients { bins, weights }
    }

    /// 计算左上角为 (bx, by) 的block直方图 (已归一化, 36维)
    fn block_histogram(&self, grad: &Gradients, bx: usize, by: usize) -> [f32; BLOCK_HIST_LEN] {
        let mut hist = [0f32; BLOCK_HIST_LEN];
        for (i, vote) in self.votes.iter().enumerate() {
            let y = by + i / BLOCK_SIZE;
            let x = bx + i % BLOCK_SIZE;
            let b0 = grad.bins[[y, x, 0]] as usize;
            let b1 = grad.bins[[y, x, 1]] as usize;
            let w0 = grad.weights[[y, x, 0]];
            let w1 = grad.weights[[y, x, 1]];
            for &(offset, weight) in &vote.cells[..vote.count] {
                hist[offset + b0] += w0 * weight;
                hist[offset + b1] += w1 * weight;
            }
        }
        normalize_block(&mut hist);
        hist
    }

    /// 对单个 64x128 窗口图像计算描述子
    pub fn compute(&self, window: &RgbImage) -> Option<Array1<f32>> {
        if window.width() as usize != WIN_WIDTH || window.height() as usize != WIN_HEIGHT {
            return None;
        }
        let grid = BlockGrid::build(self, window, (BLOCK_STRIDE, BLOCK_STRIDE));
        Some(grid.window_descriptor(0, 0))
    }
}

/// 梯度图: bins/weights 形状均为 (H, W, 2)
pub struct Gradients {
    bins: Array3<u8>,
    weights: Array3<f32>,
}

impl Gradients {
    pub fn width(&self) -> usize {
        self.bins.dim().1
    }

    pub fn height(&self) -> usize {
        self.bins.dim().0
    }
}

/// 预先计算好的block直方图网格
///
/// 网格步长取窗口步长与block步长的最大公约数, 所有窗口共享同一批block
pub struct BlockGrid {
    hist: Array2<f32>, // (ny * nx, 36)
    nx: usize,
    ny: usize,
    step: (usize, usize),
    width: usize,
    height: usize,
}

impl BlockGrid {
    pub fn build(desc: &HogDescriptor, img: &RgbImage, step: (usize, usize)) -> Self {
        let grad = desc.gradients(img);
        let (width, height) = (grad.width(), grad.height());
        let step = (step.0.max(1), step.1.max(1));
        let nx = if width >= BLOCK_SIZE {
            (width - BLOCK_SIZE) / step.0 + 1
        } else {
            0
        };
        let ny = if height >= BLOCK_SIZE {
            (height - BLOCK_SIZE) / step.1 + 1
        } else {
            0
        };

        let mut hist = Array2::<f32>::zeros((nx * ny, BLOCK_HIST_LEN));
        for gy in 0..ny {
            for gx in 0..nx {
                let block = desc.block_histogram(&grad, gx * step.0, gy * step.1);
                hist.row_mut(gy * nx + gx).assign(&ArrayView1::from(&block[..]));
            }
        }

        Self {
            hist,
            nx,
            ny,
            step,
            width,
            height,
        }
    }

    /// 网格的block步长
    pub fn step(&self) -> (usize, usize) {
        self.step
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// 所有可放置窗口的位置 (左上角), 按行扫描
    pub fn window_positions(&self, win_stride: (usize, usize)) -> Vec<(usize, usize)> {
        let mut positions = Vec::new();
        if self.width < WIN_WIDTH || self.height < WIN_HEIGHT {
            return positions;
        }
        for wy in (0..=self.height - WIN_HEIGHT).step_by(win_stride.1.max(1)) {
            for wx in (0..=self.width - WIN_WIDTH).step_by(win_stride.0.max(1)) {
                positions.push((wx, wy));
            }
        }
        positions
    }

    fn block_index(&self, wx: usize, wy: usize, bi: usize, bj: usize) -> usize {
        let gx = (wx + bi * BLOCK_STRIDE) / self.step.0;
        let gy = (wy + bj * BLOCK_STRIDE) / self.step.1;
        debug_assert!(gx < self.nx && gy < self.ny);
        gy * self.nx + gx
    }

    /// 拼出窗口 (wx, wy) 的完整描述子; 坐标必须是网格步长的整数倍
    pub fn window_descriptor(&self, wx: usize, wy: usize) -> Array1<f32> {
        let mut out = Array1::<f32>::zeros(DESCRIPTOR_LEN);
        let mut k = 0;
        for bi in 0..BLOCKS_X {
            for bj in 0..BLOCKS_Y {
                let row = self.hist.row(self.block_index(wx, wy, bi, bj));
                out.slice_mut(s![k..k + BLOCK_HIST_LEN]).assign(&row);
                k += BLOCK_HIST_LEN;
            }
        }
        out
    }

    /// 窗口 (wx, wy) 的SVM得分 w·x + b, 不拼接完整描述子
    pub fn window_score(&self, wx: usize, wy: usize, svm: &LinearSvm) -> f32 {
        let weights = svm.weights();
        let mut score = svm.bias();
        let mut k = 0;
        for bi in 0..BLOCKS_X {
            for bj in 0..BLOCKS_Y {
                let row = self.hist.row(self.block_index(wx, wy, bi, bj));
                score += weights.slice(s![k..k + BLOCK_HIST_LEN]).dot(&row);
                k += BLOCK_HIST_LEN;
            }
        }
        score
    }
}

/// L2-Hys: L2归一化 → 截断 → 再次L2归一化
fn normalize_block(hist: &mut [f32]) {
    let sum: f32 = hist.iter().map(|v| v * v).sum();
    let scale = 1.0 / (sum.sqrt() + hist.len() as f32 * 0.1);
    let mut sum = 0.0;
    for v in hist.iter_mut() {
        *v = (*v * scale).min(L2HYS_THRESHOLD);
        sum += *v * *v;
    }
    let scale = 1.0 / (sum.sqrt() + 1e-3);
    for v in hist.iter_mut() {
        *v *= scale;
    }
}

/// BORDER_REFLECT_101: gfedcb|abcdefgh|gfedcba
pub fn reflect101(i: i64, n: usize) -> usize {
    let n = n as i64;
    if n <= 1 {
        return 0;
    }
    let mut i = i;
    while i < 0 || i >= n {
        if i < 0 {
            i = -i;
        }
        if i >= n {
            i = 2 * n - 2 - i;
        }
    }
    i as usize
}

/// 四周按 reflect-101 补边
pub fn pad_reflect101(img: &RgbImage, pad_x: u32, pad_y: u32) -> RgbImage {
    if pad_x == 0 && pad_y == 0 {
        return img.clone();
    }
    let (w, h) = img.dimensions();
    let mut out = RgbImage::new(w + 2 * pad_x, h + 2 * pad_y);
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let sx = reflect101(x as i64 - pad_x as i64, w as usize);
        let sy = reflect101(y as i64 - pad_y as i64, h as usize);
        *pixel = *img.get_pixel(sx as u32, sy as u32);
    }
    out
}

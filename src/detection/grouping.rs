/// 检测框聚类与非极大值抑制
///
/// - `group_rectangles`: 与 OpenCV `groupRectangles` 行为一致, HOG多尺度检测的默认后处理
/// - `non_max_suppression`: 按置信度排序的IoU抑制, 用于ONNX模型输出
use super::types::{BoundingBox, Detection};

/// 两个框是否"相似" (四条边都在容差内)
fn similar(a: &BoundingBox, b: &BoundingBox, eps: f64) -> bool {
    let delta =
        eps * (a.width.min(b.width) as f64 + a.height.min(b.height) as f64) * 0.5;
    ((a.x - b.x).abs() as f64) <= delta
        && ((a.y - b.y).abs() as f64) <= delta
        && ((a.right() - b.right()).abs() as f64) <= delta
        && ((a.bottom() - b.bottom()).abs() as f64) <= delta
}

/// 并查集划分等价类, 返回每个元素的类别编号和类别数
fn partition(dets: &[Detection], eps: f64) -> (Vec<usize>, usize) {
    let n = dets.len();
    let mut parent: Vec<usize> = (0..n).collect();

    fn find(parent: &mut [usize], mut i: usize) -> usize {
        while parent[i] != i {
            parent[i] = parent[parent[i]];
            i = parent[i];
        }
        i
    }

    for i in 0..n {
        for j in (i + 1)..n {
            if similar(&dets[i].bbox, &dets[j].bbox, eps) {
                let ri = find(&mut parent, i);
                let rj = find(&mut parent, j);
                if ri != rj {
                    parent[rj] = ri;
                }
            }
        }
    }

    let mut labels = vec![0usize; n];
    let mut roots: Vec<usize> = Vec::new();
    for i in 0..n {
        let root = find(&mut parent, i);
        labels[i] = match roots.iter().position(|&r| r == root) {
            Some(idx) => idx,
            None => {
                roots.push(root);
                roots.len() - 1
            }
        };
    }
    (labels, roots.len())
}

/// 聚类合并重叠的检测框
///
/// 成员数不超过 `group_threshold` 的类被丢弃; 被更强的类包含的小框也被丢弃.
/// `group_threshold == 0` 时原样返回
pub fn group_rectangles(dets: &[Detection], group_threshold: usize, eps: f64) -> Vec<Detection> {
    if group_threshold == 0 || dets.is_empty() {
        return dets.to_vec();
    }

    let (labels, nclasses) = partition(dets, eps);

    let mut sums = vec![[0i64; 4]; nclasses];
    let mut counts = vec![0usize; nclasses];
    let mut best = vec![f32::NEG_INFINITY; nclasses];
    for (det, &cls) in dets.iter().zip(labels.iter()) {
        sums[cls][0] += det.bbox.x as i64;
        sums[cls][1] += det.bbox.y as i64;
        sums[cls][2] += det.bbox.width as i64;
        sums[cls][3] += det.bbox.height as i64;
        counts[cls] += 1;
        best[cls] = best[cls].max(det.weight);
    }

    let averaged: Vec<BoundingBox> = sums
        .iter()
        .zip(counts.iter())
        .map(|(sum, &n)| {
            let s = 1.0 / n as f64;
            BoundingBox::new(
                (sum[0] as f64 * s).round() as i32,
                (sum[1] as f64 * s).round() as i32,
                (sum[2] as f64 * s).round() as i32,
                (sum[3] as f64 * s).round() as i32,
            )
        })
        .collect();

    let mut out = Vec::new();
    for i in 0..nclasses {
        let n1 = counts[i];
        if n1 <= group_threshold {
            continue;
        }
        let r1 = averaged[i];

        // 过滤掉落在更大、更强的框内部的小框
        let swallowed = (0..nclasses).any(|j| {
            let n2 = counts[j];
            if j == i || n2 <= group_threshold {
                return false;
            }
            let r2 = averaged[j];
            let dx = (r2.width as f64 * eps).round() as i32;
            let dy = (r2.height as f64 * eps).round() as i32;
            r2.contains(&r1, dx, dy) && (n2 > n1.max(3) || n1 < 3)
        });

        if !swallowed {
            out.push(Detection {
                bbox: r1,
                weight: best[i],
            });
        }
    }
    out
}

/// 非极大值抑制: 按置信度降序, 丢弃与已保留框IoU超过阈值的框
pub fn non_max_suppression(dets: &mut Vec<Detection>, iou_threshold: f32) {
    dets.sort_by(|a, b| b.weight.total_cmp(&a.weight));

    let mut current_index = 0;
    for index in 0..dets.len() {
        let mut drop = false;
        for prev_index in 0..current_index {
            let iou = dets[prev_index].bbox.iou(&dets[index].bbox);
            if iou > iou_threshold {
                drop = true;
                break;
            }
        }
        if !drop {
            dets.swap(current_index, index);
            current_index += 1;
        }
    }
    dets.truncate(current_index);
}

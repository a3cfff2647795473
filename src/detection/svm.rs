/// 线性SVM分类器 (Linear SVM)
///
/// 系数文件兼容 OpenCV `HOGDescriptor::getDefaultPeopleDetector()` 的导出格式:
/// 3780个权重后跟1个偏置, 以空白或逗号分隔; 也支持 JSON `{ "weights": [...], "bias": b }`
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use super::hog::DESCRIPTOR_LEN;
use crate::error::{PipelineError, PipelineResult};

#[derive(Debug, Clone, PartialEq)]
pub struct LinearSvm {
    weights: Array1<f32>,
    bias: f32,
}

#[derive(Serialize, Deserialize)]
struct SvmFile {
    weights: Vec<f32>,
    #[serde(default)]
    bias: f32,
}

impl LinearSvm {
    pub fn new(weights: Array1<f32>, bias: f32) -> Self {
        Self { weights, bias }
    }

    /// 从扁平系数创建: 长度为 N+1 时最后一个是偏置, 长度为 N 时偏置为0
    pub fn from_coefficients(mut coeffs: Vec<f32>) -> PipelineResult<Self> {
        let bias = match coeffs.len() {
            n if n == DESCRIPTOR_LEN + 1 => coeffs.pop().unwrap_or_default(),
            n if n == DESCRIPTOR_LEN => 0.0,
            n => {
                return Err(PipelineError::Model(format!(
                    "SVM系数数量错误: 期望 {} 或 {}, 实际 {}",
                    DESCRIPTOR_LEN,
                    DESCRIPTOR_LEN + 1,
                    n
                )))
            }
        };
        Ok(Self::new(Array1::from(coeffs), bias))
    }

    /// 从文件加载系数
    pub fn load(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| PipelineError::Model(format!("读取 '{}' 失败: {}", path.display(), e)))?;

        let svm = if text.trim_start().starts_with('{') {
            let file: SvmFile = serde_json::from_str(&text)
                .map_err(|e| PipelineError::Model(format!("解析 '{}' 失败: {}", path.display(), e)))?;
            if file.weights.len() != DESCRIPTOR_LEN {
                return Err(PipelineError::Model(format!(
                    "SVM权重数量错误: 期望 {}, 实际 {}",
                    DESCRIPTOR_LEN,
                    file.weights.len()
                )));
            }
            Self::new(Array1::from(file.weights), file.bias)
        } else {
            Self::from_coefficients(parse_coefficients(&text)?)?
        };

        tracing::info!(
            "✅ SVM系数加载成功: {} ({} 维, bias={:.4})",
            path.display(),
            svm.len(),
            svm.bias
        );
        Ok(svm)
    }

    /// 保存为 JSON
    pub fn save(&self, path: impl AsRef<Path>) -> PipelineResult<()> {
        let path = path.as_ref();
        let file = SvmFile {
            weights: self.weights.to_vec(),
            bias: self.bias,
        };
        let json = serde_json::to_string(&file).map_err(|e| PipelineError::Model(e.to_string()))?;
        fs::write(path, json).map_err(|e| PipelineError::write(path, e))
    }

    pub fn weights(&self) -> &Array1<f32> {
        &self.weights
    }

    pub fn bias(&self) -> f32 {
        self.bias
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn score(&self, descriptor: &Array1<f32>) -> f32 {
        self.weights.dot(descriptor) + self.bias
    }
}

/// 解析以空白/逗号分隔的浮点列表, `#` 开头的行视为注释
fn parse_coefficients(text: &str) -> PipelineResult<Vec<f32>> {
    let mut coeffs = Vec::with_capacity(DESCRIPTOR_LEN + 1);
    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        for token in line.split(|c: char| c.is_whitespace() || c == ',') {
            let token = token.trim_end_matches('f');
            if token.is_empty() {
                continue;
            }
            let value = token.parse::<f32>().map_err(|e| {
                PipelineError::Model(format!("第 {} 行无法解析 '{}': {}", line_no + 1, token, e))
            })?;
            coeffs.push(value);
        }
    }
    Ok(coeffs)
}

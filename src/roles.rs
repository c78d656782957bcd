use anyhow::Result;
use opencv::core::{self, Mat, Scalar};
use opencv::imgproc;
use opencv::prelude::*;

use crate::canon::CanonPath;

/// 黄色标注的 HSV 判定范围（OpenCV 的 H 取值为 0..180）
const YELLOW_LOWER: (f64, f64, f64) = (15., 80., 80.);
const YELLOW_UPPER: (f64, f64, f64) = (40., 255., 255.);

/// 文件名中暗示 ground truth 身份的关键词
const GT_NAME_HINTS: &[&str] =
    &["gt", "ground_truth", "ground-truth", "mask", "annot", "label", "seg", "overlay", "contour"];

/// 角色判定用到的图片特征，每张图片只测量一次
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageTraits {
    /// 原始分辨率下的像素面积
    pub area: i64,
    /// 落在黄色标注色带内的像素数
    pub yellow: i32,
    /// 文件名是否包含 ground truth 关键词
    pub name_hint: bool,
}

impl ImageTraits {
    /// 从彩色图片与其路径提取角色特征
    pub fn measure(image: &Mat, path: &CanonPath) -> Result<Self> {
        Ok(Self {
            area: image.cols() as i64 * image.rows() as i64,
            yellow: count_yellow(image)?,
            name_hint: name_has_gt_hint(path.as_str()),
        })
    }
}

/// 统计落在黄色标注色带内的像素数
pub fn count_yellow(image: &Mat) -> Result<i32> {
    let mut hsv = Mat::default();
    imgproc::cvt_color_def(image, &mut hsv, imgproc::COLOR_BGR2HSV)?;
    let mut mask = Mat::default();
    core::in_range(&hsv, &Scalar::from(YELLOW_LOWER), &Scalar::from(YELLOW_UPPER), &mut mask)?;
    Ok(core::count_non_zero(&mask)?)
}

pub fn name_has_gt_hint(path: &str) -> bool {
    let lower = path.to_lowercase();
    GT_NAME_HINTS.iter().any(|h| lower.contains(h))
}

/// 判定一对相似图片中哪张是 raw、哪张是 ground truth，返回 (raw, ground_truth)
///
/// 级联规则，每级只在上一级打平时生效：
/// 1. 只有一张含黄色标注 -> 含标注的是 ground truth
/// 2. 面积较小的是 ground truth（标注图通常经过裁剪）
/// 3. 黄色像素更多的是 ground truth
/// 4. 文件名含 ground truth 关键词的是 ground truth
/// 5. 字典序较小的路径是 raw，保证任何输入都有确定答案
///
/// 输出只是默认建议，最终取舍由人工复核。
pub fn classify<'a>(
    path_a: &'a CanonPath,
    traits_a: &ImageTraits,
    path_b: &'a CanonPath,
    traits_b: &ImageTraits,
) -> (&'a CanonPath, &'a CanonPath) {
    let (a_yellow, b_yellow) = (traits_a.yellow > 0, traits_b.yellow > 0);
    if a_yellow != b_yellow {
        return if a_yellow { (path_b, path_a) } else { (path_a, path_b) };
    }
    if traits_a.area != traits_b.area {
        return if traits_a.area < traits_b.area { (path_b, path_a) } else { (path_a, path_b) };
    }
    if traits_a.yellow != traits_b.yellow {
        return if traits_a.yellow > traits_b.yellow { (path_b, path_a) } else { (path_a, path_b) };
    }
    if traits_a.name_hint != traits_b.name_hint {
        return if traits_a.name_hint { (path_b, path_a) } else { (path_a, path_b) };
    }
    if path_a < path_b { (path_a, path_b) } else { (path_b, path_a) }
}

use anyhow::Result;
use opencv::calib3d;
use opencv::core::{self, Mat, Point2f, Vector};
use opencv::prelude::*;

use crate::config::MatchOptions;
use crate::hamming::nn2_hamming;
use crate::orb::FeatureSet;

/// 计算一对图片的几何一致性评分
///
/// 对 A 的每个描述子在 B 中找最近的两个邻居，用比例检验筛掉歧义
/// 匹配；有效匹配不足 min_matches 时直接判 0，不尝试拟合几何；
/// 否则用 RANSAC 拟合单应矩阵，评分为与之一致的内点数。
/// 评分与参数顺序无关，调用方按无序对计算一次即可。
pub fn score_pair(a: &FeatureSet, b: &FeatureSet, opts: &MatchOptions) -> Result<i32> {
    if a.len() < opts.min_matches || b.len() < opts.min_matches {
        return Ok(0);
    }

    // 内部固定匹配方向，交换参数也会走完全相同的计算路径
    let (a, b) = if a.descriptors <= b.descriptors { (a, b) } else { (b, a) };

    let mut src = Vector::<Point2f>::new();
    let mut dst = Vector::<Point2f>::new();
    for (i, des) in a.descriptors.iter().enumerate() {
        let Some((j, d1, d2)) = nn2_hamming(des, &b.descriptors) else {
            break;
        };
        if (d1 as f32) < opts.ratio * d2 as f32 {
            src.push(a.keypoints[i].pt());
            dst.push(b.keypoints[j].pt());
        }
    }

    if src.len() < opts.min_matches {
        return Ok(0);
    }

    let mut mask = Mat::default();
    let h =
        calib3d::find_homography(&src, &dst, &mut mask, calib3d::RANSAC, opts.ransac_threshold)?;
    if h.empty() {
        return Ok(0);
    }
    Ok(core::count_non_zero(&mask)?)
}

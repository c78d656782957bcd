use std::collections::HashSet;

use anyhow::Result;
use log::warn;
use serde::Serialize;

use crate::canon::CanonPath;
use crate::config::MatchOptions;
use crate::orb::{FeatureSet, OrbDetector};
use crate::roles::{self, ImageTraits};
use crate::score;
use crate::utils;

/// 图片池中一张图片的派生数据：特征集与角色特征
///
/// 像素缓冲在提取后即被丢弃，整个池只保留派生数据。
pub struct PoolImage {
    pub path: CanonPath,
    pub features: FeatureSet,
    pub traits: ImageTraits,
}

/// 一条已提交的对应关系，排序输出的基本单元
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Correspondence {
    pub raw: CanonPath,
    pub ground_truth: CanonPath,
    pub score: i32,
}

/// 赋值结果；cancelled 为 true 时 matches 只覆盖已评分的部分
pub struct Assignment {
    pub matches: Vec<Correspondence>,
    pub cancelled: bool,
}

/// 读取图片池，为每张图片提取特征集与角色特征
///
/// 解码失败的图片记录后剔除，不影响其余图片。
pub fn build_pool(
    paths: &[CanonPath],
    orb: &mut OrbDetector,
    mut progress: impl FnMut(usize, usize) -> bool,
) -> (Vec<PoolImage>, bool) {
    let mut pool = vec![];
    let mut cancelled = false;
    for (done, path) in paths.iter().enumerate() {
        if !progress(done, paths.len()) {
            cancelled = true;
            break;
        }
        match load_one(path, orb) {
            Ok(image) => pool.push(image),
            Err(e) => warn!("无法读取图片，跳过: {}: {}", path, e),
        }
    }
    (pool, cancelled)
}

fn load_one(path: &CanonPath, orb: &mut OrbDetector) -> Result<PoolImage> {
    let color = utils::imread_color(path.as_str())?;
    let traits = ImageTraits::measure(&color, path)?;
    let features = orb.detect_image(color)?;
    Ok(PoolImage { path: path.clone(), features, traits })
}

/// 在池内发现配对并提交无冲突的一对一赋值
///
/// 枚举 i < j 的无序对，低于 min_inliers 的丢弃，存活的配对先判
/// 角色，再按评分降序排序（同分按路径字典序，保证重复运行输出
/// 完全一致），最后贪心提交：两张图都未被占用的配对才被接受，
/// 至多提交 max_results 条。贪心不保证全局最优，但确定、稳定、
/// 优先采信最强证据。
pub fn assign(
    pool: &[PoolImage],
    opts: &MatchOptions,
    mut progress: impl FnMut(usize, usize) -> bool,
) -> Assignment {
    let total = pool.len() * pool.len().saturating_sub(1) / 2;
    let mut done = 0;
    let mut scored = vec![];
    let mut cancelled = false;

    'outer: for i in 0..pool.len() {
        for j in i + 1..pool.len() {
            if !progress(done, total) {
                cancelled = true;
                break 'outer;
            }
            done += 1;
            let (a, b) = (&pool[i], &pool[j]);
            let score = match score::score_pair(&a.features, &b.features, opts) {
                Ok(score) => score,
                Err(e) => {
                    warn!("评分失败，跳过配对 {} / {}: {}", a.path, b.path, e);
                    continue;
                }
            };
            if score < opts.min_inliers {
                continue;
            }
            let (raw, gt) = roles::classify(&a.path, &a.traits, &b.path, &b.traits);
            scored.push(Correspondence { raw: raw.clone(), ground_truth: gt.clone(), score });
        }
    }

    scored.sort_by(|x, y| {
        y.score
            .cmp(&x.score)
            .then_with(|| x.raw.cmp(&y.raw))
            .then_with(|| x.ground_truth.cmp(&y.ground_truth))
    });

    Assignment { matches: commit_greedy(scored, opts.max_results), cancelled }
}

/// 贪心提交：按序接受两张图都未被占用的配对
fn commit_greedy(ranked: Vec<Correspondence>, cap: usize) -> Vec<Correspondence> {
    let mut used = HashSet::new();
    let mut committed = vec![];
    for c in ranked {
        if used.contains(&c.raw) || used.contains(&c.ground_truth) {
            continue;
        }
        used.insert(c.raw.clone());
        used.insert(c.ground_truth.clone());
        committed.push(c);
        if committed.len() >= cap {
            break;
        }
    }
    committed
}

/// 把一张查询图片与池内其余图片逐一比对，按相似度降序返回
pub fn rank_against(
    query: &PoolImage,
    pool: &[PoolImage],
    opts: &MatchOptions,
    mut progress: impl FnMut(usize, usize) -> bool,
) -> (Vec<(CanonPath, i32)>, bool) {
    let mut result = vec![];
    let mut cancelled = false;
    for (done, other) in pool.iter().enumerate() {
        if !progress(done, pool.len()) {
            cancelled = true;
            break;
        }
        if other.path == query.path {
            continue;
        }
        let score = match score::score_pair(&query.features, &other.features, opts) {
            Ok(score) => score,
            Err(e) => {
                warn!("评分失败，跳过: {}: {}", other.path, e);
                continue;
            }
        };
        if score >= opts.min_inliers {
            result.push((other.path.clone(), score));
        }
    }
    result.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    (result, cancelled)
}

use anyhow::Result;
use opencv::core::{KeyPoint, Mat, Ptr};
use opencv::features2d::{ORB, ORB_ScoreType};
use opencv::imgproc;
use opencv::prelude::*;

use crate::config::OrbOptions;
use crate::utils;

/// 单张图片的特征集：关键点与对应的 256 位二进制描述子
///
/// 每次匹配会话重新提取，不跨运行持久化。
pub struct FeatureSet {
    pub keypoints: Vec<KeyPoint>,
    pub descriptors: Vec<[u8; 32]>,
}

impl FeatureSet {
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

pub struct OrbDetector {
    orb: Ptr<ORB>,
    opts: OrbOptions,
}

impl OrbDetector {
    pub fn create(opts: OrbOptions) -> Result<Self> {
        let orb = ORB::create(
            opts.orb_nfeatures as i32,
            opts.orb_scale_factor,
            opts.orb_nlevels as i32,
            opts.orb_edge_threshold as i32,
            0,
            2,
            ORB_ScoreType::HARRIS_SCORE,
            31,
            opts.orb_fast_threshold as i32,
        )?;
        Ok(Self { orb, opts })
    }

    pub fn detect_file(&mut self, path: &str) -> Result<FeatureSet> {
        let image = utils::imread_gray(path, self.opts.max_side as i32)?;
        let (keypoints, descriptors) = utils::detect_and_compute(&mut self.orb, &image)?;
        Ok(FeatureSet {
            keypoints: keypoints.to_vec(),
            descriptors: convert_descriptors(&descriptors)?,
        })
    }

    /// 从已解码的图片提取特征，多通道输入会先转为灰度
    pub fn detect_image(&mut self, image: Mat) -> Result<FeatureSet> {
        let image = if image.channels() > 1 {
            let mut gray = Mat::default();
            imgproc::cvt_color_def(&image, &mut gray, imgproc::COLOR_BGR2GRAY)?;
            gray
        } else {
            image
        };
        let image = utils::adjust_image_size(image, self.opts.max_side as i32)?;
        let (keypoints, descriptors) = utils::detect_and_compute(&mut self.orb, &image)?;
        Ok(FeatureSet {
            keypoints: keypoints.to_vec(),
            descriptors: convert_descriptors(&descriptors)?,
        })
    }
}

/// 将 OpenCV 的 N x 32 描述子矩阵转为定长数组
fn convert_descriptors(des: &Mat) -> Result<Vec<[u8; 32]>> {
    if des.empty() {
        return Ok(vec![]);
    }
    let data = des.data_bytes()?;
    Ok(data.chunks_exact(32).map(|c| c.try_into().unwrap()).collect())
}

use anyhow::Result;
use clap::Parser;
use log::info;
use opencv::core::{DMatch, KeyPoint, Vector};

use crate::cli::SubCommandExtend;
use crate::config::{Opts, OrbOptions};
use crate::hamming::nn2_hamming;
use crate::orb::OrbDetector;
use crate::utils;

#[derive(Parser, Debug, Clone)]
pub struct ShowCommand {
    #[command(flatten)]
    pub orb: OrbOptions,
    /// 图片1
    pub image1: String,
    /// 图片2
    pub image2: String,
    /// 匹配结果的保存路径
    pub output: String,
    /// 比例检验阈值
    #[arg(long, value_name = "RATIO", default_value_t = 0.75)]
    pub ratio: f32,
}

impl SubCommandExtend for ShowCommand {
    fn run(&self, _opts: &Opts) -> Result<()> {
        let img1 = utils::imread_gray(&self.image1, self.orb.max_side as i32)?;
        let img2 = utils::imread_gray(&self.image2, self.orb.max_side as i32)?;

        let mut orb = OrbDetector::create(self.orb.clone())?;
        let fs1 = orb.detect_image(img1.clone())?;
        let fs2 = orb.detect_image(img2.clone())?;

        let mut matches = Vector::<DMatch>::new();
        for (i, des) in fs1.descriptors.iter().enumerate() {
            let Some((j, d1, d2)) = nn2_hamming(des, &fs2.descriptors) else {
                break;
            };
            if (d1 as f32) < self.ratio * d2 as f32 {
                matches.push(DMatch::new(i as i32, j as i32, d1 as f32)?);
            }
        }

        let kps1 = Vector::<KeyPoint>::from_iter(fs1.keypoints.iter().cloned());
        let kps2 = Vector::<KeyPoint>::from_iter(fs2.keypoints.iter().cloned());
        let output = utils::draw_matches(&img1, &kps1, &img2, &kps2, &matches)?;
        utils::imwrite(&self.output, &output)?;

        info!("共 {} 对有效匹配，已保存到 {}", matches.len(), self.output);
        Ok(())
    }
}

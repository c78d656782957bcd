use anyhow::{Context, Result, ensure};
use clap::Parser;
use log::info;
use serde_json::json;

use crate::assign;
use crate::canon::CanonPath;
use crate::cli::{SubCommandExtend, collect_images, progress_bar};
use crate::config::{MatchOptions, Opts, OrbOptions, OutputFormat};
use crate::orb::OrbDetector;

#[derive(Parser, Debug, Clone)]
pub struct SimilarCommand {
    #[command(flatten)]
    pub orb: OrbOptions,
    #[command(flatten)]
    pub matching: MatchOptions,
    /// 查询图片路径
    pub image: String,
    /// 待比对的图片池目录
    pub path: String,
    /// 扫描的文件后缀名，多个后缀用逗号分隔
    #[arg(short, long, default_value = "png")]
    pub suffix: String,
    /// 输出格式
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    pub output_format: OutputFormat,
}

impl SubCommandExtend for SimilarCommand {
    fn run(&self, _opts: &Opts) -> Result<()> {
        let mut orb = OrbDetector::create(self.orb.clone())?;

        let query_path = CanonPath::new(&self.image);
        let (query, _) = assign::build_pool(&[query_path], &mut orb, |_, _| true);
        let query = query.into_iter().next().context("无法读取查询图片")?;

        let paths = collect_images(&self.path, &self.suffix)?;
        ensure!(!paths.is_empty(), "目录下没有匹配的图片: {}", self.path);

        let pb = progress_bar(paths.len(), "提取特征中...");
        let (pool, _) = assign::build_pool(&paths, &mut orb, |done, _| {
            pb.set_position(done as u64);
            true
        });
        pb.finish_and_clear();

        let pb = progress_bar(pool.len(), "比对中...");
        let (ranked, _) = assign::rank_against(&query, &pool, &self.matching, |done, _| {
            pb.set_position(done as u64);
            true
        });
        pb.finish_and_clear();

        info!("共 {} 张相似图片", ranked.len());
        match self.output_format {
            OutputFormat::Json => {
                let items: Vec<_> =
                    ranked.iter().map(|(path, score)| json!({ "path": path, "score": score })).collect();
                println!("{}", serde_json::to_string_pretty(&items)?);
            }
            OutputFormat::Table => {
                for (path, score) in &ranked {
                    println!("{}\t{}", score, path);
                }
            }
        }
        Ok(())
    }
}

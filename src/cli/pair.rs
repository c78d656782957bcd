use anyhow::{Result, ensure};
use clap::Parser;
use log::info;

use crate::assign::{self, Correspondence};
use crate::cli::{SubCommandExtend, collect_images, progress_bar};
use crate::config::{MatchOptions, Opts, OrbOptions, OutputFormat};
use crate::orb::OrbDetector;

#[derive(Parser, Debug, Clone)]
pub struct PairCommand {
    #[command(flatten)]
    pub orb: OrbOptions,
    #[command(flatten)]
    pub matching: MatchOptions,
    /// 同一受检者的图片目录
    pub path: String,
    /// 扫描的文件后缀名，多个后缀用逗号分隔
    #[arg(short, long, default_value = "png")]
    pub suffix: String,
    /// 输出格式
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    pub output_format: OutputFormat,
}

impl SubCommandExtend for PairCommand {
    fn run(&self, _opts: &Opts) -> Result<()> {
        let paths = collect_images(&self.path, &self.suffix)?;
        ensure!(!paths.is_empty(), "目录下没有匹配的图片: {}", self.path);
        info!("共 {} 张图片", paths.len());

        let mut orb = OrbDetector::create(self.orb.clone())?;
        let pb = progress_bar(paths.len(), "提取特征中...");
        let (pool, _) = assign::build_pool(&paths, &mut orb, |done, _| {
            pb.set_position(done as u64);
            true
        });
        pb.finish_and_clear();

        let pb = progress_bar(0, "配对评分中...");
        let result = assign::assign(&pool, &self.matching, |done, total| {
            pb.set_length(total as u64);
            pb.set_position(done as u64);
            true
        });
        pb.finish_and_clear();

        info!("共 {} 对建议配对", result.matches.len());
        print_result(&result.matches, self.output_format)
    }
}

fn print_result(matches: &[Correspondence], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(matches)?)
        }
        OutputFormat::Table => {
            for m in matches {
                println!("{}\t{}\t{}", m.score, m.raw, m.ground_truth);
            }
        }
    }
    Ok(())
}

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};

use crate::cli::{SubCommandExtend, progress_bar};
use crate::config::Opts;
use crate::index::{CorpusInventory, HashIndex};
use crate::remap::{self, write_report};

#[derive(Parser, Debug, Clone)]
pub struct RemapCommand {
    /// 原始库清单 JSON，内容为 文件夹 -> 期望文件名列表
    pub inventory: String,
    /// 衍生图片库根目录
    pub source: String,
    /// 输出目录
    pub output: String,
    /// 扫描的文件后缀名，多个后缀用逗号分隔
    #[arg(short, long, default_value = "png")]
    pub suffix: String,
}

impl SubCommandExtend for RemapCommand {
    fn run(&self, _opts: &Opts) -> Result<()> {
        let text = fs::read_to_string(&self.inventory)
            .with_context(|| format!("无法读取清单: {}", self.inventory))?;
        let inventory: CorpusInventory =
            serde_json::from_str(&text).context("清单不是合法的 JSON 映射")?;

        info!("开始构建指纹索引，共 {} 个文件夹", inventory.len());
        let pb = progress_bar(0, "构建索引中...");
        let (index, _) = HashIndex::build(&inventory, |done, total| {
            pb.set_length(total as u64);
            pb.set_position(done as u64);
            true
        });
        pb.finish_and_clear();
        if index.is_empty() {
            warn!("索引为空，所有衍生图片都将落入未命中报告");
        }

        let output = Path::new(&self.output);
        let pb = progress_bar(0, "重映射中...");
        let summary =
            remap::remap_corpus(&index, Path::new(&self.source), output, &self.suffix, |done, total| {
                pb.set_length(total as u64);
                pb.set_position(done as u64);
                true
            })?;
        pb.finish_and_clear();

        fs::create_dir_all(output)?;
        write_report(&output.join("unmatched_files.txt"), &summary.unmatched)?;
        write_report(&output.join("unused_original_files.txt"), &summary.unused)?;

        info!(
            "重映射完成: 命中 {} 张，未命中 {} 张，未被认领的原始图片 {} 张",
            summary.remapped,
            summary.unmatched.len(),
            summary.unused.len()
        );
        Ok(())
    }
}

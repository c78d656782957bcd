mod pair;
mod remap;
mod show;
mod similar;

pub use pair::*;
pub use remap::*;
pub use show::*;
pub use similar::*;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use regex::Regex;
use walkdir::WalkDir;

use crate::canon::CanonPath;
use crate::config::Opts;

pub trait SubCommandExtend {
    fn run(&self, opts: &Opts) -> Result<()>;
}

/// 收集目录下所有匹配后缀的图片路径
///
/// 结果排序后返回，重复运行得到完全一致的池。
pub(crate) fn collect_images(root: &str, suffix: &str) -> Result<Vec<CanonPath>> {
    let re = Regex::new(&suffix.replace(',', "|")).context("无法解析后缀列表")?;
    let mut paths: Vec<_> = WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_type().is_file()
                && entry.path().extension().map(|s| re.is_match(&s.to_string_lossy()))
                    == Some(true)
        })
        .map(|entry| CanonPath::from(entry.path()))
        .collect();
    paths.sort();
    Ok(paths)
}

pub(crate) fn progress_bar(len: usize, msg: &str) -> ProgressBar {
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
        .unwrap()
        .progress_chars("#>-");
    ProgressBar::new(len as u64).with_style(style).with_message(msg.to_string())
}

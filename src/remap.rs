use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, ensure};
use log::{debug, info, warn};
use regex::Regex;
use walkdir::WalkDir;

use crate::canon::CanonPath;
use crate::fingerprint;
use crate::index::{HashIndex, OriginalTriplet};

/// 精确对应解析器：按内容指纹把衍生图片定位回原始三联档
pub struct Resolver<'a> {
    index: &'a HashIndex,
}

impl<'a> Resolver<'a> {
    pub fn new(index: &'a HashIndex) -> Self {
        Self { index }
    }

    /// 计算衍生图片的指纹并查找索引
    ///
    /// 未命中原样上报为 None，不做任何相似度回退。
    pub fn resolve(&self, image: &str) -> Result<Option<&'a OriginalTriplet>> {
        let digest = fingerprint::fingerprint_file(image)?;
        Ok(self.index.get(&digest))
    }
}

/// 批量重映射的结果
pub struct RemapSummary {
    /// 成功重映射的衍生图片数
    pub remapped: usize,
    /// 没有命中任何原始三联档的衍生图片
    pub unmatched: Vec<CanonPath>,
    /// 从未被任何衍生图片认领的原始图片
    pub unused: Vec<CanonPath>,
    /// 是否被中途取消
    pub cancelled: bool,
}

/// 把衍生图片库重映射回原始三联档
///
/// 遍历 source_root 下所有匹配后缀的图片并逐张解析。命中的三联档
/// 复制到 output_root 下，目录结构沿用衍生库的相对结构，最内层
/// 文件夹改名为原始三联档的 base name。单个文件的解码或复制失败
/// 只记录并跳过，不会中断整个批次；source_root 本身不存在则在
/// 任何逐文件工作开始前直接报错。
pub fn remap_corpus(
    index: &HashIndex,
    source_root: &Path,
    output_root: &Path,
    suffix: &str,
    mut progress: impl FnMut(usize, usize) -> bool,
) -> Result<RemapSummary> {
    ensure!(source_root.is_dir(), "衍生库根目录不存在: {}", source_root.display());
    let re = Regex::new(&suffix.replace(',', "|")).context("无法解析后缀列表")?;

    // 先收集再处理，让进度回调有确定的总数
    let files: Vec<_> = WalkDir::new(source_root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_type().is_file()
                && entry.path().extension().map(|s| re.is_match(&s.to_string_lossy()))
                    == Some(true)
        })
        .map(|entry| entry.into_path())
        .collect();

    let resolver = Resolver::new(index);
    let mut used = HashSet::new();
    let mut unmatched = vec![];
    let mut remapped = 0;
    let mut cancelled = false;

    for (done, file) in files.iter().enumerate() {
        if !progress(done, files.len()) {
            cancelled = true;
            break;
        }
        let path = CanonPath::from(file.as_path());
        let triplet = match resolver.resolve(path.as_str()) {
            Ok(Some(triplet)) => triplet,
            Ok(None) => {
                debug!("没有命中: {}", path);
                unmatched.push(path);
                continue;
            }
            Err(e) => {
                warn!("无法解析，按未命中处理: {}: {}", path, e);
                unmatched.push(path);
                continue;
            }
        };
        used.insert(triplet.image.clone());

        // <输出根>/<衍生库内的相对父目录>/<原始 base name>/
        let rel_parent =
            file.parent().and_then(|p| p.strip_prefix(source_root).ok()).unwrap_or(Path::new(""));
        let dest_dir = output_root.join(rel_parent).join(&triplet.base_name);
        if let Err(e) = fs::create_dir_all(&dest_dir) {
            warn!("无法创建输出目录，跳过: {}: {}", dest_dir.display(), e);
            continue;
        }
        for member in triplet.members() {
            let Some(name) = member.file_name() else { continue };
            if let Err(e) = fs::copy(member.as_path(), dest_dir.join(name)) {
                warn!("复制失败: {}: {}", member, e);
            }
        }
        info!("重映射: {} -> {}", path, triplet.base_name);
        remapped += 1;
    }

    // 两份完整性报告都是对已记录用量做集合差，不重新计算指纹
    let mut unused: Vec<_> = index.images().filter(|p| !used.contains(*p)).cloned().collect();
    unused.sort();

    Ok(RemapSummary { remapped, unmatched, unused, cancelled })
}

/// 把报告写成纯文本，每行一个路径
pub fn write_report(path: &Path, entries: &[CanonPath]) -> Result<()> {
    let mut text = entries.iter().map(|p| p.as_str()).collect::<Vec<_>>().join("\n");
    if !text.is_empty() {
        text.push('\n');
    }
    fs::write(path, text).with_context(|| format!("无法写入报告: {}", path.display()))
}

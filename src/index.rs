use std::collections::{BTreeMap, HashMap};

use log::{info, warn};

use crate::canon::CanonPath;
use crate::fingerprint;

/// 原始库清单：文件夹路径 -> 期望的图片文件名列表
///
/// 由外部盘点流程生成，这里按原样消费，不自行扫描目录。
/// BTreeMap 使构建顺序只取决于清单内容，与文件系统无关。
pub type CorpusInventory = BTreeMap<String, Vec<String>>;

/// 原始采集的三联档：像素图片、结构化元数据、设备 sidecar
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginalTriplet {
    pub image: CanonPath,
    pub metadata: CanonPath,
    pub sidecar: CanonPath,
    pub base_name: String,
}

impl OriginalTriplet {
    /// 三联档的全部成员，按 图片/元数据/sidecar 顺序
    pub fn members(&self) -> [&CanonPath; 3] {
        [&self.image, &self.metadata, &self.sidecar]
    }
}

/// 内容指纹到原始三联档的索引，构建一次后只读
pub struct HashIndex {
    entries: HashMap<[u8; 32], OriginalTriplet>,
}

impl HashIndex {
    /// 按清单构建指纹索引
    ///
    /// 清单中不存在的文件夹、三联档不完整或无法解码的条目一律
    /// 跳过并记录原因，绝不中断整个构建。指纹冲突时后写入者覆盖
    /// 先写入者，只记一条警告：重复内容本身就是需要被发现的信息。
    ///
    /// progress 在每个文件前调用，返回 false 时中止构建，
    /// 此时返回值的第二项为 true，索引只包含已处理的部分。
    pub fn build(
        inventory: &CorpusInventory,
        mut progress: impl FnMut(usize, usize) -> bool,
    ) -> (Self, bool) {
        let total: usize = inventory.values().map(|v| v.len()).sum();
        let mut done = 0;
        let mut entries: HashMap<[u8; 32], OriginalTriplet> = HashMap::new();
        let mut cancelled = false;

        'outer: for (folder, files) in inventory {
            let folder = CanonPath::new(folder);
            if !folder.as_path().is_dir() {
                warn!("文件夹不存在，跳过: {}", folder);
                done += files.len();
                continue;
            }
            for file in files {
                if !progress(done, total) {
                    cancelled = true;
                    break 'outer;
                }
                done += 1;

                let image = folder.join(file);
                if !image.as_path().is_file() {
                    warn!("图片不存在，跳过: {}", image);
                    continue;
                }
                let Some(base_name) =
                    image.as_path().file_stem().and_then(|s| s.to_str()).map(str::to_owned)
                else {
                    warn!("无法识别的文件名，跳过: {}", image);
                    continue;
                };
                let metadata = folder.join(format!("{base_name}.json"));
                if !metadata.as_path().is_file() {
                    warn!("三联档不完整，缺少元数据，跳过: {}", metadata);
                    continue;
                }
                let Some(sidecar) = find_sidecar(&folder, &base_name) else {
                    warn!("三联档不完整，缺少设备 sidecar，跳过: {}", image);
                    continue;
                };

                let digest = match fingerprint::fingerprint_file(image.as_str()) {
                    Ok(digest) => digest,
                    Err(e) => {
                        warn!("无法计算指纹，跳过: {}: {}", image, e);
                        continue;
                    }
                };

                let triplet = OriginalTriplet { image, metadata, sidecar, base_name };
                if let Some(old) = entries.insert(*digest.as_bytes(), triplet) {
                    warn!("指纹冲突，{} 被新条目覆盖", old.image);
                }
            }
        }

        info!("索引构建完成，共 {} 张原始图片", entries.len());
        (Self { entries }, cancelled)
    }

    pub fn get(&self, digest: &blake3::Hash) -> Option<&OriginalTriplet> {
        self.entries.get(digest.as_bytes())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 所有已索引的原始图片路径
    pub fn images(&self) -> impl Iterator<Item = &CanonPath> {
        self.entries.values().map(|t| &t.image)
    }
}

/// 设备 sidecar 存在两种命名约定，按固定顺序尝试
fn find_sidecar(folder: &CanonPath, base_name: &str) -> Option<CanonPath> {
    for name in [format!("{base_name}_anon.dcm"), format!("{base_name}.dcm")] {
        let path = folder.join(&name);
        if path.as_path().is_file() {
            return Some(path);
        }
    }
    None
}

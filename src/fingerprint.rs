use anyhow::Result;
use opencv::core::Mat;
use opencv::prelude::*;

use crate::utils;

/// 计算图片的内容指纹
///
/// 指纹只取决于解码后的像素，与容器格式无关：同一张图无损转存为
/// 其他格式后指纹不变。解码统一为 BGR 三通道，宽高和通道数一并
/// 参与摘要，避免不同尺寸的图片因字节序列相同而混淆。
pub fn fingerprint_file(filename: &str) -> Result<blake3::Hash> {
    let image = utils::imread_color(filename)?;
    fingerprint_mat(&image)
}

/// 对已解码的像素矩阵计算内容指纹
pub fn fingerprint_mat(image: &Mat) -> Result<blake3::Hash> {
    let owned;
    let image = if image.is_continuous() {
        image
    } else {
        owned = image.try_clone()?;
        &owned
    };
    let mut hasher = blake3::Hasher::new();
    hasher.update(&image.cols().to_le_bytes());
    hasher.update(&image.rows().to_le_bytes());
    hasher.update(&image.channels().to_le_bytes());
    hasher.update(image.data_bytes()?);
    Ok(hasher.finalize())
}

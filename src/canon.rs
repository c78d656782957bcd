use std::fmt;
use std::path::Path;

use serde::Serialize;

/// 规范化后的路径
///
/// 原始数据来自不同系统，路径分隔符和结尾斜杠并不统一，
/// 直接用字符串做 map key 会导致同一文件出现多个身份。
/// 所有进入核心的路径都先转换为 `CanonPath`，相等性只看规范形式。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CanonPath(String);

impl CanonPath {
    pub fn new(path: impl AsRef<str>) -> Self {
        let mut s = path.as_ref().replace('\\', "/");
        while s.contains("//") {
            s = s.replace("//", "/");
        }
        // 保留根路径 "/"
        while s.len() > 1 && s.ends_with('/') {
            s.pop();
        }
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }

    /// 路径最后一段的文件名
    pub fn file_name(&self) -> Option<&str> {
        self.as_path().file_name().and_then(|s| s.to_str())
    }

    /// 拼接子路径，结果同样是规范形式
    pub fn join(&self, child: impl AsRef<str>) -> Self {
        Self::new(format!("{}/{}", self.0, child.as_ref()))
    }
}

impl fmt::Display for CanonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&Path> for CanonPath {
    fn from(path: &Path) -> Self {
        Self::new(path.to_string_lossy())
    }
}

use clap::{Parser, Subcommand, ValueEnum};

use crate::cli::*;

#[derive(Parser, Debug, Clone)]
pub struct OrbOptions {
    /// ORB 特征点最大保留数量
    #[arg(short = 'n', value_name = "N", long, default_value_t = 1200)]
    pub orb_nfeatures: u32,
    /// ORB 特征金字塔缩放因子
    #[arg(long, value_name = "SCALE", default_value_t = 1.2)]
    pub orb_scale_factor: f32,
    /// ORB 特征金字塔层数
    #[arg(long, value_name = "N", default_value_t = 8)]
    pub orb_nlevels: u32,
    /// ORB 边缘忽略宽度
    #[arg(long, value_name = "N", default_value_t = 15)]
    pub orb_edge_threshold: u32,
    /// ORB FAST 角点检测阈值
    #[arg(long, value_name = "THRESHOLD", default_value_t = 5)]
    pub orb_fast_threshold: u32,
    /// 提取特征前图片最长边的上限，超过时等比缩小
    #[arg(short = 'S', long, value_name = "SIDE", default_value_t = 900)]
    pub max_side: u32,
}

#[derive(Parser, Debug, Clone)]
pub struct MatchOptions {
    /// 比例检验阈值，最近距离小于次近距离的该倍数才保留匹配
    #[arg(long, value_name = "RATIO", default_value_t = 0.75)]
    pub ratio: f32,
    /// 尝试拟合几何变换所需的最少有效匹配数
    #[arg(long, value_name = "N", default_value_t = 8)]
    pub min_matches: usize,
    /// RANSAC 内点判定的像素阈值
    #[arg(long, value_name = "PX", default_value_t = 5.0)]
    pub ransac_threshold: f64,
    /// 候选配对的最低内点数，低于该值的配对被丢弃
    #[arg(long, value_name = "N", default_value_t = 15)]
    pub min_inliers: i32,
    /// 提交的配对数量上限
    #[arg(long, value_name = "N", default_value_t = 100)]
    pub max_results: usize,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "usmatch", version)]
pub struct Opts {
    #[command(subcommand)]
    pub subcmd: SubCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubCommand {
    /// 构建原始库指纹索引，并将衍生图片库重映射回原始三联档
    Remap(RemapCommand),
    /// 在同一受检者的图片池内发现 raw/ground truth 配对
    Pair(PairCommand),
    /// 将一张查询图片与图片池逐一比对并按相似度排序
    Similar(SimilarCommand),
    /// 绘制两张图片间的特征匹配，便于人工检查
    Show(ShowCommand),
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum OutputFormat {
    Json,
    Table,
}

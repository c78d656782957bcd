use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::Result;
use opencv::core::{self, Mat, Point, Rect, Scalar};
use opencv::imgproc;
use opencv::prelude::*;
use rstest::*;
use tempfile::TempDir;
use usmatch::canon::CanonPath;
use usmatch::config::{MatchOptions, OrbOptions};
use usmatch::index::{CorpusInventory, HashIndex};
use usmatch::orb::OrbDetector;
use usmatch::remap::{Resolver, remap_corpus};
use usmatch::roles::ImageTraits;
use usmatch::score::score_pair;
use usmatch::{assign, fingerprint, utils};

fn default_orb() -> OrbOptions {
    use clap::Parser;
    OrbOptions::parse_from(["test"])
}

fn default_match() -> MatchOptions {
    use clap::Parser;
    MatchOptions::parse_from(["test"])
}

/// 生成一张带确定性纹理的图片，保证能提取出足够的 ORB 特征
fn textured_image(width: i32, height: i32, seed: u64) -> Result<Mat> {
    let mut img =
        Mat::new_rows_cols_with_default(height, width, core::CV_8UC3, Scalar::all(30.0))?;
    let mut state = seed;
    let mut next = move || {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (state >> 33) as i32
    };
    for _ in 0..150 {
        let x = next().rem_euclid(width);
        let y = next().rem_euclid(height);
        let r = 3 + next().rem_euclid(12);
        let c = 60 + next().rem_euclid(196);
        imgproc::circle(
            &mut img,
            Point::new(x, y),
            r,
            Scalar::all(c as f64),
            -1,
            imgproc::LINE_8,
            0,
        )?;
    }
    Ok(img)
}

/// 生成一张纯色图片，没有任何可用特征
fn flat_image(width: i32, height: i32, value: f64) -> Result<Mat> {
    Ok(Mat::new_rows_cols_with_default(height, width, core::CV_8UC3, Scalar::all(value))?)
}

fn write_image(dir: &Path, name: &str, img: &Mat) -> Result<String> {
    let path = dir.join(name);
    utils::imwrite(path.to_str().unwrap(), img)?;
    Ok(path.to_string_lossy().into_owned())
}

// ---------------------------------------------------------------- 指纹

#[test]
fn fingerprint_is_deterministic() -> Result<()> {
    let dir = TempDir::new()?;
    let img = textured_image(320, 240, 7)?;
    let path = write_image(dir.path(), "a.png", &img)?;

    assert_eq!(fingerprint::fingerprint_file(&path)?, fingerprint::fingerprint_file(&path)?);
    assert_eq!(fingerprint::fingerprint_mat(&img)?, fingerprint::fingerprint_mat(&img)?);
    Ok(())
}

#[test]
fn fingerprint_ignores_container_format() -> Result<()> {
    let dir = TempDir::new()?;
    let img = textured_image(320, 240, 7)?;
    // PNG 和 BMP 都是无损格式，解码后像素一致
    let png = write_image(dir.path(), "a.png", &img)?;
    let bmp = write_image(dir.path(), "a.bmp", &img)?;

    assert_eq!(fingerprint::fingerprint_file(&png)?, fingerprint::fingerprint_file(&bmp)?);
    Ok(())
}

#[test]
fn fingerprint_differs_for_different_content() -> Result<()> {
    let dir = TempDir::new()?;
    let a = write_image(dir.path(), "a.png", &textured_image(320, 240, 7)?)?;
    let b = write_image(dir.path(), "b.png", &textured_image(320, 240, 8)?)?;

    assert_ne!(fingerprint::fingerprint_file(&a)?, fingerprint::fingerprint_file(&b)?);
    Ok(())
}

// ---------------------------------------------------------------- 索引与重映射

/// 搭一个原始库：cap1 双 sidecar 命名，cap2 只有旧命名，cap3 三联档不完整
fn build_corpus(dir: &Path) -> Result<CorpusInventory> {
    fs::create_dir_all(dir)?;
    write_image(dir, "cap1.png", &textured_image(320, 240, 1)?)?;
    fs::write(dir.join("cap1.json"), "{}")?;
    fs::write(dir.join("cap1_anon.dcm"), b"dcm")?;
    fs::write(dir.join("cap1.dcm"), b"dcm-alt")?;

    write_image(dir, "cap2.png", &textured_image(320, 240, 2)?)?;
    fs::write(dir.join("cap2.json"), "{}")?;
    fs::write(dir.join("cap2.dcm"), b"dcm")?;

    // cap3 缺少元数据，应当被跳过
    write_image(dir, "cap3.png", &textured_image(320, 240, 3)?)?;
    fs::write(dir.join("cap3_anon.dcm"), b"dcm")?;

    let mut inventory = BTreeMap::new();
    inventory.insert(
        dir.to_string_lossy().into_owned(),
        vec!["cap1.png".to_string(), "cap2.png".to_string(), "cap3.png".to_string()],
    );
    Ok(inventory)
}

#[test]
fn index_skips_partial_triplets_and_prefers_anon_sidecar() -> Result<()> {
    let dir = TempDir::new()?;
    let inventory = build_corpus(dir.path())?;

    let (index, cancelled) = HashIndex::build(&inventory, |_, _| true);
    assert!(!cancelled);
    // cap3 三联档不完整，不应进入索引
    assert_eq!(index.len(), 2);

    let digest = fingerprint::fingerprint_file(dir.path().join("cap1.png").to_str().unwrap())?;
    let triplet = index.get(&digest).unwrap();
    assert_eq!(triplet.base_name, "cap1");
    // 两种 sidecar 都存在时优先 _anon 命名
    assert!(triplet.sidecar.as_str().ends_with("cap1_anon.dcm"));

    // cap2 只有旧命名，退回 <base>.dcm
    let digest = fingerprint::fingerprint_file(dir.path().join("cap2.png").to_str().unwrap())?;
    assert!(index.get(&digest).unwrap().sidecar.as_str().ends_with("cap2.dcm"));
    Ok(())
}

#[test]
fn index_skips_missing_folders() -> Result<()> {
    let mut inventory: CorpusInventory = BTreeMap::new();
    inventory.insert("/no/such/folder".to_string(), vec!["a.png".to_string()]);

    let (index, cancelled) = HashIndex::build(&inventory, |_, _| true);
    assert!(!cancelled);
    assert!(index.is_empty());
    Ok(())
}

#[test]
fn resolver_round_trips_unmodified_content() -> Result<()> {
    let dir = TempDir::new()?;
    let inventory = build_corpus(dir.path())?;
    let (index, _) = HashIndex::build(&inventory, |_, _| true);
    let resolver = Resolver::new(&index);

    // 同样的像素内容换一个文件名和容器格式，仍应解析回原三联档
    let copy_dir = TempDir::new()?;
    let img = utils::imread_color(dir.path().join("cap1.png").to_str().unwrap())?;
    let copy = write_image(copy_dir.path(), "derived_0001.bmp", &img)?;

    let triplet = resolver.resolve(&copy)?.unwrap();
    assert_eq!(triplet.base_name, "cap1");
    Ok(())
}

#[test]
fn resolver_reports_unknown_content_as_miss() -> Result<()> {
    let dir = TempDir::new()?;
    let inventory = build_corpus(dir.path())?;
    let (index, _) = HashIndex::build(&inventory, |_, _| true);
    let resolver = Resolver::new(&index);

    let other = TempDir::new()?;
    let unknown = write_image(other.path(), "unknown.png", &textured_image(320, 240, 99)?)?;
    assert!(resolver.resolve(&unknown)?.is_none());
    Ok(())
}

#[test]
fn remap_copies_triplets_and_writes_set_difference_reports() -> Result<()> {
    let corpus = TempDir::new()?;
    let inventory = build_corpus(corpus.path())?;
    let (index, _) = HashIndex::build(&inventory, |_, _| true);

    // 衍生库：subject01 下一张 cap1 的改名拷贝和一张未知图片
    let deriv = TempDir::new()?;
    let subject = deriv.path().join("subject01");
    fs::create_dir_all(&subject)?;
    fs::copy(corpus.path().join("cap1.png"), subject.join("filtered_xyz.png"))?;
    write_image(&subject, "noise.png", &textured_image(320, 240, 77)?)?;

    let out = TempDir::new()?;
    let summary = remap_corpus(&index, deriv.path(), out.path(), "png", |_, _| true)?;

    assert!(!summary.cancelled);
    assert_eq!(summary.remapped, 1);
    // 输出布局：<输出根>/<相对父目录>/<原始 base name>/<三联档>
    let dest = out.path().join("subject01").join("cap1");
    assert!(dest.join("cap1.png").is_file());
    assert!(dest.join("cap1.json").is_file());
    assert!(dest.join("cap1_anon.dcm").is_file());

    // 报告是纯集合差：noise 未命中，cap2 未被认领
    assert_eq!(summary.unmatched.len(), 1);
    assert!(summary.unmatched[0].as_str().ends_with("noise.png"));
    assert_eq!(summary.unused.len(), 1);
    assert!(summary.unused[0].as_str().ends_with("cap2.png"));
    Ok(())
}

#[test]
fn remap_fails_early_on_missing_source_root() -> Result<()> {
    let corpus = TempDir::new()?;
    let inventory = build_corpus(corpus.path())?;
    let (index, _) = HashIndex::build(&inventory, |_, _| true);

    let out = TempDir::new()?;
    let missing = out.path().join("does_not_exist");
    assert!(remap_corpus(&index, &missing, out.path(), "png", |_, _| true).is_err());
    Ok(())
}

#[test]
fn index_build_can_be_cancelled() -> Result<()> {
    let dir = TempDir::new()?;
    let inventory = build_corpus(dir.path())?;

    let (index, cancelled) = HashIndex::build(&inventory, |done, _| done < 1);
    assert!(cancelled);
    assert!(index.len() <= 1);
    Ok(())
}

// ---------------------------------------------------------------- 配对评分

#[test]
fn score_is_symmetric_and_high_for_cropped_variant() -> Result<()> {
    let img = textured_image(640, 480, 11)?;
    let crop = Mat::roi(&img, Rect::new(40, 30, 560, 420))?.try_clone()?;

    let mut orb = OrbDetector::create(default_orb())?;
    let a = orb.detect_image(img)?;
    let b = orb.detect_image(crop)?;

    let opts = default_match();
    let ab = score_pair(&a, &b, &opts)?;
    let ba = score_pair(&b, &a, &opts)?;
    assert_eq!(ab, ba);
    assert!(ab >= opts.min_inliers, "裁剪图与原图应当是强几何匹配，实际评分 {ab}");
    Ok(())
}

#[rstest]
#[case::flat(0)]
#[case::textured(1)]
fn unrelated_images_score_below_threshold(#[case] kind: u32) -> Result<()> {
    let mut orb = OrbDetector::create(default_orb())?;
    let a = orb.detect_image(textured_image(640, 480, 21)?)?;
    let other = match kind {
        0 => flat_image(640, 480, 128.0)?,
        _ => textured_image(640, 480, 22)?,
    };
    let b = orb.detect_image(other)?;

    let opts = default_match();
    assert!(score_pair(&a, &b, &opts)? < opts.min_inliers);
    Ok(())
}

// ---------------------------------------------------------------- 角色特征

#[test]
fn yellow_annotation_count_is_exact() -> Result<()> {
    let mut img = flat_image(200, 100, 30.0)?;
    // BGR (0, 255, 255) 即标注用的纯黄
    imgproc::rectangle(
        &mut img,
        Rect::new(10, 10, 40, 20),
        Scalar::new(0.0, 255.0, 255.0, 0.0),
        -1,
        imgproc::LINE_8,
        0,
    )?;

    let traits = ImageTraits::measure(&img, &CanonPath::new("study/a.png"))?;
    assert_eq!(traits.yellow, 40 * 20);
    assert_eq!(traits.area, 200 * 100);
    assert!(!traits.name_hint);
    Ok(())
}

#[test]
fn flat_gray_image_has_no_yellow() -> Result<()> {
    let img = flat_image(200, 100, 128.0)?;
    let traits = ImageTraits::measure(&img, &CanonPath::new("study/a.png"))?;
    assert_eq!(traits.yellow, 0);
    Ok(())
}

// ---------------------------------------------------------------- 端到端赋值

#[test]
fn pool_of_four_yields_exactly_one_correspondence() -> Result<()> {
    let dir = TempDir::new()?;
    let img = textured_image(640, 480, 31)?;
    let crop = Mat::roi(&img, Rect::new(40, 30, 560, 420))?.try_clone()?;

    let p1 = write_image(dir.path(), "image1.png", &img)?;
    let p2 = write_image(dir.path(), "image2.png", &crop)?;
    write_image(dir.path(), "image3.png", &flat_image(640, 480, 40.0)?)?;
    write_image(dir.path(), "image4.png", &flat_image(640, 480, 200.0)?)?;

    let paths: Vec<_> = ["image1.png", "image2.png", "image3.png", "image4.png"]
        .iter()
        .map(|n| CanonPath::from(dir.path().join(n).as_path()))
        .collect();

    let mut orb = OrbDetector::create(default_orb())?;
    let (pool, _) = assign::build_pool(&paths, &mut orb, |_, _| true);
    assert_eq!(pool.len(), 4);

    let result = assign::assign(&pool, &default_match(), |_, _| true);
    assert!(!result.cancelled);
    assert_eq!(result.matches.len(), 1);

    let m = &result.matches[0];
    assert!(m.score >= 15);
    // 裁剪图面积更小，应判为 ground truth
    assert_eq!(m.raw.as_str(), CanonPath::new(&p1).as_str());
    assert_eq!(m.ground_truth.as_str(), CanonPath::new(&p2).as_str());
    Ok(())
}

#[test]
fn yellow_annotated_variant_is_classified_as_ground_truth() -> Result<()> {
    let dir = TempDir::new()?;
    let img = textured_image(640, 480, 41)?;
    let mut annotated = img.try_clone()?;
    // 同尺寸副本叠加少量黄色标注，黄色规则先于面积规则生效
    imgproc::circle(
        &mut annotated,
        Point::new(320, 240),
        12,
        Scalar::new(0.0, 255.0, 255.0, 0.0),
        2,
        imgproc::LINE_8,
        0,
    )?;

    write_image(dir.path(), "a_scan.png", &img)?;
    let p2 = write_image(dir.path(), "b_scan.png", &annotated)?;

    let paths = vec![
        CanonPath::from(dir.path().join("a_scan.png").as_path()),
        CanonPath::from(dir.path().join("b_scan.png").as_path()),
    ];
    let mut orb = OrbDetector::create(default_orb())?;
    let (pool, _) = assign::build_pool(&paths, &mut orb, |_, _| true);

    let result = assign::assign(&pool, &default_match(), |_, _| true);
    assert_eq!(result.matches.len(), 1);
    assert_eq!(result.matches[0].ground_truth.as_str(), CanonPath::new(&p2).as_str());
    Ok(())
}

#[test]
fn identical_images_fall_back_to_lexicographic_order_reproducibly() -> Result<()> {
    let dir = TempDir::new()?;
    let img = textured_image(640, 480, 51)?;
    // 两份完全相同的内容：同面积、无黄色、文件名无提示，只能靠字典序
    write_image(dir.path(), "scan_b.png", &img)?;
    write_image(dir.path(), "scan_a.png", &img)?;

    let paths = vec![
        CanonPath::from(dir.path().join("scan_a.png").as_path()),
        CanonPath::from(dir.path().join("scan_b.png").as_path()),
    ];
    let mut orb = OrbDetector::create(default_orb())?;
    let (pool, _) = assign::build_pool(&paths, &mut orb, |_, _| true);

    let first = assign::assign(&pool, &default_match(), |_, _| true);
    let second = assign::assign(&pool, &default_match(), |_, _| true);

    assert_eq!(first.matches, second.matches);
    assert_eq!(first.matches.len(), 1);
    assert!(first.matches[0].raw.as_str().ends_with("scan_a.png"));
    assert!(first.matches[0].ground_truth.as_str().ends_with("scan_b.png"));
    Ok(())
}

#[test]
fn assign_can_be_cancelled_between_pairs() -> Result<()> {
    let dir = TempDir::new()?;
    let img = textured_image(320, 240, 61)?;
    for name in ["a.png", "b.png", "c.png"] {
        write_image(dir.path(), name, &img)?;
    }
    let paths: Vec<_> = ["a.png", "b.png", "c.png"]
        .iter()
        .map(|n| CanonPath::from(dir.path().join(n).as_path()))
        .collect();

    let mut orb = OrbDetector::create(default_orb())?;
    let (pool, _) = assign::build_pool(&paths, &mut orb, |_, _| true);

    let result = assign::assign(&pool, &default_match(), |done, _| done < 1);
    assert!(result.cancelled);
    Ok(())
}

#[test]
fn rank_against_orders_pool_by_similarity() -> Result<()> {
    let dir = TempDir::new()?;
    let img = textured_image(640, 480, 71)?;
    let crop = Mat::roi(&img, Rect::new(20, 20, 600, 440))?.try_clone()?;

    let query = write_image(dir.path(), "query.png", &img)?;
    write_image(dir.path(), "match.png", &crop)?;
    write_image(dir.path(), "noise.png", &textured_image(640, 480, 72)?)?;

    let mut orb = OrbDetector::create(default_orb())?;
    let (pool, _) = assign::build_pool(
        &[
            CanonPath::new(&query),
            CanonPath::from(dir.path().join("match.png").as_path()),
            CanonPath::from(dir.path().join("noise.png").as_path()),
        ],
        &mut orb,
        |_, _| true,
    );

    let (ranked, cancelled) =
        assign::rank_against(&pool[0], &pool, &default_match(), |_, _| true);
    assert!(!cancelled);
    // 查询图自身被跳过，噪声图低于阈值，只剩裁剪图
    assert_eq!(ranked.len(), 1);
    assert!(ranked[0].0.as_str().ends_with("match.png"));
    Ok(())
}

use anyhow::{Result, ensure};
use opencv::core::{self, DMatch, KeyPoint, Mat, Scalar, Vector};
use opencv::features2d;
use opencv::prelude::*;
use opencv::{imgcodecs, imgproc};

/// 以灰度模式读取图片，最长边超过 max_side 时等比缩小
pub fn imread_gray(filename: &str, max_side: i32) -> Result<Mat> {
    let img = imgcodecs::imread(filename, imgcodecs::IMREAD_GRAYSCALE)?;
    ensure!(!img.empty(), "无法解码图片: {}", filename);
    adjust_image_size(img, max_side)
}

/// 以彩色模式读取图片，统一为 BGR 三通道
pub fn imread_color(filename: &str) -> Result<Mat> {
    let img = imgcodecs::imread(filename, imgcodecs::IMREAD_COLOR)?;
    ensure!(!img.empty(), "无法解码图片: {}", filename);
    Ok(img)
}

/// 最长边超过 max_side 时按 INTER_AREA 等比缩小，否则原样返回
///
/// 只是性能上的限制，不影响匹配的正确性。
pub fn adjust_image_size(img: Mat, max_side: i32) -> Result<Mat> {
    let side = img.cols().max(img.rows());
    if side <= max_side {
        return Ok(img);
    }
    let scale = max_side as f64 / side as f64;
    let mut output = Mat::default();
    imgproc::resize(
        &img,
        &mut output,
        core::Size::default(),
        scale,
        scale,
        imgproc::InterpolationFlags::INTER_AREA as i32,
    )?;
    Ok(output)
}

pub fn detect_and_compute(
    orb: &mut opencv::core::Ptr<features2d::ORB>,
    image: &Mat,
) -> Result<(Vector<KeyPoint>, Mat)> {
    let mask = Mat::default();
    let mut kps = Vector::<KeyPoint>::new();
    let mut des = Mat::default();
    orb.detect_and_compute(image, &mask, &mut kps, &mut des, false)?;
    Ok((kps, des))
}

pub fn imwrite(filename: &str, img: &Mat) -> Result<()> {
    let flags = Vector::<i32>::new();
    let ok = imgcodecs::imwrite(filename, img, &flags)?;
    ensure!(ok, "无法写入图片: {}", filename);
    Ok(())
}

pub fn draw_matches(
    img1: &Mat,
    keypoints1: &Vector<KeyPoint>,
    img2: &Mat,
    keypoints2: &Vector<KeyPoint>,
    matches1to2: &Vector<DMatch>,
) -> Result<Mat> {
    let mut output = Mat::default();
    features2d::draw_matches(
        img1,
        keypoints1,
        img2,
        keypoints2,
        matches1to2,
        &mut output,
        Scalar::from((0., 255., 0.)),
        Scalar::from((255., 0., 0.)),
        &Vector::<i8>::new(),
        features2d::DrawMatchesFlags::DEFAULT,
    )?;
    Ok(output)
}

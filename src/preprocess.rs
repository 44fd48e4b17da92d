// 该文件是 Letterbox （信封填充） 项目的一部分。
// src/preprocess.rs - 图像前处理
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use image::{Rgb, RgbImage, imageops};
use tracing::{debug, error};

use crate::{
  error::{PipelineError, Result},
  frame::{BGR_CHANNELS, BgrImage, RgbNchwTensor},
  model::BBox,
  tensor::ElementType,
};

pub const INPUT_C: usize = 3;
pub const INPUT_W: u32 = 640;
pub const INPUT_H: u32 = 640;
pub const PAD_VALUE: u8 = 128;

/// 检测模型的输入张量 3x640x640
pub type YoloInputTensor = RgbNchwTensor<INPUT_W, INPUT_H>;

/// 保持宽高比的缩放 + 填充几何
///
/// 前向变换与逆变换共用同一个值，保证两者使用完全相同的缩放系数与偏移。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
  /// 约束轴上的缩放系数
  pub scale: f32,
  pub scaled_w: u32,
  pub scaled_h: u32,
  pub pad_x: u32,
  pub pad_y: u32,
}

impl Letterbox {
  /// 把 img_w x img_h 的图像放进 640x640 的画布
  pub fn fit(img_w: u32, img_h: u32) -> Self {
    Self::fit_into(img_w, img_h, INPUT_W, INPUT_H)
  }

  /// 调用者保证 img_w、img_h 都大于 0
  pub fn fit_into(img_w: u32, img_h: u32, dst_w: u32, dst_h: u32) -> Self {
    let r_w = dst_w as f32 / img_w as f32;
    let r_h = dst_h as f32 / img_h as f32;

    if r_h > r_w {
      // 宽度是约束轴
      let scaled_h = ((r_w * img_h as f32).round() as u32).clamp(1, dst_h);
      Self {
        scale: r_w,
        scaled_w: dst_w,
        scaled_h,
        pad_x: 0,
        pad_y: (dst_h - scaled_h) / 2,
      }
    } else {
      let scaled_w = ((r_h * img_w as f32).round() as u32).clamp(1, dst_w);
      Self {
        scale: r_h,
        scaled_w,
        scaled_h: dst_h,
        pad_x: (dst_w - scaled_w) / 2,
        pad_y: 0,
      }
    }
  }

  /// 原图坐标 -> 前处理后坐标
  pub fn forward(&self, bbox: &BBox) -> BBox {
    let (px, py) = (self.pad_x as f32, self.pad_y as f32);
    BBox {
      left: bbox.left * self.scale + px,
      top: bbox.top * self.scale + py,
      right: bbox.right * self.scale + px,
      bottom: bbox.bottom * self.scale + py,
    }
  }

  /// 前处理空间里的 (cx, cy, w, h) -> 原图坐标
  pub fn inverse(&self, cx: f32, cy: f32, w: f32, h: f32) -> BBox {
    let (px, py) = (self.pad_x as f32, self.pad_y as f32);
    BBox {
      left: (cx - w / 2.0 - px) / self.scale,
      top: (cy - h / 2.0 - py) / self.scale,
      right: (cx + w / 2.0 - px) / self.scale,
      bottom: (cy + h / 2.0 - py) / self.scale,
    }
  }
}

/// 检测模型前处理：letterbox 缩放、BGR 转 RGB、归一化到 [0, 1]、按平面打包
pub fn preprocess_letterbox(image: &BgrImage) -> Result<YoloInputTensor> {
  if image.is_empty() {
    error!("输入图像为空");
    return Err(PipelineError::empty("输入图像为空"));
  }

  let (img_w, img_h) = image.dimensions();
  let letterbox = Letterbox::fit(img_w, img_h);
  debug!(
    "letterbox: {}x{} -> {}x{}, 偏移 ({}, {}), 缩放 {:.4}",
    img_w,
    img_h,
    letterbox.scaled_w,
    letterbox.scaled_h,
    letterbox.pad_x,
    letterbox.pad_y,
    letterbox.scale
  );

  let rgb = image.to_rgb_image();
  let resized = imageops::resize(
    &rgb,
    letterbox.scaled_w,
    letterbox.scaled_h,
    imageops::FilterType::CatmullRom,
  );

  let mut canvas = RgbImage::from_pixel(INPUT_W, INPUT_H, Rgb([PAD_VALUE; 3]));
  imageops::replace(
    &mut canvas,
    &resized,
    letterbox.pad_x as i64,
    letterbox.pad_y as i64,
  );

  let mut data = Vec::with_capacity(YoloInputTensor::BYTE_SIZE);
  for c in 0..INPUT_C {
    for px in canvas.pixels() {
      let value = px[c] as f32 / 255.0;
      data.extend_from_slice(&value.to_ne_bytes());
    }
  }

  YoloInputTensor::try_from(data).inspect_err(|e| error!("打包通道失败: {}", e))
}

/// 分类模型前处理：直接缩放到模型输入尺寸，保持通道顺序，NHWC 排列，
/// 按模型声明的元素类型转换（不做归一化）
pub fn preprocess_resize(
  image: &BgrImage,
  width: u32,
  height: u32,
  element_type: ElementType,
) -> Result<Vec<u8>> {
  if image.is_empty() {
    error!("输入图像为空");
    return Err(PipelineError::empty("输入图像为空"));
  }
  if width == 0 || height == 0 {
    return Err(PipelineError::shape("模型输入尺寸必须大于 0"));
  }

  let resized = imageops::resize(
    &image.to_raw_buffer(),
    width,
    height,
    imageops::FilterType::Triangle,
  );

  let expected = width as usize * height as usize * BGR_CHANNELS * element_type.size();
  let mut data = Vec::with_capacity(expected);
  for &v in resized.as_raw() {
    encode_element(&mut data, v, element_type);
  }

  if data.len() != expected {
    error!("意外的通道总大小 {}, 期望 {}", data.len(), expected);
    return Err(PipelineError::InternalSizeMismatch {
      expected,
      actual: data.len(),
    });
  }
  Ok(data)
}

fn encode_element(buf: &mut Vec<u8>, v: u8, element_type: ElementType) {
  match element_type {
    ElementType::U8 => buf.push(v),
    ElementType::I8 => buf.push(v.min(i8::MAX as u8)),
    ElementType::I32 => buf.extend_from_slice(&(v as i32).to_ne_bytes()),
    ElementType::I64 => buf.extend_from_slice(&(v as i64).to_ne_bytes()),
    ElementType::F32 => buf.extend_from_slice(&(v as f32).to_ne_bytes()),
    ElementType::F64 => buf.extend_from_slice(&(v as f64).to_ne_bytes()),
  }
}

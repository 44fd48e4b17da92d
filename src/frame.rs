// 该文件是 Letterbox （信封填充） 项目的一部分。
// src/frame.rs - 输入图像与 NCHW 张量定义
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

use image::RgbImage;

use crate::error::{PipelineError, Result};

pub const BGR_CHANNELS: usize = 3;
const F32_SIZE: usize = std::mem::size_of::<f32>();

/// 交错存储的 BGR 图像，由外部图像解码器产生
#[derive(Debug, Clone)]
pub struct BgrImage {
  width: u32,
  height: u32,
  data: Box<[u8]>,
}

impl BgrImage {
  pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
    if width == 0 || height == 0 {
      return Err(PipelineError::empty("图像宽高必须大于 0"));
    }
    let expected = BGR_CHANNELS * width as usize * height as usize;
    if data.len() != expected {
      return Err(PipelineError::UnsupportedInputShape(format!(
        "数据长度不匹配: 期望长度 {}, 实际长度 {}",
        expected,
        data.len()
      )));
    }
    Ok(Self {
      width,
      height,
      data: data.into_boxed_slice(),
    })
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn dimensions(&self) -> (u32, u32) {
    (self.width, self.height)
  }

  pub fn channels(&self) -> usize {
    BGR_CHANNELS
  }

  pub fn is_empty(&self) -> bool {
    self.width == 0 || self.height == 0
  }

  pub fn as_bgr(&self) -> &[u8] {
    &self.data
  }

  /// 交换 B/R 通道，得到 RGB 图像
  pub fn to_rgb_image(&self) -> RgbImage {
    let mut rgb = Vec::with_capacity(self.data.len());
    for px in self.data.chunks_exact(BGR_CHANNELS) {
      rgb.extend_from_slice(&[px[2], px[1], px[0]]);
    }
    // 长度在构造时已经校验过
    RgbImage::from_raw(self.width, self.height, rgb).unwrap_or_default()
  }

  /// 保持 BGR 顺序，按 image 的三通道缓冲区返回（不做通道交换）
  pub(crate) fn to_raw_buffer(&self) -> RgbImage {
    RgbImage::from_raw(self.width, self.height, self.data.to_vec()).unwrap_or_default()
  }
}

impl From<&RgbImage> for BgrImage {
  fn from(image: &RgbImage) -> Self {
    let (width, height) = image.dimensions();
    let mut data = Vec::with_capacity(image.as_raw().len());
    for px in image.pixels() {
      data.extend_from_slice(&[px[2], px[1], px[0]]);
    }
    Self {
      width,
      height,
      data: data.into_boxed_slice(),
    }
  }
}

impl From<RgbImage> for BgrImage {
  fn from(image: RgbImage) -> Self {
    BgrImage::from(&image)
  }
}

/// 平面 (通道优先) 存储的 RGB float32 张量，按字节打包
///
/// 内存顺序为 R 平面、G 平面、B 平面，每个平面按行优先排列。
#[derive(Debug, Clone)]
pub struct RgbNchwTensor<const W: u32, const H: u32> {
  data: Box<[u8]>,
}

impl<const W: u32, const H: u32> RgbNchwTensor<W, H> {
  pub const BYTE_SIZE: usize = BGR_CHANNELS * W as usize * H as usize * F32_SIZE;

  pub fn height(&self) -> usize {
    H as usize
  }

  pub fn width(&self) -> usize {
    W as usize
  }

  pub fn channels(&self) -> usize {
    BGR_CHANNELS
  }

  pub fn byte_size(&self) -> usize {
    self.data.len()
  }

  pub fn as_bytes(&self) -> &[u8] {
    &self.data
  }

  pub fn into_bytes(self) -> Vec<u8> {
    self.data.into_vec()
  }

  /// 读取 (c, y, x) 处的值
  pub fn value(&self, c: usize, y: usize, x: usize) -> f32 {
    let index = (c * H as usize * W as usize + y * W as usize + x) * F32_SIZE;
    let mut bytes = [0u8; F32_SIZE];
    bytes.copy_from_slice(&self.data[index..index + F32_SIZE]);
    f32::from_ne_bytes(bytes)
  }
}

impl<const W: u32, const H: u32> TryFrom<Vec<u8>> for RgbNchwTensor<W, H> {
  type Error = PipelineError;

  fn try_from(data: Vec<u8>) -> Result<Self> {
    if data.len() != Self::BYTE_SIZE {
      return Err(PipelineError::InternalSizeMismatch {
        expected: Self::BYTE_SIZE,
        actual: data.len(),
      });
    }

    Ok(Self {
      data: data.into_boxed_slice(),
    })
  }
}

impl<const W: u32, const H: u32> AsRef<[u8]> for RgbNchwTensor<W, H> {
  fn as_ref(&self) -> &[u8] {
    &self.data
  }
}

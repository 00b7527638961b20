// 该文件是 Beifeng （北风） 项目的一部分。
// src/input/image_folder.rs - 图像目录输入
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

use std::path::{Path, PathBuf};

use image::{ImageReader, RgbImage};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, url_file_path};

const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "webp"];

#[derive(Error, Debug)]
pub enum ImageFolderInputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 按文件名顺序读取目录中的全部图像，`folder:///path/to/dir`
///
/// 无法解码的文件会被跳过。
pub struct ImageFolderInput {
  paths: std::vec::IntoIter<PathBuf>,
}

fn is_image(path: &Path) -> bool {
  path
    .extension()
    .and_then(|ext| ext.to_str())
    .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
    .unwrap_or(false)
}

impl FromUrlWithScheme for ImageFolderInput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for ImageFolderInput {
  type Error = ImageFolderInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ImageFolderInputError::SchemeMismatch);
    }

    let directory = url_file_path(url);
    let mut paths = std::fs::read_dir(&directory)?
      .map(|entry| entry.map(|e| e.path()))
      .collect::<Result<Vec<_>, _>>()?;
    paths.retain(|p| p.is_file() && is_image(p));
    paths.sort();
    debug!("目录 {} 中共 {} 张图像", directory.display(), paths.len());

    Ok(ImageFolderInput {
      paths: paths.into_iter(),
    })
  }
}

impl Iterator for ImageFolderInput {
  type Item = RgbImage;

  fn next(&mut self) -> Option<Self::Item> {
    for path in self.paths.by_ref() {
      match ImageReader::open(&path).map_err(image::ImageError::from).and_then(|r| r.decode()) {
        Ok(image) => {
          debug!("读取图像: {}", path.display());
          return Some(image.to_rgb8());
        }
        Err(e) => warn!("跳过无法读取的图像 {}: {}", path.display(), e),
      }
    }
    None
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  #[test]
  fn yields_images_in_name_order() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    RgbImage::from_pixel(2, 2, Rgb([2, 0, 0])).save(dir.path().join("b.png"))?;
    RgbImage::from_pixel(1, 1, Rgb([1, 0, 0])).save(dir.path().join("a.png"))?;
    std::fs::write(dir.path().join("notes.txt"), "not an image")?;
    std::fs::write(dir.path().join("broken.png"), "not a png either")?;

    let url = Url::parse(&format!("folder://{}", dir.path().display()))?;
    let images: Vec<RgbImage> = ImageFolderInput::from_url(&url)?.collect();

    assert_eq!(images.len(), 2);
    assert_eq!(images[0].get_pixel(0, 0)[0], 1);
    assert_eq!(images[1].dimensions(), (2, 2));
    Ok(())
  }

  #[test]
  fn missing_directory_is_io_error() {
    let url = Url::parse("folder:///definitely/not/here").unwrap();
    assert!(matches!(
      ImageFolderInput::from_url(&url),
      Err(ImageFolderInputError::IoError(_))
    ));
  }
}

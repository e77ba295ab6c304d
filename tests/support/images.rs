use std::path::{Path, PathBuf};

use image::{GrayImage, Luma};

/// Vertical bars `period` pixels wide, shifted by `phase`.
pub fn vertical_stripes(width: u32, height: u32, period: u32, phase: u32) -> GrayImage {
    GrayImage::from_fn(width, height, |x, _| stripe_pixel(x + phase, period))
}

/// Horizontal bars `period` pixels tall, shifted by `phase`.
pub fn horizontal_stripes(width: u32, height: u32, period: u32, phase: u32) -> GrayImage {
    GrayImage::from_fn(width, height, |_, y| stripe_pixel(y + phase, period))
}

fn stripe_pixel(position: u32, period: u32) -> Luma<u8> {
    if (position / period) % 2 == 0 {
        Luma([35])
    } else {
        Luma([215])
    }
}

pub fn save_png(dir: &Path, name: &str, image: &GrayImage) -> PathBuf {
    std::fs::create_dir_all(dir).expect("create image dir");
    let path = dir.join(name);
    image.save(&path).expect("save png");
    path
}

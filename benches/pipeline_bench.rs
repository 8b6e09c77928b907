//! Criterion benchmarks for the per-image hot paths: gutter search, crop
//! box search and the full layout analysis of a synthetic scan.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use image::{DynamicImage, GrayImage, Luma};

use spreadcrop::{
    analyze_image, detect_gutter_x, find_crop_bbox, CropOptions, PageImagesConfig, PageSide,
};

/// 2400x1600 spread: two bright pages, a dark gutter band and dark surround
fn synthetic_spread() -> GrayImage {
    let (width, height) = (2400u32, 1600u32);
    let mut img = GrayImage::from_pixel(width, height, Luma([25u8]));
    for y in 80..1520 {
        for x in 100..1150 {
            img.put_pixel(x, y, Luma([240u8]));
        }
        for x in 1250..2300 {
            img.put_pixel(x, y, Luma([240u8]));
        }
    }
    img
}

fn bench_gutter_search(c: &mut Criterion) {
    let gray = synthetic_spread();
    c.bench_function("detect_gutter_x (2400x1600)", |b| {
        b.iter(|| detect_gutter_x(black_box(&gray), 0.35, 2, 4));
    });
}

fn bench_crop_bbox(c: &mut Criterion) {
    let gray = synthetic_spread();
    let options = CropOptions::default();
    c.bench_function("find_crop_bbox (2400x1600)", |b| {
        b.iter(|| find_crop_bbox(black_box(&gray), &options, PageSide::Single));
    });
}

fn bench_analyze_image(c: &mut Criterion) {
    let image = DynamicImage::ImageLuma8(synthetic_spread());
    let config = PageImagesConfig::default();
    c.bench_function("analyze_image split (2400x1600)", |b| {
        b.iter(|| analyze_image(black_box(&image), &config));
    });
}

criterion_group!(benches, bench_gutter_search, bench_crop_bbox, bench_analyze_image);
criterion_main!(benches);

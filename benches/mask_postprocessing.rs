use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use image::{DynamicImage, GrayImage, ImageBuffer, Luma, Rgb};
use rmbg_server::{
    models::ModelKind,
    utils::{mask, ImagePreprocessor},
    SegmentationMask,
};

/// Soft elliptical blob with a noisy rim, shaped like a raw model prediction
fn synthetic_mask(width: u32, height: u32) -> GrayImage {
    let (cx, cy) = (width as f32 / 2.0, height as f32 / 2.0);
    ImageBuffer::from_fn(width, height, |x, y| {
        let dx = (x as f32 - cx) / (width as f32 * 0.35);
        let dy = (y as f32 - cy) / (height as f32 * 0.4);
        let distance = (dx * dx + dy * dy).sqrt();
        let noise = ((x * 31 + y * 17) % 23) as f32;
        let value = (1.2 - distance).clamp(0.0, 1.0) * 240.0 + noise;
        Luma([value.min(255.0) as u8])
    })
}

fn bench_mask_refinement(c: &mut Criterion) {
    let mut group = c.benchmark_group("mask_refinement");

    for (label, width, height) in [("model_320x320", 320, 320), ("photo_1280x960", 1280, 960)] {
        let input = synthetic_mask(width, height);

        group.bench_with_input(BenchmarkId::new("postprocess_mask", label), &input, |b, m| {
            b.iter(|| mask::postprocess_mask(black_box(m)));
        });
        group.bench_with_input(BenchmarkId::new("opening", label), &input, |b, m| {
            b.iter(|| mask::morphological_opening(black_box(m)));
        });
        group.bench_with_input(BenchmarkId::new("gaussian_blur", label), &input, |b, m| {
            b.iter(|| mask::gaussian_blur(black_box(m), mask::DEFAULT_BLUR_SIGMA));
        });
    }

    group.finish();
}

fn bench_cutout(c: &mut Criterion) {
    let mut group = c.benchmark_group("cutout");

    let (width, height) = (1280, 960);
    let photo = DynamicImage::ImageRgb8(ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 96])
    }));
    let model_mask = SegmentationMask::from_image(synthetic_mask(320, 320));

    group.bench_function("resize_mask_to_photo", |b| {
        b.iter(|| black_box(&model_mask).resize(width, height).unwrap());
    });

    let full_mask = model_mask.resize(width, height).unwrap();
    group.bench_function("apply_to_image", |b| {
        b.iter(|| full_mask.apply_to_image(black_box(&photo)).unwrap());
    });

    let preprocessing = ModelKind::U2net.preprocessing_config();
    group.bench_function("preprocess_for_inference", |b| {
        b.iter(|| {
            ImagePreprocessor::preprocess_for_inference(black_box(&photo), &preprocessing).unwrap()
        });
    });

    group.finish();
}

criterion_group!(benches, bench_mask_refinement, bench_cutout);
criterion_main!(benches);

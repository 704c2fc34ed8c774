use criterion::{black_box, criterion_group, criterion_main, Criterion};

use microid::codec;
use microid::image::{ImageRgb8, Rgb};
use microid::locate::ModuleLocator;
use microid::module_spec::ModuleTable;
use microid::pipeline::{DecodePipeline, PipelineConfig};
use microid::reader::ThresholdReader;
use microid::render::{render, RenderOptions};

fn bench_codec(c: &mut Criterion) {
    c.bench_function("encode", |b| b.iter(|| codec::encode(black_box(777_777))));
    let text = codec::encode(777_777).unwrap().to_string();
    c.bench_function("decode", |b| b.iter(|| codec::decode(black_box(&text))));
}

/// A rendered Micro-ID pasted onto a light module on a dark table.
fn photo(width: u32, height: u32) -> ImageRgb8 {
    let mut img = ImageRgb8::new(width, height, Rgb([25, 25, 25]));
    let side = width.min(height) * 8 / 10;
    let (x0, y0) = ((width - side) / 2, (height - side) / 2);
    for y in y0..y0 + side {
        for x in x0..x0 + side {
            img.set(x, y, Rgb([210, 210, 210]));
        }
    }
    let tag = render(123_456, &RenderOptions {
        cell_size: side / 20,
        show_gridlines: false,
        background: Rgb([210, 210, 210]),
        ..RenderOptions::default()
    })
    .unwrap();
    for y in 0..tag.height {
        for x in 0..tag.width {
            img.set(x0 + side / 5 + x, y0 + side / 2 + y, tag.get(x, y));
        }
    }
    img
}

fn bench_locate(c: &mut Criterion) {
    let img = photo(1024, 768);
    let locator = ModuleLocator::default();
    c.bench_function("locate_1024x768", |b| b.iter(|| locator.locate(black_box(&img))));
}

fn bench_pipeline(c: &mut Criterion) {
    let table = ModuleTable::builtin();
    let pipeline =
        DecodePipeline::new(&table, "SZ-04", ThresholdReader::default(), PipelineConfig::default())
            .unwrap();
    let img = photo(1024, 768);
    c.bench_function("pipeline_1024x768", |b| b.iter(|| pipeline.decode(black_box(&img))));
}

criterion_group!(benches, bench_codec, bench_locate, bench_pipeline);
criterion_main!(benches);

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pixelmind::{ByteImageCodec, ImageExtractor, PagePacker};

fn bench_codec(c: &mut Criterion) {
    let data: Vec<u8> = (0u8..=255).cycle().take(1024 * 1024).collect();
    let codec = ByteImageCodec::default();
    let image = codec.encode(&data).unwrap();

    c.bench_function("encode_1mb", |b| b.iter(|| codec.encode(black_box(&data))));
    c.bench_function("decode_1mb", |b| b.iter(|| codec.decode(black_box(&image.pixels))));
}

fn bench_document(c: &mut Criterion) {
    let codec = ByteImageCodec::default();
    let images: Vec<_> = (0..10)
        .map(|i| codec.encode(&vec![i as u8; 100 * 1024]).unwrap())
        .collect();
    let mut pdf = Vec::new();
    PagePacker::write_to(&images, &mut pdf).unwrap();

    c.bench_function("pack_10x100kb", |b| {
        b.iter(|| {
            let mut out = Vec::new();
            PagePacker::write_to(black_box(&images), &mut out).unwrap();
        })
    });
    c.bench_function("scan_10x100kb", |b| b.iter(|| ImageExtractor::scan_bytes(black_box(&pdf)).unwrap()));
}

criterion_group!(benches, bench_codec, bench_document);
criterion_main!(benches);

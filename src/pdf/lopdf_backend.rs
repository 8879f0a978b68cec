use std::io::Cursor;
use std::path::Path;

use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};
use log::debug;
use lopdf::{Dictionary, Document, Object, Stream};

use crate::pdf::Recompressor;

/// Recompressor backed by `lopdf` for the object model and `image` for JPEG.
///
/// Only 8-bit DeviceRGB and DeviceGray images stored as `DCTDecode` are
/// re-encoded, and only when the new encoding is smaller. Every other stream
/// is left to lopdf's flate compression.
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfRecompressor;

impl LopdfRecompressor {
    pub fn new() -> Self {
        Self
    }
}

impl Recompressor for LopdfRecompressor {
    fn recompress(&self, input: &Path, output: &Path, quality: u8) -> Result<()> {
        let mut doc = Document::load(input)
            .with_context(|| format!("Failed to load PDF {}", input.display()))?;

        let mut reencoded = 0;
        for object in doc.objects.values_mut() {
            if let Object::Stream(stream) = object {
                match reencode_image(stream, quality) {
                    Ok(true) => reencoded += 1,
                    Ok(false) => {}
                    Err(e) => debug!("Leaving image stream unchanged: {:#}", e),
                }
            }
        }
        debug!("Re-encoded {} image(s) at quality {}", reencoded, quality);

        doc.compress();
        doc.save(output)
            .with_context(|| format!("Failed to save PDF {}", output.display()))?;
        Ok(())
    }
}

fn name_is(dict: &Dictionary, key: &[u8], expected: &[u8]) -> bool {
    match dict.get(key) {
        Ok(Object::Name(name)) => name.as_slice() == expected,
        Ok(Object::Array(items)) if items.len() == 1 => {
            matches!(&items[0], Object::Name(name) if name.as_slice() == expected)
        }
        _ => false,
    }
}

/// Re-encode one JPEG image stream in place. `Ok(false)` when the stream is
/// not a supported image or the new encoding is not smaller.
fn reencode_image(stream: &mut Stream, quality: u8) -> Result<bool> {
    let dict = &stream.dict;
    if !name_is(dict, b"Subtype", b"Image") || !name_is(dict, b"Filter", b"DCTDecode") {
        return Ok(false);
    }

    let bits = dict.get(b"BitsPerComponent").and_then(Object::as_i64).unwrap_or(0);
    if bits != 8 {
        return Ok(false);
    }

    let gray = name_is(dict, b"ColorSpace", b"DeviceGray");
    if !gray && !name_is(dict, b"ColorSpace", b"DeviceRGB") {
        return Ok(false);
    }

    let decoded = image::load(Cursor::new(&stream.content), ImageFormat::Jpeg)
        .context("Failed to decode JPEG image")?;
    let image = if gray {
        DynamicImage::ImageLuma8(decoded.to_luma8())
    } else {
        DynamicImage::ImageRgb8(decoded.to_rgb8())
    };

    let mut encoded = Vec::new();
    image
        .write_with_encoder(JpegEncoder::new_with_quality(&mut encoded, quality))
        .context("Failed to encode JPEG image")?;

    if encoded.len() >= stream.content.len() {
        return Ok(false);
    }

    stream.set_content(encoded);
    Ok(true)
}

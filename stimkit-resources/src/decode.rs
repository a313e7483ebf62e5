use std::io::Cursor;
use std::sync::Arc;

use ab_glyph::FontArc;
use image::AnimationDecoder;
use image::codecs::gif::GifDecoder;

use crate::{AudioBuffer, Payload, ResourceError, ResourceKind, VideoClip, VideoFrame};

/// GIF frames with no delay are shown for this long, matching common viewers.
const DEFAULT_FRAME_MS: f64 = 100.0;

/// Decodes raw bytes into the payload for `kind`.
pub fn decode(kind: ResourceKind, bytes: &[u8]) -> Result<Payload, ResourceError> {
    match kind {
        ResourceKind::Image => decode_image(bytes),
        ResourceKind::Video => decode_video(bytes),
        ResourceKind::Audio => decode_audio(bytes),
        ResourceKind::Font => FontArc::try_from_vec(bytes.to_vec())
            .map(Payload::Font)
            .map_err(|e| ResourceError::decode(kind, e)),
        ResourceKind::Text => utf8(kind, bytes).map(Payload::Text),
        ResourceKind::Shader => utf8(kind, bytes).map(Payload::Shader),
        ResourceKind::Json => serde_json::from_slice(bytes)
            .map(|v| Payload::Json(Arc::new(v)))
            .map_err(|e| ResourceError::decode(kind, e)),
    }
}

fn utf8(kind: ResourceKind, bytes: &[u8]) -> Result<Arc<str>, ResourceError> {
    std::str::from_utf8(bytes)
        .map(Arc::from)
        .map_err(|e| ResourceError::decode(kind, e))
}

fn decode_image(bytes: &[u8]) -> Result<Payload, ResourceError> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| ResourceError::decode(ResourceKind::Image, e))?
        .into_rgba8();
    Ok(Payload::Image(Arc::new(img)))
}

fn decode_video(bytes: &[u8]) -> Result<Payload, ResourceError> {
    let err = |e: image::ImageError| ResourceError::decode(ResourceKind::Video, e);
    let decoder = GifDecoder::new(Cursor::new(bytes)).map_err(err)?;
    let raw = decoder.into_frames().collect_frames().map_err(err)?;

    let mut frames = Vec::with_capacity(raw.len());
    let mut start_ms = 0.0;
    for frame in raw {
        let (num, den) = frame.delay().numer_denom_ms();
        let mut duration_ms = if den == 0 { 0.0 } else { num as f64 / den as f64 };
        if duration_ms <= 0.0 {
            duration_ms = DEFAULT_FRAME_MS;
        }
        frames.push(VideoFrame {
            image: frame.into_buffer(),
            start_ms,
            duration_ms,
        });
        start_ms += duration_ms;
    }

    let Some(first) = frames.first() else {
        return Err(ResourceError::decode(ResourceKind::Video, "clip has no frames"));
    };
    let (width, height) = first.image.dimensions();
    Ok(Payload::Video(Arc::new(VideoClip {
        width,
        height,
        frames,
    })))
}

fn decode_audio(bytes: &[u8]) -> Result<Payload, ResourceError> {
    let err = |e: hound::Error| ResourceError::decode(ResourceKind::Audio, e);
    let reader = hound::WavReader::new(Cursor::new(bytes)).map_err(err)?;
    let spec = reader.spec();

    let samples = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(err)?,
        hound::SampleFormat::Int => {
            let full_scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / full_scale))
                .collect::<Result<Vec<_>, _>>()
                .map_err(err)?
        }
    };

    Ok(Payload::Audio(Arc::new(AudioBuffer {
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        samples,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_bytes(samples: &[i16]) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for &s in samples {
                writer.write_sample(s).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    fn png_bytes() -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(3, 2, image::Rgba([10, 20, 30, 255]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn png_decodes_to_rgba() {
        let Payload::Image(img) = decode(ResourceKind::Image, &png_bytes()).unwrap() else {
            panic!("expected image payload");
        };
        assert_eq!(img.dimensions(), (3, 2));
        assert_eq!(img.get_pixel(1, 1).0, [10, 20, 30, 255]);
    }

    #[test]
    fn wav_is_normalized_to_unit_range() {
        let Payload::Audio(buf) = decode(ResourceKind::Audio, &wav_bytes(&[0, 16384, -32768])).unwrap()
        else {
            panic!("expected audio payload");
        };
        assert_eq!(buf.sample_rate, 8000);
        assert_eq!(buf.samples, vec![0.0, 0.5, -1.0]);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let err = decode(ResourceKind::Image, b"not an image").unwrap_err();
        assert!(matches!(err, ResourceError::Decode { kind: ResourceKind::Image, .. }));
        assert!(decode(ResourceKind::Font, b"nope").is_err());
        assert!(decode(ResourceKind::Json, b"{").is_err());
    }

    #[test]
    fn text_and_json() {
        let Payload::Text(t) = decode(ResourceKind::Text, "héllo".as_bytes()).unwrap() else {
            panic!("expected text payload");
        };
        assert_eq!(&*t, "héllo");
        let Payload::Json(v) = decode(ResourceKind::Json, br#"{"a":1}"#).unwrap() else {
            panic!("expected json payload");
        };
        assert_eq!(v["a"], 1);
    }
}

/// Periodic screenshot capture.
///
/// The device hands back a PNG framebuffer; it is re-encoded as a small JPEG
/// so a 2 s cadence stays cheap to store and stream. Encoding is CPU-bound
/// and runs on the blocking pool.

use std::io::Cursor;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;

use perf_protocol::events::ScreenshotEvent;
use perf_protocol::SCREENSHOT_JPEG_QUALITY;

use crate::now_ms;
use crate::shell::ShellChannel;

/// Decode a PNG capture and re-encode it as JPEG at the given quality.
pub fn encode_jpeg(png: &[u8], quality: u8) -> anyhow::Result<Vec<u8>> {
    let img = image::load_from_memory(png)?;
    // JPEG has no alpha channel
    let rgb = img.to_rgb8();
    let mut out = Vec::new();
    let encoder = JpegEncoder::new_with_quality(Cursor::new(&mut out), quality);
    rgb.write_with_encoder(encoder)?;
    Ok(out)
}

/// Capture one screenshot into `<dir>/<epoch_ms>.jpg` and describe it as an
/// event with its public URL.
pub async fn capture_once<S: ShellChannel>(
    shell: &S,
    dir: &Path,
    serial: &str,
    mount: &str,
) -> anyhow::Result<ScreenshotEvent> {
    let timestamp = now_ms();
    let png = shell.screencap().await?;

    let jpeg =
        tokio::task::spawn_blocking(move || encode_jpeg(&png, SCREENSHOT_JPEG_QUALITY)).await??;

    let filename = format!("{timestamp}.jpg");
    tokio::fs::write(dir.join(&filename), &jpeg).await?;

    Ok(ScreenshotEvent {
        timestamp,
        url: format!("{mount}/{serial}/{filename}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a tiny PNG in memory to exercise the real decode/encode path.
    fn sample_png() -> Vec<u8> {
        let img = image::RgbaImage::from_fn(4, 4, |x, y| {
            image::Rgba([(x * 60) as u8, (y * 60) as u8, 128, 255])
        });
        let mut out = Vec::new();
        img.write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
            .unwrap();
        out
    }

    #[test]
    fn png_reencodes_as_jpeg() {
        let jpeg = encode_jpeg(&sample_png(), SCREENSHOT_JPEG_QUALITY).unwrap();
        // JPEG SOI marker
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(decoded.width(), 4);
        assert_eq!(decoded.height(), 4);
    }

    #[test]
    fn garbage_bytes_fail_cleanly() {
        assert!(encode_jpeg(b"not a png", 40).is_err());
    }
}

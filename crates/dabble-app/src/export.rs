//! PNG export of the drawing.

use crate::error::AppError;
use dabble_core::raster::PixelCanvas;
use std::path::PathBuf;

/// Encode the canvas as an RGBA PNG.
pub fn encode_png(canvas: &PixelCanvas) -> Result<Vec<u8>, AppError> {
    let mut png_data = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut png_data, canvas.width(), canvas.height());
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);

        let mut writer = encoder.write_header()?;
        writer.write_image_data(canvas.data())?;
        writer.finish()?;
    }
    Ok(png_data)
}

/// Ask for a destination with a native save dialog and write the PNG there.
///
/// Returns the written path, or `None` if the dialog was cancelled.
pub fn export_png(canvas: &PixelCanvas, name: &str) -> Result<Option<PathBuf>, AppError> {
    let png_data = encode_png(canvas)?;

    let dialog = rfd::FileDialog::new()
        .set_title("Export PNG")
        .set_file_name(format!("{}.png", name))
        .add_filter("PNG Image", &["png"]);

    let Some(path) = dialog.save_file() else {
        return Ok(None);
    };
    std::fs::write(&path, &png_data)?;
    log::info!("Exported PNG to {:?} ({} bytes)", path, png_data.len());
    Ok(Some(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dabble_core::brush::PALETTE;
    use kurbo::Point;

    const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

    #[test]
    fn test_encode_png_header() {
        let mut canvas = PixelCanvas::new(40, 30);
        canvas.fill_dab(Point::new(20.0, 15.0), 8.0, PALETTE[2]);

        let data = encode_png(&canvas).unwrap();
        assert_eq!(&data[..8], &PNG_SIGNATURE);
        // IHDR width/height, big endian
        assert_eq!(&data[16..20], &40u32.to_be_bytes());
        assert_eq!(&data[20..24], &30u32.to_be_bytes());
    }

    #[test]
    fn test_encode_png_decodes_back() {
        let mut canvas = PixelCanvas::new(16, 16);
        canvas.fill_dab(Point::new(8.0, 8.0), 4.0, PALETTE[0]);

        let data = encode_png(&canvas).unwrap();
        let decoder = png::Decoder::new(std::io::Cursor::new(data));
        let mut reader = decoder.read_info().unwrap();
        let mut buf = vec![0; reader.output_buffer_size()];
        let info = reader.next_frame(&mut buf).unwrap();
        assert_eq!((info.width, info.height), (16, 16));
        assert_eq!(&buf[..info.buffer_size()], canvas.data());
    }
}

// file: src/resources/dimensions.rs
// description: image size detection from file headers
// reference: https://www.w3.org/TR/png/#11IHDR

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

/// Reads `(width, height)` from a PNG, JPEG, GIF, WebP or BMP header.
/// Returns `None` for other formats and truncated headers.
pub fn image_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    if data.starts_with(PNG_SIGNATURE) {
        return png_dimensions(data);
    }
    if data.starts_with(&[0xFF, 0xD8]) {
        return jpeg_dimensions(data);
    }
    if data.starts_with(b"GIF8") {
        return gif_dimensions(data);
    }
    if data.len() >= 16 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        return webp_dimensions(data);
    }
    if data.starts_with(b"BM") {
        return bmp_dimensions(data);
    }
    None
}

fn png_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    if data.len() < 24 {
        return None;
    }
    let width = u32::from_be_bytes([data[16], data[17], data[18], data[19]]);
    let height = u32::from_be_bytes([data[20], data[21], data[22], data[23]]);
    Some((width, height))
}

/// Walks the segment list up to the first start-of-frame marker.
fn jpeg_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    let mut i = 2;
    while i + 9 <= data.len() {
        if data[i] != 0xFF {
            i += 1;
            continue;
        }

        let marker = data[i + 1];
        match marker {
            0xC0..=0xC3 | 0xC5..=0xC7 | 0xC9..=0xCB | 0xCD..=0xCF => {
                let height = u16::from_be_bytes([data[i + 5], data[i + 6]]) as u32;
                let width = u16::from_be_bytes([data[i + 7], data[i + 8]]) as u32;
                return Some((width, height));
            }
            0xFF => i += 1,
            0xD0..=0xD9 | 0x01 => i += 2,
            _ => {
                let length = u16::from_be_bytes([data[i + 2], data[i + 3]]) as usize;
                i += 2 + length;
            }
        }
    }
    None
}

fn gif_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    if data.len() < 10 {
        return None;
    }
    let width = u16::from_le_bytes([data[6], data[7]]) as u32;
    let height = u16::from_le_bytes([data[8], data[9]]) as u32;
    Some((width, height))
}

fn webp_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    match &data[12..16] {
        b"VP8 " if data.len() >= 30 => {
            let width = u16::from_le_bytes([data[26], data[27]]) as u32 & 0x3FFF;
            let height = u16::from_le_bytes([data[28], data[29]]) as u32 & 0x3FFF;
            Some((width, height))
        }
        b"VP8L" if data.len() >= 25 => {
            let bits = u32::from_le_bytes([data[21], data[22], data[23], data[24]]);
            let width = (bits & 0x3FFF) + 1;
            let height = ((bits >> 14) & 0x3FFF) + 1;
            Some((width, height))
        }
        b"VP8X" if data.len() >= 30 => {
            let width = u32::from_le_bytes([data[24], data[25], data[26], 0]) + 1;
            let height = u32::from_le_bytes([data[27], data[28], data[29], 0]) + 1;
            Some((width, height))
        }
        _ => None,
    }
}

fn bmp_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    if data.len() < 26 {
        return None;
    }
    let width = i32::from_le_bytes([data[18], data[19], data[20], data[21]]);
    // Negative height marks a top-down bitmap.
    let height = i32::from_le_bytes([data[22], data[23], data[24], data[25]]);
    Some((width.unsigned_abs(), height.unsigned_abs()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_header(width: u32, height: u32) -> Vec<u8> {
        let mut data = PNG_SIGNATURE.to_vec();
        data.extend_from_slice(&[0, 0, 0, 13]);
        data.extend_from_slice(b"IHDR");
        data.extend_from_slice(&width.to_be_bytes());
        data.extend_from_slice(&height.to_be_bytes());
        data.extend_from_slice(&[8, 6, 0, 0, 0]);
        data
    }

    #[test]
    fn test_png() {
        assert_eq!(image_dimensions(&png_header(640, 480)), Some((640, 480)));
        assert_eq!(image_dimensions(&png_header(640, 480)[..20]), None);
    }

    #[test]
    fn test_jpeg_skips_app_segments() {
        let mut data = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x04, 0xC0, 0x00];
        data.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x11, 0x08, 0x01, 0x2C, 0x02, 0x58, 0x03]);
        assert_eq!(image_dimensions(&data), Some((600, 300)));
    }

    #[test]
    fn test_gif_and_bmp() {
        let mut gif = b"GIF89a".to_vec();
        gif.extend_from_slice(&[0x20, 0x00, 0x10, 0x00]);
        assert_eq!(image_dimensions(&gif), Some((32, 16)));

        let mut bmp = b"BM".to_vec();
        bmp.resize(18, 0);
        bmp.extend_from_slice(&100i32.to_le_bytes());
        bmp.extend_from_slice(&(-50i32).to_le_bytes());
        assert_eq!(image_dimensions(&bmp), Some((100, 50)));
    }

    #[test]
    fn test_webp_lossless() {
        let mut data = b"RIFF\0\0\0\0WEBPVP8L".to_vec();
        data.resize(21, 0);
        let bits: u32 = (10 - 1) | ((20 - 1) << 14);
        data.extend_from_slice(&bits.to_le_bytes());
        assert_eq!(image_dimensions(&data), Some((10, 20)));
    }

    #[test]
    fn test_unknown_format() {
        assert_eq!(image_dimensions(b"%PDF-1.7"), None);
        assert_eq!(image_dimensions(&[]), None);
    }
}

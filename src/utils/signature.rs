use std::fs::File;
use std::io::Read;
use std::path::Path;

use image::ImageFormat;

use crate::models::Variant;

const SNIFF_LEN: usize = 32;

const EBML: &[u8] = &[0x1A, 0x45, 0xDF, 0xA3];
const ASF: &[u8] = &[0x30, 0x26, 0xB2, 0x75, 0x8E, 0x66, 0xCF, 0x11];
const FLV: &[u8] = b"FLV";
const MPEG_PS: &[u8] = &[0x00, 0x00, 0x01, 0xBA];

/// Reads the first bytes of a file and classifies it by magic number.
///
/// Unreadable files classify as `Unsupported`.
pub fn sniff_variant(path: &Path) -> Variant {
    let mut header = [0u8; SNIFF_LEN];
    let len = match File::open(path).and_then(|mut f| read_prefix(&mut f, &mut header)) {
        Ok(len) => len,
        Err(_) => return Variant::Unsupported,
    };
    variant_from_header(&header[..len])
}

fn read_prefix(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

pub fn variant_from_header(header: &[u8]) -> Variant {
    // ISO base media: size(4) "ftyp" brand(4)
    if header.len() >= 12 && &header[4..8] == b"ftyp" {
        return match &header[8..12] {
            b"heic" | b"heix" | b"hevc" | b"heim" | b"heis" | b"mif1" | b"msf1" => {
                Variant::Image { opaque: true }
            }
            b"avif" | b"avis" => Variant::Image { opaque: false },
            _ => Variant::Video,
        };
    }

    if header.starts_with(EBML) || header.starts_with(ASF) || header.starts_with(FLV) {
        return Variant::Video;
    }
    if header.starts_with(MPEG_PS) {
        return Variant::Video;
    }
    if header.len() >= 12 && &header[0..4] == b"RIFF" && &header[8..12] == b"AVI " {
        return Variant::Video;
    }

    match image::guess_format(header) {
        Ok(ImageFormat::Gif) => Variant::AnimatedImage,
        Ok(ImageFormat::Jpeg) | Ok(ImageFormat::Bmp) => Variant::Image { opaque: true },
        Ok(ImageFormat::Png)
        | Ok(ImageFormat::WebP)
        | Ok(ImageFormat::Tiff)
        | Ok(ImageFormat::Avif)
        | Ok(ImageFormat::Ico) => Variant::Image { opaque: false },
        _ => Variant::Unsupported,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognises_common_headers() {
        assert_eq!(
            variant_from_header(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10]),
            Variant::Image { opaque: true }
        );
        assert_eq!(
            variant_from_header(b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR"),
            Variant::Image { opaque: false }
        );
        assert_eq!(variant_from_header(b"GIF89a\x01\x00"), Variant::AnimatedImage);
        assert_eq!(
            variant_from_header(b"\0\0\0\x18ftypmp42\0\0\0\0"),
            Variant::Video
        );
        assert_eq!(
            variant_from_header(b"\0\0\0\x18ftypheic\0\0\0\0"),
            Variant::Image { opaque: true }
        );
        assert_eq!(
            variant_from_header(&[0x1A, 0x45, 0xDF, 0xA3, 0x01]),
            Variant::Video
        );
    }

    #[test]
    fn unknown_and_empty_headers_are_unsupported() {
        assert_eq!(variant_from_header(b""), Variant::Unsupported);
        assert_eq!(variant_from_header(b"hello world"), Variant::Unsupported);
    }

    #[test]
    fn missing_file_is_unsupported() {
        assert_eq!(
            sniff_variant(Path::new("/definitely/not/here.bin")),
            Variant::Unsupported
        );
    }
}

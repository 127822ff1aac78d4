//! JPEG marker segment splitting and splicing.
//!
//! Metadata lives in application segments ahead of the scan data:
//!
//! ```text
//! FFD8                      SOI
//! FFE0 JFIF                 APP0
//! FFE1 "Exif\0\0" TIFF      APP1   EXIF
//! FFE1 "http://ns.adobe.com/xap/1.0/\0" <x:xmpmeta>   APP1   XMP
//! FFED "Photoshop 3.0\0" 8BIM...  APP13  IPTC
//! FFDB ... FFC0 ... FFC4    tables, frame header
//! FFDA ...                  SOS + entropy-coded data (kept verbatim)
//! ```
//!
//! Only the segments before SOS are parsed; everything from SOS onward is
//! carried through as an opaque tail.

use crate::metadata::MetadataError;

pub(crate) const EXIF_HEADER: &[u8] = b"Exif\0\0";
pub(crate) const XMP_HEADER: &[u8] = b"http://ns.adobe.com/xap/1.0/\0";
const XMP_EXTENSION_HEADER: &[u8] = b"http://ns.adobe.com/xmp/extension/\0";
pub(crate) const PHOTOSHOP_HEADER: &[u8] = b"Photoshop 3.0\0";

const SOI: u8 = 0xD8;
const EOI: u8 = 0xD9;
const SOS: u8 = 0xDA;
const APP0: u8 = 0xE0;
const APP1: u8 = 0xE1;
const APP13: u8 = 0xED;

/// Largest payload a length-prefixed marker segment can hold.
const MAX_SEGMENT_PAYLOAD: usize = 0xFFFF - 2;

/// A marker segment. `data` excludes the marker and the length field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Segment {
    pub marker: u8,
    pub data: Vec<u8>,
}

/// The metadata blocks this module knows how to locate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MetadataBlock {
    Exif,
    Xmp,
    Iptc,
}

impl MetadataBlock {
    fn matches(self, segment: &Segment) -> bool {
        match self {
            MetadataBlock::Exif => {
                segment.marker == APP1 && segment.data.starts_with(EXIF_HEADER)
            }
            MetadataBlock::Xmp => {
                segment.marker == APP1
                    && (segment.data.starts_with(XMP_HEADER)
                        || segment.data.starts_with(XMP_EXTENSION_HEADER))
            }
            MetadataBlock::Iptc => {
                segment.marker == APP13 && segment.data.starts_with(PHOTOSHOP_HEADER)
            }
        }
    }

    fn marker(self) -> u8 {
        match self {
            MetadataBlock::Exif | MetadataBlock::Xmp => APP1,
            MetadataBlock::Iptc => APP13,
        }
    }
}

/// A JPEG split into header segments and the untouched scan tail.
#[derive(Debug, Clone)]
pub(crate) struct JpegSegments {
    pub segments: Vec<Segment>,
    tail: Vec<u8>,
}

impl JpegSegments {
    /// Split a JPEG byte stream. Returns `None` when the data is not a JPEG
    /// or the header is truncated.
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < 4 || data[0] != 0xFF || data[1] != SOI {
            return None;
        }

        let mut segments = Vec::new();
        let mut pos = 2;
        loop {
            if pos + 1 >= data.len() || data[pos] != 0xFF {
                return None;
            }
            // Fill bytes: any number of 0xFF may precede a marker
            let mut marker_pos = pos + 1;
            while marker_pos < data.len() && data[marker_pos] == 0xFF {
                marker_pos += 1;
            }
            if marker_pos >= data.len() {
                return None;
            }
            let marker = data[marker_pos];

            if marker == SOS || marker == EOI {
                return Some(Self {
                    segments,
                    tail: data[pos..].to_vec(),
                });
            }

            // Standalone markers carry no length field
            if marker == 0x01 || (0xD0..=0xD7).contains(&marker) {
                segments.push(Segment {
                    marker,
                    data: Vec::new(),
                });
                pos = marker_pos + 1;
                continue;
            }

            if marker_pos + 2 >= data.len() {
                return None;
            }
            let len = u16::from_be_bytes([data[marker_pos + 1], data[marker_pos + 2]]) as usize;
            let start = marker_pos + 3;
            let end = marker_pos + 1 + len;
            if len < 2 || end > data.len() {
                return None;
            }
            segments.push(Segment {
                marker,
                data: data[start..end].to_vec(),
            });
            pos = end;
        }
    }

    /// Payload of the first segment holding `block`, header included.
    pub fn find(&self, block: MetadataBlock) -> Option<&[u8]> {
        self.segments
            .iter()
            .find(|s| block.matches(s))
            .map(|s| s.data.as_slice())
    }

    /// Replace every segment holding `block` with `payload` (or drop them).
    ///
    /// New segments go right after the APP0 (and, for XMP, EXIF) segments so
    /// readers that only look at the first APP1 still find EXIF.
    pub fn replace(
        &mut self,
        block: MetadataBlock,
        payload: Option<Vec<u8>>,
    ) -> Result<(), MetadataError> {
        self.segments.retain(|s| !block.matches(s));

        let Some(payload) = payload else {
            return Ok(());
        };
        if payload.len() > MAX_SEGMENT_PAYLOAD {
            return Err(MetadataError::SegmentTooLarge(payload.len()));
        }

        let insert_at = self
            .segments
            .iter()
            .position(|s| match block {
                MetadataBlock::Exif => s.marker != APP0,
                MetadataBlock::Xmp => s.marker != APP0 && !MetadataBlock::Exif.matches(s),
                MetadataBlock::Iptc => !(0xE0..=0xEF).contains(&s.marker),
            })
            .unwrap_or(self.segments.len());

        self.segments.insert(
            insert_at,
            Segment {
                marker: block.marker(),
                data: payload,
            },
        );
        Ok(())
    }

    /// Reassemble the byte stream.
    pub fn to_bytes(&self) -> Vec<u8> {
        let header_len: usize = self.segments.iter().map(|s| s.data.len() + 4).sum();
        let mut out = Vec::with_capacity(2 + header_len + self.tail.len());
        out.extend_from_slice(&[0xFF, SOI]);
        for segment in &self.segments {
            out.extend_from_slice(&[0xFF, segment.marker]);
            if segment.marker == 0x01 || (0xD0..=0xD7).contains(&segment.marker) {
                continue;
            }
            out.extend_from_slice(&((segment.data.len() + 2) as u16).to_be_bytes());
            out.extend_from_slice(&segment.data);
        }
        out.extend_from_slice(&self.tail);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// SOI, APP0 "JFIF", DQT stub, SOS stub with two bytes of scan data, EOI.
    fn minimal_jpeg() -> Vec<u8> {
        let mut data = vec![0xFF, 0xD8];
        data.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x07]);
        data.extend_from_slice(b"JFIF\0");
        data.extend_from_slice(&[0xFF, 0xDB, 0x00, 0x03, 0x00]);
        data.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x02, 0x12, 0x34, 0xFF, 0xD9]);
        data
    }

    #[test]
    fn parse_splits_header_segments() {
        let jpeg = JpegSegments::parse(&minimal_jpeg()).unwrap();
        let markers: Vec<u8> = jpeg.segments.iter().map(|s| s.marker).collect();
        assert_eq!(markers, vec![0xE0, 0xDB]);
        assert_eq!(jpeg.segments[0].data, b"JFIF\0");
    }

    #[test]
    fn parse_then_serialize_is_lossless() {
        let data = minimal_jpeg();
        assert_eq!(JpegSegments::parse(&data).unwrap().to_bytes(), data);
    }

    #[test]
    fn parse_rejects_non_jpeg() {
        assert!(JpegSegments::parse(b"\x89PNG\r\n\x1a\n").is_none());
        assert!(JpegSegments::parse(&[]).is_none());
    }

    #[test]
    fn parse_rejects_truncated_segment() {
        let mut data = minimal_jpeg();
        data.truncate(8);
        assert!(JpegSegments::parse(&data).is_none());
    }

    fn payload(header: &[u8], body: &[u8]) -> Vec<u8> {
        [header, body].concat()
    }

    #[test]
    fn replace_inserts_blocks_in_conventional_order() {
        let mut jpeg = JpegSegments::parse(&minimal_jpeg()).unwrap();
        jpeg.replace(MetadataBlock::Iptc, Some(payload(PHOTOSHOP_HEADER, b"x")))
            .unwrap();
        jpeg.replace(MetadataBlock::Xmp, Some(payload(XMP_HEADER, b"<x/>")))
            .unwrap();
        jpeg.replace(MetadataBlock::Exif, Some(payload(EXIF_HEADER, b"MM")))
            .unwrap();

        let markers: Vec<u8> = jpeg.segments.iter().map(|s| s.marker).collect();
        assert_eq!(markers, vec![0xE0, 0xE1, 0xE1, 0xED, 0xDB]);
        assert!(jpeg.segments[1].data.starts_with(EXIF_HEADER));
        assert!(jpeg.segments[2].data.starts_with(XMP_HEADER));
        let xmp = payload(XMP_HEADER, b"<x/>");
        assert_eq!(jpeg.find(MetadataBlock::Xmp), Some(xmp.as_slice()));
    }

    #[test]
    fn replace_with_none_drops_block() {
        let mut jpeg = JpegSegments::parse(&minimal_jpeg()).unwrap();
        jpeg.replace(MetadataBlock::Xmp, Some(payload(XMP_HEADER, b"<x/>")))
            .unwrap();
        jpeg.replace(MetadataBlock::Xmp, None).unwrap();
        assert!(jpeg.find(MetadataBlock::Xmp).is_none());
        assert_eq!(jpeg.to_bytes(), minimal_jpeg());
    }

    #[test]
    fn replace_rejects_oversized_payload() {
        let mut jpeg = JpegSegments::parse(&minimal_jpeg()).unwrap();
        let result = jpeg.replace(MetadataBlock::Xmp, Some(vec![0u8; 70_000]));
        assert!(matches!(result, Err(MetadataError::SegmentTooLarge(70_000))));
    }
}

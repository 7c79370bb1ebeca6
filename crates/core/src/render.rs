//! Frame extraction, VOI windowing and JPEG rendering.
//!
//! The renderer only ever sees uncompressed samples: encapsulated transfer
//! syntaxes are normalised by the decoder's pixel-data pipeline before frame
//! extraction. Frame numbers are 1-based at the protocol boundary and are
//! validated against the declared frame count before any decode is
//! attempted.
//!
//! Encapsulated PDF objects take a separate branch entirely: their embedded
//! document bytes are returned verbatim under the declared media type, no
//! pixel math involved.

use crate::constants::{DEFAULT_DOCUMENT_MEDIA_TYPE, JPEG_QUALITY};
use crate::metadata::{element_str, is_encapsulated_pdf};
use crate::{ArchiveError, ArchiveResult, Dataset};
use dicom::core::value::Value;
use dicom::core::Tag;
use dicom::dictionary_std::tags;
use dicom::object::DefaultDicomObject;
use dicom::pixeldata::image::codecs::jpeg::JpegEncoder;
use dicom::pixeldata::image::ExtendedColorType;
use dicom::pixeldata::{PhotometricInterpretation, PixelDecoder};

/// A rendered payload ready to be served.
#[derive(Debug)]
pub struct Rendered {
    pub bytes: Vec<u8>,
    pub media_type: String,
}

/// Modality rescale parameters applied to 16-bit samples before windowing.
#[derive(Debug, Clone, Copy)]
pub struct Rescale {
    pub slope: f64,
    pub intercept: f64,
}

/// VOI window mapping rescaled values onto the displayable 0–255 range.
#[derive(Debug, Clone, Copy)]
pub struct VoiWindow {
    pub center: f64,
    pub width: f64,
}

impl VoiWindow {
    fn bounds(&self) -> (f64, f64, f64) {
        let low = self.center - self.width / 2.0;
        let high = self.center + self.width / 2.0;
        let scale = 255.0 / (high - low).max(1.0);
        (low, high, scale)
    }
}

/// The frame count declared by the data set (NumberOfFrames, default 1).
pub fn declared_frame_count(dataset: &Dataset) -> u32 {
    dataset
        .element(tags::NUMBER_OF_FRAMES)
        .ok()
        .and_then(|element| element.to_int::<i32>().ok())
        .filter(|count| *count > 0)
        .map(|count| count as u32)
        .unwrap_or(1)
}

/// Extract the raw sample bytes of one frame.
///
/// `frame_number` is 1-based; out-of-range numbers fail validation before
/// the pixel data is touched.
pub fn extract_frame(object: &DefaultDicomObject, frame_number: u32) -> ArchiveResult<Vec<u8>> {
    let index = checked_frame_index(object, frame_number)?;
    let decoded = object
        .decode_pixel_data()
        .map_err(|err| ArchiveError::PixelData(err.to_string()))?;
    let bytes = decoded
        .frame_data(index)
        .map_err(|err| ArchiveError::PixelData(err.to_string()))?;
    Ok(bytes.to_vec())
}

/// Render one frame of an instance into a displayable payload.
///
/// Image objects go through rescale + VOI windowing into an 8-bit grayscale
/// JPEG; encapsulated documents return their embedded bytes verbatim.
pub fn render_instance(object: &DefaultDicomObject, frame_number: u32) -> ArchiveResult<Rendered> {
    if is_encapsulated_pdf(object) {
        return render_document(object);
    }

    let index = checked_frame_index(object, frame_number)?;
    let decoded = object
        .decode_pixel_data()
        .map_err(|err| ArchiveError::PixelData(err.to_string()))?;
    let columns = decoded.columns();
    let rows = decoded.rows();
    let invert = matches!(
        decoded.photometric_interpretation(),
        PhotometricInterpretation::Monochrome1
    );
    let raw = decoded
        .frame_data(index)
        .map_err(|err| ArchiveError::PixelData(err.to_string()))?;

    let gray = if decoded.bits_allocated() == 8 {
        window_samples_u8(raw, voi_window(object, 127.5, 255.0), invert)
    } else {
        let samples = u16_samples_le(raw);
        window_samples_u16(
            &samples,
            rescale(object),
            voi_window(object, 2048.0, 4096.0),
            invert,
        )
    };

    Ok(Rendered {
        bytes: encode_jpeg(&gray, columns, rows)?,
        media_type: "image/jpeg".to_string(),
    })
}

/// Raw bytes of the pixel-data attribute: the native payload for
/// uncompressed objects, concatenated fragments for encapsulated ones.
/// `None` when the object carries no pixel data at all.
pub fn pixel_data_bytes(object: &DefaultDicomObject) -> ArchiveResult<Option<Vec<u8>>> {
    let Ok(element) = object.element(tags::PIXEL_DATA) else {
        return Ok(None);
    };
    match element.value() {
        Value::Primitive(primitive) => Ok(Some(primitive.to_bytes().into_owned())),
        Value::PixelSequence(sequence) => Ok(Some(
            sequence
                .fragments()
                .iter()
                .flat_map(|fragment| fragment.iter().copied())
                .collect(),
        )),
        Value::Sequence(_) => Ok(None),
    }
}

fn render_document(object: &DefaultDicomObject) -> ArchiveResult<Rendered> {
    let element = object
        .element(tags::ENCAPSULATED_DOCUMENT)
        .map_err(|_| ArchiveError::NotFound("encapsulated document payload".to_string()))?;
    let bytes = element
        .to_bytes()
        .map_err(|err| ArchiveError::Decode(err.to_string()))?
        .into_owned();
    if bytes.is_empty() {
        return Err(ArchiveError::NotFound(
            "encapsulated document payload".to_string(),
        ));
    }
    let media_type = element_str(object, tags::MIME_TYPE_OF_ENCAPSULATED_DOCUMENT)
        .unwrap_or_else(|| DEFAULT_DOCUMENT_MEDIA_TYPE.to_string());
    Ok(Rendered { bytes, media_type })
}

fn checked_frame_index(dataset: &Dataset, frame_number: u32) -> ArchiveResult<u32> {
    let available = declared_frame_count(dataset);
    if frame_number < 1 || frame_number > available {
        return Err(ArchiveError::FrameOutOfRange {
            requested: frame_number,
            available,
        });
    }
    Ok(frame_number - 1)
}

fn element_f64(dataset: &Dataset, tag: Tag) -> Option<f64> {
    dataset
        .element(tag)
        .ok()
        .and_then(|element| element.to_float64().ok())
}

fn rescale(dataset: &Dataset) -> Rescale {
    Rescale {
        slope: element_f64(dataset, tags::RESCALE_SLOPE).unwrap_or(1.0),
        intercept: element_f64(dataset, tags::RESCALE_INTERCEPT).unwrap_or(0.0),
    }
}

fn voi_window(dataset: &Dataset, default_center: f64, default_width: f64) -> VoiWindow {
    VoiWindow {
        center: element_f64(dataset, tags::WINDOW_CENTER).unwrap_or(default_center),
        width: element_f64(dataset, tags::WINDOW_WIDTH).unwrap_or(default_width),
    }
}

/// Window 8-bit samples directly (no rescale step).
pub fn window_samples_u8(samples: &[u8], window: VoiWindow, invert: bool) -> Vec<u8> {
    let (low, high, scale) = window.bounds();
    samples
        .iter()
        .map(|&sample| shade(sample as f64, low, high, scale, invert))
        .collect()
}

/// Window 16-bit samples after applying the modality rescale.
pub fn window_samples_u16(
    samples: &[u16],
    rescale: Rescale,
    window: VoiWindow,
    invert: bool,
) -> Vec<u8> {
    let (low, high, scale) = window.bounds();
    samples
        .iter()
        .map(|&sample| {
            let value = sample as f64 * rescale.slope + rescale.intercept;
            shade(value, low, high, scale, invert)
        })
        .collect()
}

fn shade(value: f64, low: f64, high: f64, scale: f64, invert: bool) -> u8 {
    let shade = if value <= low {
        0
    } else if value >= high {
        255
    } else {
        ((value - low) * scale).round() as u8
    };
    if invert {
        255 - shade
    } else {
        shade
    }
}

fn u16_samples_le(raw: &[u8]) -> Vec<u16> {
    raw.chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

fn encode_jpeg(gray: &[u8], width: u32, height: u32) -> ArchiveResult<Vec<u8>> {
    let mut bytes = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY);
    encoder
        .encode(gray, width, height, ExtendedColorType::L8)
        .map_err(|err| ArchiveError::ImageEncode(err.to_string()))?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::ENCAPSULATED_PDF_SOP_CLASS_UID;
    use crate::testdata;

    fn default_window_u8() -> VoiWindow {
        VoiWindow {
            center: 127.5,
            width: 255.0,
        }
    }

    #[test]
    fn default_window_is_identity_on_8_bit_samples() {
        let samples: Vec<u8> = (0..=255).collect();
        let windowed = window_samples_u8(&samples, default_window_u8(), false);
        assert_eq!(windowed, samples);
    }

    #[test]
    fn samples_outside_the_window_clamp() {
        let window = VoiWindow {
            center: 100.0,
            width: 50.0,
        };
        let windowed = window_samples_u8(&[50, 75, 200], window, false);
        assert_eq!(windowed[0], 0);
        assert_eq!(windowed[1], 0); // exactly at the lower bound
        assert_eq!(windowed[2], 255);
    }

    #[test]
    fn monochrome1_inverts_the_output() {
        let windowed = window_samples_u8(&[0, 255, 100], default_window_u8(), true);
        assert_eq!(windowed, vec![255, 0, 155]);
    }

    #[test]
    fn rescale_applies_before_windowing() {
        let rescale = Rescale {
            slope: 2.0,
            intercept: -50.0,
        };
        let window = VoiWindow {
            center: 150.0,
            width: 100.0,
        };
        // 100 * 2 - 50 = 150 → round((150 - 100) * 2.55) = 128
        let windowed = window_samples_u16(&[100], rescale, window, false);
        assert_eq!(windowed, vec![128]);
    }

    #[test]
    fn frame_count_defaults_to_one() {
        let dataset = testdata::pixel_dataset_8bit("1.2", "1.2.3", "1.2.3.4", &[0, 64, 128, 255]);
        assert_eq!(declared_frame_count(&dataset), 1);
    }

    #[test]
    fn out_of_range_frames_fail_validation() {
        let dataset = testdata::pixel_dataset_8bit("1.2", "1.2.3", "1.2.3.4", &[0, 64, 128, 255]);
        let object = testdata::file_object(dataset);

        for bad in [0u32, 2] {
            match extract_frame(&object, bad) {
                Err(ArchiveError::FrameOutOfRange {
                    requested,
                    available,
                }) => {
                    assert_eq!(requested, bad);
                    assert_eq!(available, 1);
                }
                other => panic!("expected FrameOutOfRange, got {other:?}"),
            }
        }
    }

    #[test]
    fn extract_frame_returns_raw_samples() {
        let dataset = testdata::pixel_dataset_8bit("1.2", "1.2.3", "1.2.3.4", &[0, 64, 128, 255]);
        let object = testdata::file_object(dataset);

        let frame = extract_frame(&object, 1).unwrap();
        assert_eq!(frame, vec![0, 64, 128, 255]);
    }

    #[test]
    fn rendering_produces_a_jpeg() {
        let dataset = testdata::pixel_dataset_8bit("1.2", "1.2.3", "1.2.3.4", &[0, 64, 128, 255]);
        let object = testdata::file_object(dataset);

        let rendered = render_instance(&object, 1).unwrap();
        assert_eq!(rendered.media_type, "image/jpeg");
        // JPEG start-of-image marker
        assert_eq!(&rendered.bytes[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn pixel_data_bytes_returns_the_native_payload() {
        let dataset = testdata::pixel_dataset_8bit("1.2", "1.2.3", "1.2.3.4", &[0, 64, 128, 255]);
        let object = testdata::file_object(dataset);
        assert_eq!(
            pixel_data_bytes(&object).unwrap(),
            Some(vec![0, 64, 128, 255])
        );

        let plain = testdata::file_object(testdata::minimal_dataset("1.2", "1.2.3", "1.2.3.5", "CT"));
        assert_eq!(pixel_data_bytes(&plain).unwrap(), None);
    }

    #[test]
    fn encapsulated_pdf_bytes_pass_through_verbatim() {
        let pdf = b"%PDF-1.4 minimal".to_vec();
        let dataset = testdata::pdf_dataset("1.2", "1.2.3", "1.2.3.9", &pdf);
        assert!(is_encapsulated_pdf(&dataset));
        let object = testdata::file_object_with_class(dataset, ENCAPSULATED_PDF_SOP_CLASS_UID);

        let rendered = render_instance(&object, 1).unwrap();
        assert_eq!(rendered.media_type, "application/pdf");
        assert_eq!(rendered.bytes, pdf);
    }
}

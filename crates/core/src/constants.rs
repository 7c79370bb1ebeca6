//! Constants shared across the core components.

/// SOP class UID of encapsulated PDF storage objects.
pub const ENCAPSULATED_PDF_SOP_CLASS_UID: &str = "1.2.840.10008.5.1.4.1.1.104.1";

/// Modality code forced onto encapsulated document objects in every
/// metadata view, overriding whatever the source object declared.
pub const DOCUMENT_MODALITY: &str = "DOC";

/// Media type reported for encapsulated documents with no declared MIME type.
pub const DEFAULT_DOCUMENT_MEDIA_TYPE: &str = "application/pdf";

/// JPEG quality used for rendered and thumbnail output.
pub const JPEG_QUALITY: u8 = 90;

/// Maximum nesting depth accepted when mapping sequence attributes.
///
/// The DICOM data model places no bound on sequence nesting; this cap turns
/// a pathologically deep (or cyclic, after a decoder bug) structure into a
/// per-object decode failure instead of a stack overflow.
pub const MAX_SEQUENCE_DEPTH: usize = 32;

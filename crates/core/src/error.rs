#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("invalid frame number {requested}: instance has {available} frame(s)")]
    FrameOutOfRange { requested: u32, available: u32 },
    #[error("request body is not multipart/related")]
    NotMultipartRelated,
    #[error("no boundary token in multipart content type")]
    MissingBoundary,
    #[error("malformed multipart body: {0}")]
    MalformedMultipart(String),
    #[error("failed to decode DICOM object: {0}")]
    Decode(String),
    #[error("sequence nesting exceeds {0} levels")]
    SequenceDepthExceeded(usize),
    #[error("StudyInstanceUID mismatch. Expected: {expected}, Found: {found}")]
    StudyMismatch { expected: String, found: String },
    #[error("failed to decode pixel data: {0}")]
    PixelData(String),
    #[error("failed to encode image: {0}")]
    ImageEncode(String),
    #[error("failed to persist instance: {0}")]
    Persist(String),
    #[error("storage error: {0}")]
    Store(#[from] dwfs_store::StoreError),
    #[error("invalid identifier: {0}")]
    Uid(#[from] dwfs_types::UidError),
}

pub type ArchiveResult<T> = std::result::Result<T, ArchiveError>;

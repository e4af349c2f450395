//! Provider constants for multi-part uploads.
//!
//! Values follow the object store backing the stage (S3 semantics).

/// One mebibyte.
pub const ONE_MEGABYTE: u64 = 1024 * 1024;

/// Part size used by the provider's upload client unless told otherwise.
pub const DEFAULT_CHUNK_SIZE: u64 = 8 * ONE_MEGABYTE;

/// Smallest part the provider accepts (except for the final part).
pub const MIN_PART_SIZE: u64 = 5 * ONE_MEGABYTE;

/// Maximum number of parts in a single multi-part upload.
pub const MAX_PARTS: u64 = 10_000;

/// Upper bound on megabyte-aligned candidates tried during chunk size recovery.
pub const MAX_ALIGNED_STEPS: u64 = 5 * 1024;

/// Read buffer used while streaming files through the hasher.
pub const READ_BUFFER_BYTES: usize = 64 * 1024;

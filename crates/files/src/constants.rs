/// Fixed trash subtree. Never date- or type-sharded.
pub const TRASH_DIR: &str = "/trash";

/// Date component of a derived logical path (`/image/20240131`).
pub const DATE_DIR_FORMAT: &str = "%Y%m%d";

/// Default bounding boxes (pixels) for the small, medium and large thumbnail variants.
pub const DEFAULT_THUMBNAIL_BOUNDS: [u32; 3] = [64, 256, 512];

/// Number of worker threads driving the remote object-store client.
pub const REMOTE_WORKER_THREADS: usize = 2;

/// Minimum span fetched per ranged read from a remote object.
pub const REMOTE_READ_CHUNK: u64 = 256 * 1024;

/// Multipart upload parts allowed in flight while streaming to a remote object.
pub const REMOTE_UPLOAD_PARTS: usize = 4;

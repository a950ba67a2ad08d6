/// Quiet period before a typeahead search query is dispatched
pub const SEARCH_DEBOUNCE_MS: u64 = 300;

/// Minimum search term length; shorter terms clear results immediately
pub const MIN_SEARCH_TERM_LEN: usize = 2;

/// Maximum number of user results returned per search query
pub const SEARCH_RESULT_LIMIT: usize = 10;

/// Maximum number of posts loaded into the explore view
pub const EXPLORE_POST_LIMIT: usize = 50;

/// Maximum accepted image upload size in bytes (5 MiB)
pub const MAX_IMAGE_SIZE: usize = 5 * 1024 * 1024;

/// Chunk size for binary transfers (256 KiB)
pub const UPLOAD_CHUNK_SIZE: usize = 256 * 1024;

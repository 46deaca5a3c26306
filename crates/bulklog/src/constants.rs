//! Constants for the bulk intake API and shipper defaults.
//!
//! This module defines path, format, and depth limits for bulk payloads,
//! based on the constraints of Elasticsearch-compatible intake endpoints.
//!
//! # Design Considerations
//!
//! - **NDJSON framing**: The bulk endpoint accepts newline-delimited JSON
//!   only; a metadata line precedes every document line
//! - **Bounded exception chains**: Inner-exception serialization is
//!   depth-capped so a malformed chain cannot recurse unboundedly
//! - **Default exclusions**: Caller-site and host-identity properties are
//!   excluded from documents unless explicitly re-enabled

/// Path of the bulk write endpoint, relative to the node base URL.
pub(crate) const BULK_PATH: &str = "/_bulk";

/// Content type required by the bulk endpoint.
///
/// The intake rejects `application/json` for bulk writes; payloads must
/// be newline-delimited JSON.
pub(crate) const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

/// Maximum depth of the serialized inner-exception chain.
///
/// # Value: 8 levels
///
/// Inner exceptions beyond this depth are dropped from the serialized
/// record. Exception chains deeper than this are almost always the
/// product of a wrapping loop rather than real causal structure.
pub(crate) const MAX_INNER_EXCEPTION_DEPTH: usize = 8;

/// Substitute written in place of a literal dot in serialized exception
/// key names.
///
/// The target storage format treats dots as path separators, so a key
/// such as `config.path` would otherwise be indexed as a nested object.
pub(crate) const KEY_DOT_SUBSTITUTE: char = '_';

/// Event properties excluded from documents by default.
///
/// These carry caller-site and host-identity information that the
/// backend either derives on its own or that is rarely worth indexing
/// per document. The set is overridable per shipper instance through
/// [`crate::config::Config::excluded_properties`].
pub const DEFAULT_EXCLUDED_PROPERTIES: [&str; 5] = [
    "CallerMemberName",
    "CallerFilePath",
    "CallerLineNumber",
    "MachineName",
    "ThreadId",
];

/// Placeholder reported to completion callbacks when the delivery
/// collaborator signals failure without any error detail.
pub const NO_ERROR_DETAIL: &str = "no error detail returned by the bulk transport";

/// Default timeout in seconds for a single bulk write request.
pub(crate) const DEFAULT_FLUSH_TIMEOUT_SECS: u64 = 30;

/// Default capacity of the retry buffer.
///
/// Assuming an average document of ~1KB, a full buffer holds roughly
/// 10MB of undelivered events before drop-oldest eviction begins.
pub(crate) const DEFAULT_RETRY_BUFFER_CAPACITY: usize = 10_000;

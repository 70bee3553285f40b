//! # Keyhint Metadata
//!
//! Data model for configuration-property metadata documents.
//!
//! ## Document shape
//!
//! ```text
//! META-INF/spring-configuration-metadata.json
//!     │
//!     ├──> groups[]      name, type, description, sourceType, sourceMethod
//!     ├──> properties[]  name, type, description, sourceType, defaultValue
//!     └──> hints[]       name, values[] { value, description }
//! ```
//!
//! Keys are dotted paths. Every segment is compared in its sanitized form, so
//! `server.max-http-header-size`, `server.maxHttpHeaderSize` and
//! `server.max_http_header_size` all address the same entry.
//!
//! ## Example
//!
//! ```
//! use keyhint_metadata::{sanitize, MetadataDocument};
//!
//! let doc = MetadataDocument::from_slice(
//!     br#"{"properties":[{"name":"server.port","type":"java.lang.Integer"}]}"#,
//! )
//! .unwrap();
//! assert_eq!(doc.properties.len(), 1);
//! assert_eq!(sanitize("serverPort"), sanitize("server-port"));
//! ```

mod docs;
mod document;
mod error;
mod path;
mod value_type;

pub use docs::declaration_link;
pub use document::{
    Deprecation, GroupRecord, HintRecord, HintValue, MetadataDocument, PropertyRecord,
};
pub use error::{MetadataError, Result};
pub use path::{
    flatten_keys, join_path, sanitize, sanitized_segments, to_path_segments, PATH_SEPARATOR,
};
pub use value_type::{remove_generics, shortened_type, ValueKind};

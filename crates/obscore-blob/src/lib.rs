//! Content-addressed blob store decoupling large media payloads from the
//! event log.

mod error;
mod ext;
mod store;

pub use error::{Error, Result};
pub use ext::extension_for_mime;
pub use store::{BlobStore, StoredBlob};

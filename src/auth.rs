//! Auth-domain identifiers, credential records, and lease models.

pub mod id;
pub mod lock;
pub mod record;
pub mod secret;

pub use id::*;
pub use lock::*;
pub use record::*;
pub use secret::*;

//! The "media" bucket: a flat directory of uploaded files plus the policy
//! deciding what may be stored in it.

pub mod policy;
pub mod storage;

pub use policy::{MediaPolicy, PolicyError};
pub use storage::Storage;

//! Transport between the authority and its replicas.

mod link;

pub use link::{LinkError, LoopbackLink};

//! Built-in identity backend adapters.

pub(crate) mod http;
pub mod managed_cloud;
pub mod self_hosted;

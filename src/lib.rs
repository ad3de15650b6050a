pub mod client;
pub mod error;
pub mod multipart;
pub mod proxy;
pub mod types;

pub use client::{Credentials, DecaptcherClient, DecaptcherConfig, DEFAULT_ENDPOINT};
pub use error::Error;
pub use proxy::ProxyConfig;
pub use types::{codes, PicId, SolveResult};

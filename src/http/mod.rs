pub mod client;
pub mod transport;
pub mod types;

// Re-export commonly used types for convenient access
pub use client::{DEFAULT_REQUEST_TIMEOUT, ReqwestTransport};
pub use transport::{HttpTransport, TransportError};
pub use types::{Method, host_header_value};

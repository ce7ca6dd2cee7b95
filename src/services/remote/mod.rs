pub mod client;
pub mod sync;
pub mod transport;

pub use client::{Platform, StoreClient, VersionInfo};
pub use sync::{PushTarget, RemoteSync};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Method, Transport};

mod backend;
mod backends;
mod result;

pub use backend::PersonDetector;
pub use backends::StubBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use result::Detection;

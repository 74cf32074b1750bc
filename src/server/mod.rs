pub mod error;
pub mod framer;
pub mod handler;
pub mod quota;
pub mod scanner;

pub use error::ApiError;
pub use framer::{FrameMode, Framer, FramingStrategy, StreamSession};
pub use handler::{build_router, AppState};
pub use quota::{Caller, GuestQuota, QuotaDecision, QuotaGate};

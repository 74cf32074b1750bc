mod gemini;
mod record;
mod request;

pub use gemini::{Candidate, GeminiContent, GeminiPart, GeminiRequest, GeminiStreamChunk};
pub use record::{Record, RecordValue, Tag};
pub use request::{is_valid_model_name, GenerateRequest, Mode};

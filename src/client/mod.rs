pub mod decoder;
pub mod error;
pub mod exchange;
pub mod history;
pub mod parser;
pub mod reducer;
pub mod refresh;
pub mod transport;

pub use decoder::{decode_lines, LineDecoder};
pub use error::{ClientError, LOGIN_MESSAGE, RETRY_MESSAGE};
pub use exchange::{run_exchange, ExchangeSession};
pub use history::{HistorySink, JsonlHistory, MemoryHistory};
pub use parser::{parse_record, ParseError, ParsedLine, RecordParser};
pub use reducer::{
    ExchangeEvent, ExchangeReducer, ExchangeSnapshot, ExchangeUpdate, Phase, Transition,
};
pub use refresh::{CredentialStore, Credentials, HttpTokenRefresher, SingleFlight, TokenRefresher};
pub use transport::{ByteStream, OpenedStream, TranslateClient};

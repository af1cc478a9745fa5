pub mod session_csv;

pub use session_csv::{parse_timestamp, read_sessions, SessionCsvFileSource};

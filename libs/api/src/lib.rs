pub mod error;
pub mod types;
pub mod util;

pub use error::DecodeError;
pub use types::{ConnectionState, ReadyState, Record, TopicEntry};
pub use util::{MAX_SAFE_INTEGER, now_ms, safe_int_value_i64, safe_int_value_u64};

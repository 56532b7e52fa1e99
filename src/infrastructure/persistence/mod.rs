//! JSON persistence for collected records

mod session_writer;

pub use session_writer::{
    record_file_name, sanitize_filename, save_records, save_responses, PersistenceError,
    DEFAULT_MAX_NAME_LEN, PLACEHOLDER_NAME,
};

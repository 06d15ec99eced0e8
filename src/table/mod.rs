pub mod output;
pub mod reader;
pub mod record;
pub mod scale;
pub mod writer;

pub use output::OutputBatch;
pub use reader::{header_columns, TableReader};
pub use record::{format_number, Record, Sentinel, Value};
pub use writer::TableWriter;

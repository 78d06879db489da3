pub mod date;
pub mod logging;

pub use date::{format_date, DateFormat};
pub use logging::truncate_text;

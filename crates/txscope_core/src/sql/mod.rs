//! Raw SQL inspection used for bind routing and the transient guard.
//!
//! Both helpers work on text only and never touch a connection.

mod guard;
mod tables;

pub use guard::{ensure_transient, NON_TRANSIENT_KEYWORDS};
pub use tables::{RegexTableExtractor, TableNameExtractor};

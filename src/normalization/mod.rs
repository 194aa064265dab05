//! Total normalizers for noisy wiki display fields. Pure functions, no I/O;
//! every input maps to a value or a documented fallback, never an error.

pub mod date;
pub mod earnings;
pub mod placement;

pub use date::parse_date;
pub use earnings::parse_earnings;
pub use placement::parse_placement;

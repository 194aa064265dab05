//! HTML extraction: qualifying-table detection and raw row streams, plus the
//! tournament-name strategies layered on top of them.

pub mod table;
pub mod tournament;

pub use table::{
    qualifying_tables, tables, CellLink, ColumnMap, RawCell, RawRow, ResultsTable, WikiTable,
};
pub use tournament::{slug_key, slugify, tournament_key, tournament_name, NameContext};

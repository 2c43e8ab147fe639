pub mod spreadsheet;

pub use spreadsheet::{read_rows, SheetFormat};

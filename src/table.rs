pub mod table;
pub mod sort;


pub use table::{Attr, Cell, Row, Table};

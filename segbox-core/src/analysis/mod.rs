pub mod bbox;
pub mod extract;

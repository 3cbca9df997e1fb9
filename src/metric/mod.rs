pub mod key;
pub mod output;

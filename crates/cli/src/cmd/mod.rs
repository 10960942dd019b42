pub mod count;
pub mod detect;
pub mod parse;

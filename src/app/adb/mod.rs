pub mod input;
pub mod locator;
pub mod parse;
pub mod runner;

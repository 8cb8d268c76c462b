pub mod hunspell;
pub mod manager;

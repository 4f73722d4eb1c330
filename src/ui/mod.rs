pub mod detail;
pub mod ui;

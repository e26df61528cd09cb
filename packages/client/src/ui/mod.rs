//! UI 層
//!
//! ターミナル向けの表示整形と対話ループ。

pub mod formatter;
pub mod repl;

pub use formatter::MessageFormatter;

pub mod fortunes;
pub mod tokens;

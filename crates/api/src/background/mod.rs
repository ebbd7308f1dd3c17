pub mod daily_bonus;
pub mod fortune_retention;
pub mod memory_sweep;

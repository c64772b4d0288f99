pub mod deal;
pub mod debt;
pub mod stress;

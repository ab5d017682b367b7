pub mod interleave;
pub mod units;

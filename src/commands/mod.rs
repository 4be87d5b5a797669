pub mod check;
pub mod serve;
pub mod status;

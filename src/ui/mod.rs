pub mod output;
pub mod progress;

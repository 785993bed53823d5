pub mod manager;

pub use manager::{milestone_crossed, progress_percentage, FundingManager};

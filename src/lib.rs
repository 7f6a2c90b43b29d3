pub mod feed;
pub mod model;
pub mod progress;
pub mod recorder;
pub mod run;
pub mod stats;
pub mod worker;

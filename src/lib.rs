pub mod types;
pub mod config;
pub mod circuit;
pub mod dedup;
pub mod technical;
pub mod sentiment;
pub mod combine;
pub mod confidence;
pub mod engine;
pub mod sources {
    pub mod alphavantage;
    pub mod twitter;
    pub mod reddit;
    pub mod openai;
}

pub use types::*;
pub use engine::{PredictOptions, PredictionEngine};
pub use sources::alphavantage::AlphaVantageClient;
pub use sources::openai::OpenAiClient;
pub use sources::reddit::RedditClient;
pub use sources::twitter::TwitterClient;

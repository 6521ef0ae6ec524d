mod ai;
mod cloudflare;
mod health;
mod metrics;
mod search;
mod youtube;

pub use ai::ai_chat_handler;
pub use cloudflare::{purge_handler, verify_handler};
pub use health::health_handler;
pub use metrics::metrics_handler;
pub use search::search_handler;
pub use youtube::youtube_handler;

//! News Watch — Telegram channel watcher that forwards relevant posts and
//! emails summaries of the articles they link to.

pub mod channels;
pub mod config;
pub mod error;
pub mod extract;
pub mod llm;
pub mod pipeline;

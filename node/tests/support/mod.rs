//! 契約テスト共通のヘルパー

pub mod host;
pub mod http;
pub mod node;

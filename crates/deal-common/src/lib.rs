pub mod error;
pub mod mcp_api;
pub mod model;
pub mod openai;
pub mod redis;
pub mod settings;

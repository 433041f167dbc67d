mod auth;
mod export_cache;

pub use auth::Token;
pub use auth::TokenManager;
pub use export_cache::FileExportCache;

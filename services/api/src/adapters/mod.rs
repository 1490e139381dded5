pub mod cache;
pub mod db;
pub mod deepseek;
pub mod files;

pub use cache::{DbCache, InMemoryCache};
pub use db::DbAdapter;
pub use deepseek::DeepSeekTransport;
pub use files::FsTemplateSource;

pub mod db;
pub mod generation_llm;
pub mod providers;

pub use db::DbAdapter;
pub use generation_llm::{OfflineGenerationAdapter, OpenAiGenerationAdapter};
pub use providers::DataProviderRegistry;

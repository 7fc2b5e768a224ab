pub mod db;
pub mod generation;

pub use db::DbAdapter;
pub use generation::LlmGenerationAdapter;

pub mod openai_compat;
pub mod registry;
pub mod spark;
pub mod traits;
pub mod util;

// Re-exports for convenience.
pub use openai_compat::OpenAiCompatProvider;
pub use registry::BackendRegistry;
pub use spark::signer::SparkCredentials;
pub use spark::SparkProvider;
pub use traits::{ChatBackend, ChatRequest};

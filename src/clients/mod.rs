pub mod llm_client;
pub mod mock;
pub mod model_client;

pub use llm_client::LlmClient;
pub use mock::MockModelClient;
pub use model_client::{Completion, ContentPart, ModelClient, ModelRequest, OutputFormat};

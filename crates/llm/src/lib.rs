pub mod classifier;
pub mod provider;
pub mod providers;

pub use classifier::{BoundaryClassifier, ClassifyError, RetryPolicy, WindowSignal};
pub use provider::{LlmError, LlmProvider, Message, Role};

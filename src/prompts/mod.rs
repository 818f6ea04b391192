/// Prompt storage, version history, and the remix tree
mod forks;
mod store;
mod versions;

pub use forks::{ForkManager, RemixNode, DEFAULT_REMIX_DEPTH_CAP};
pub use store::{NewPrompt, PromptFeedPage, PromptQuery, PromptStore, PromptUpdate};
pub use versions::VersionManager;

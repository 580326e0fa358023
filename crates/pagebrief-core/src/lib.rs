pub mod classifier;
pub mod config;
pub mod credentials;
pub mod dispatcher;
pub mod error;
pub mod page;
pub mod presentation;
pub mod prompt;
pub mod providers;
pub mod session;
pub mod stream;

pub use classifier::{ArticleCandidate, Classifier};
pub use config::AppConfig;
pub use error::{Error, Result};
pub use session::{SessionController, SessionDeps, TriggerSource};

pub mod app;
pub mod event;
pub mod input;
pub mod keymap;
pub mod prompt;
pub mod theme;
pub mod widgets;

pub use app::App;
pub use prompt::TuiSecretPrompt;

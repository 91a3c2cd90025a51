pub mod config;
pub mod events;
pub mod language;

pub use config::Config;
pub use events::{AppEvent, KeyboardEvent};
pub use language::{ImeMode, InputState, LanguageSample};

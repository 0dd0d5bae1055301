pub mod ollama;
pub mod open_meteo;
pub mod openai;
pub mod wttr;

use std::time::Duration;

/// Upper bound on a single embedding or generation request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

pub use ollama::{OllamaEmbedder, OllamaGenerator};
pub use open_meteo::OpenMeteoWeather;
pub use openai::OpenAiChatGenerator;
pub use wttr::WttrWeather;

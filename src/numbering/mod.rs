//! Invoice number generation: sequence policies, formatting, settings and
//! the locked generate-and-persist service.

pub mod clock;
pub mod config;
pub mod formatter;
pub mod generators;
pub mod registry;
pub mod service;

pub use clock::{FixedClock, SystemClock};
pub use config::NumberingConfig;
pub use formatter::{format_number, InvoiceNumberFormatter, MAX_PADDING};
pub use generators::Generator;
pub use registry::{GeneratorFactory, GeneratorRegistry};
pub use service::{NumberGenerationService, GENERATOR_LOCK_NAME};

pub mod console;
pub mod traits;

pub use console::ConsoleNotifier;
pub use traits::AlertNotifier;

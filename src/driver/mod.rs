pub mod cli;
mod driver;
mod external_tools;

pub use cli::Cli;
pub use driver::Driver;

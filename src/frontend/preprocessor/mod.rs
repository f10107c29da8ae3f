mod conditionals;
mod expr_eval;
mod includes;
mod macro_defs;
mod preprocessor;

pub use preprocessor::Preprocessor;

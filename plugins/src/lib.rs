pub mod error;
pub mod factory;
pub mod rules;

pub use error::RulesSourceError;
pub use factory::{build_interpreter_factory, build_rules, resolve_interpreter};
pub use rules::{load_rule_file, parse_rules, Action, RuleFile};

//! SQLite storage implementation for mapping rules and the decision log.

mod decision_repository;
mod model;
mod rule_repository;
mod seed;

pub use decision_repository::MappingDecisionRepository;
pub use model::{MappingDecisionDB, MappingRuleDB, NewMappingDecisionDB, NewMappingRuleDB};
pub use rule_repository::MappingRuleRepository;
pub use seed::default_seed_rules;

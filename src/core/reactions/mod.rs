mod reaction_roles;

pub use reaction_roles::{missing_reactions, ReactionRoleBinding, ReactionRoleRegistry};

// Reaction roles: which roles a reaction on a configured message grants.

use dashmap::DashMap;
use serde::Deserialize;
use std::collections::HashMap;

/// One configured message, as read from `REACTION_ROLES`:
/// `[{"channel_id": 1, "message_id": 2, "roles": {"✅": [3, 4]}}]`
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ReactionRoleBinding {
    pub channel_id: u64,
    pub message_id: u64,
    pub roles: HashMap<String, Vec<u64>>,
}

#[derive(Default)]
pub struct ReactionRoleRegistry {
    by_message: DashMap<u64, HashMap<String, Vec<u64>>>,
}

impl ReactionRoleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bindings(bindings: &[ReactionRoleBinding]) -> Self {
        let registry = Self::new();
        for binding in bindings {
            registry.merge(binding.message_id, &binding.roles);
        }
        registry
    }

    /// Merge a mapping into whatever is registered for the message. Later
    /// bindings win for the same emoji; blank emoji keys are ignored.
    pub fn merge(&self, message_id: u64, mapping: &HashMap<String, Vec<u64>>) {
        let mut entry = self.by_message.entry(message_id).or_default();
        for (emoji, roles) in mapping {
            if !emoji.trim().is_empty() {
                entry.insert(emoji.clone(), roles.clone());
            }
        }
    }

    /// Roles mapped to `emoji` on `message_id`; empty when nothing matches.
    pub fn roles_for(&self, message_id: u64, emoji: &str) -> Vec<u64> {
        self.by_message
            .get(&message_id)
            .and_then(|mapping| mapping.get(emoji).cloned())
            .unwrap_or_default()
    }

    pub fn is_tracked(&self, message_id: u64) -> bool {
        self.by_message.contains_key(&message_id)
    }
}

/// Emojis from `mapping` the message does not carry yet, in a stable order.
pub fn missing_reactions(existing: &[String], mapping: &HashMap<String, Vec<u64>>) -> Vec<String> {
    let mut missing: Vec<String> = mapping
        .keys()
        .filter(|emoji| !emoji.trim().is_empty() && !existing.contains(emoji))
        .cloned()
        .collect();
    missing.sort();
    missing
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(pairs: &[(&str, &[u64])]) -> HashMap<String, Vec<u64>> {
        pairs
            .iter()
            .map(|(emoji, roles)| (emoji.to_string(), roles.to_vec()))
            .collect()
    }

    #[test]
    fn bindings_parse_from_json() {
        let raw = r#"[{"channel_id": 10, "message_id": 20, "roles": {"✅": [1, 2], "<:val:99>": [3]}}]"#;
        let bindings: Vec<ReactionRoleBinding> = serde_json::from_str(raw).unwrap();
        let registry = ReactionRoleRegistry::from_bindings(&bindings);

        assert_eq!(registry.roles_for(20, "✅"), vec![1, 2]);
        assert_eq!(registry.roles_for(20, "<:val:99>"), vec![3]);
        assert!(registry.roles_for(20, "❌").is_empty());
        assert!(registry.roles_for(21, "✅").is_empty());
    }

    #[test]
    fn mappings_for_the_same_message_merge() {
        let registry = ReactionRoleRegistry::new();
        registry.merge(5, &mapping(&[("🎲", &[1])]));
        registry.merge(5, &mapping(&[("💼", &[2]), ("", &[9])]));

        assert!(registry.is_tracked(5));
        assert_eq!(registry.roles_for(5, "🎲"), vec![1]);
        assert_eq!(registry.roles_for(5, "💼"), vec![2]);
        assert!(registry.roles_for(5, "").is_empty());
    }

    #[test]
    fn only_missing_reactions_are_added() {
        let wanted = mapping(&[("🔴", &[1]), ("🔵", &[2]), ("🟢", &[3])]);
        let existing = vec!["🔵".to_string()];
        let missing = missing_reactions(&existing, &wanted);
        assert_eq!(missing.len(), 2);
        assert!(!missing.contains(&"🔵".to_string()));
    }
}

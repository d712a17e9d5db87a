// The entry form new members fill in before they lose the Unverified role.

/// Answers from the entry modal.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryForm {
    pub riot_id: String,
    pub birth_year: String,
    pub current_tier: String,
    pub peak_tier: String,
    pub inviter: String,
}

impl EntryForm {
    /// The inviter as a mention when the answer carries a Discord id,
    /// otherwise the raw answer.
    pub fn inviter_display(&self) -> String {
        match find_snowflake(&self.inviter) {
            Some(id) => format!("<@{id}>"),
            None if self.inviter.trim().is_empty() => "-".to_string(),
            None => self.inviter.trim().to_string(),
        }
    }
}

/// First run of 17 to 19 digits in `text`.
pub fn find_snowflake(text: &str) -> Option<u64> {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i].is_ascii_digit() {
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            let run = &text[start..i];
            if run.len() >= 17 {
                // A longer run still starts with a valid id.
                return run[..run.len().min(19)].parse().ok();
            }
        } else {
            i += 1;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(inviter: &str) -> EntryForm {
        EntryForm {
            riot_id: "Connect#CAN".into(),
            birth_year: "1998".into(),
            current_tier: "Silver 2".into(),
            peak_tier: "Gold 3".into(),
            inviter: inviter.into(),
        }
    }

    #[test]
    fn inviter_ids_become_mentions() {
        assert_eq!(
            form("burger / 123456789012345678").inviter_display(),
            "<@123456789012345678>"
        );
        assert_eq!(form("<@12345678901234567>").inviter_display(), "<@12345678901234567>");
    }

    #[test]
    fn other_inviters_are_kept_verbatim() {
        assert_eq!(form("k00wh").inviter_display(), "k00wh");
        assert_eq!(form("born 1998").inviter_display(), "born 1998");
        assert_eq!(form("  ").inviter_display(), "-");
    }

    #[test]
    fn snowflake_search() {
        assert_eq!(find_snowflake("id:1234567890123456789!"), Some(1234567890123456789));
        assert_eq!(find_snowflake("1234567890123456"), None);
        assert_eq!(find_snowflake("12345678901234567890"), Some(1234567890123456789));
    }
}

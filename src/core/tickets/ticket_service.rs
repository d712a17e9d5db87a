// Support tickets: channel naming, close permissions and the HTML transcript
// posted to the history channel when a ticket is closed.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use std::fmt::Write;
use thiserror::Error;

pub const TICKET_PREFIX: &str = "ticket-";
pub const TRANSCRIPT_MESSAGE_LIMIT: u8 = 100;

#[derive(Debug, Error, PartialEq)]
pub enum TicketError {
    #[error("You already have an open ticket: <#{0}>")]
    AlreadyOpen(u64),

    #[error("This channel is not a ticket")]
    NotATicket,

    #[error("Only the ticket owner or support can close this ticket")]
    NotAllowed,
}

pub fn ticket_channel_name(user_id: u64) -> String {
    format!("{TICKET_PREFIX}{user_id}")
}

/// Owner id encoded in a ticket channel name.
pub fn ticket_owner(channel_name: &str) -> Result<u64, TicketError> {
    channel_name
        .strip_prefix(TICKET_PREFIX)
        .and_then(|id| id.parse().ok())
        .ok_or(TicketError::NotATicket)
}

/// The owner and holders of the support role may close a ticket.
pub fn can_close(
    channel_name: &str,
    user_id: u64,
    user_roles: &[u64],
    support_role: Option<u64>,
) -> Result<u64, TicketError> {
    let owner = ticket_owner(channel_name)?;
    let is_support = support_role.is_some_and(|role| user_roles.contains(&role));
    if user_id == owner || is_support {
        Ok(owner)
    } else {
        Err(TicketError::NotAllowed)
    }
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

pub struct TranscriptAttachment {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

pub struct TranscriptMessage {
    pub author: String,
    pub avatar_url: Option<String>,
    pub sent_at: DateTime<Utc>,
    pub content: String,
    pub attachments: Vec<TranscriptAttachment>,
}

pub struct TranscriptMeta {
    pub channel_name: String,
    pub created_at: DateTime<Utc>,
    pub owner: String,
    pub generated_by: String,
    pub generated_at: DateTime<Utc>,
}

const TRANSCRIPT_CSS: &str = r#"
body { margin: 0; padding: 20px; background: #1F1F23; color: #E1E1E6; font-family: 'Inter', sans-serif; }
.container { max-width: 800px; margin: 0 auto; }
.header { text-align: center; margin-bottom: 30px; }
.header h1 { margin: 0; color: #FFD369; font-size: 2.4em; }
.header .meta { font-size: 0.9em; color: #A3A3A3; margin-top: 8px; }
.messages { display: flex; flex-direction: column; gap: 20px; }
.msg { display: flex; align-items: flex-start; gap: 12px; }
.avatar { width: 48px; height: 48px; border-radius: 50%; flex-shrink: 0; }
.bubble { background: #2C2C33; border-radius: 14px; padding: 14px 18px; max-width: calc(100% - 60px); }
.username { font-weight: 600; color: #FFFFFF; }
.timestamp { font-size: 0.8em; color: #8B8B8B; margin-left: 10px; }
.text { margin-top: 8px; line-height: 1.5; white-space: pre-wrap; }
img.attachment { max-width: 100%; border-radius: 8px; margin-top: 12px; }
.footer { text-align: center; margin-top: 40px; font-size: 0.8em; color: #7A7A7A; }
"#;

/// Render a standalone HTML transcript. Messages are expected oldest first;
/// attachments are inlined as data URIs so the file has no external images.
pub fn render_transcript(meta: &TranscriptMeta, messages: &[TranscriptMessage]) -> String {
    let mut body = String::new();

    for m in messages {
        let _ = write!(
            body,
            r#"
<div class="msg">
  <img class="avatar" src="{avatar}" alt="avatar">
  <div class="bubble">
    <span class="username">{name}</span>
    <span class="timestamp">{when}</span>
    <div class="text">{content}</div>"#,
            avatar = escape_html(m.avatar_url.as_deref().unwrap_or("")),
            name = escape_html(&m.author),
            when = m.sent_at.format("%Y-%m-%d %H:%M"),
            content = escape_html(&m.content),
        );

        for att in &m.attachments {
            let _ = write!(
                body,
                r#"
    <img class="attachment" src="data:{ctype};base64,{data}" alt="{name}">"#,
                ctype = escape_html(att.content_type.as_deref().unwrap_or("image/png")),
                data = STANDARD.encode(&att.bytes),
                name = escape_html(&att.filename),
            );
        }

        body.push_str("\n  </div>\n</div>");
    }

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="UTF-8">
  <style>{css}</style>
</head>
<body>
  <div class="container">
    <div class="header">
      <h1>Transcript for {channel}</h1>
      <p class="meta">Created: {created} • Owner: {owner}</p>
    </div>
    <div class="messages">{body}
    </div>
    <div class="footer">Generated by {bot} on {generated}</div>
  </div>
</body>
</html>"#,
        css = TRANSCRIPT_CSS,
        channel = escape_html(&meta.channel_name),
        created = meta.created_at.format("%Y-%m-%d %H:%M UTC"),
        owner = escape_html(&meta.owner),
        bot = escape_html(&meta.generated_by),
        generated = meta.generated_at.format("%Y-%m-%d %H:%M UTC"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn channel_names_round_trip_the_owner() {
        assert_eq!(ticket_channel_name(42), "ticket-42");
        assert_eq!(ticket_owner("ticket-42"), Ok(42));
        assert_eq!(ticket_owner("general"), Err(TicketError::NotATicket));
        assert_eq!(ticket_owner("ticket-abc"), Err(TicketError::NotATicket));
    }

    #[test]
    fn owner_or_support_may_close() {
        assert_eq!(can_close("ticket-42", 42, &[], Some(9)), Ok(42));
        assert_eq!(can_close("ticket-42", 7, &[9], Some(9)), Ok(42));
        assert_eq!(
            can_close("ticket-42", 7, &[9], None),
            Err(TicketError::NotAllowed)
        );
        assert_eq!(
            can_close("ticket-42", 7, &[1], Some(9)),
            Err(TicketError::NotAllowed)
        );
    }

    #[test]
    fn transcript_escapes_and_inlines_attachments() {
        let meta = TranscriptMeta {
            channel_name: "ticket-42".into(),
            created_at: at("2024-06-01T10:00:00Z"),
            owner: "neon".into(),
            generated_by: "Studio Bot".into(),
            generated_at: at("2024-06-01T11:00:00Z"),
        };
        let messages = vec![
            TranscriptMessage {
                author: "neon".into(),
                avatar_url: None,
                sent_at: at("2024-06-01T10:01:00Z"),
                content: "<script>alert('x')</script> & more".into(),
                attachments: vec![],
            },
            TranscriptMessage {
                author: "support".into(),
                avatar_url: Some("https://cdn.example/a.png".into()),
                sent_at: at("2024-06-01T10:02:00Z"),
                content: "see image".into(),
                attachments: vec![TranscriptAttachment {
                    filename: "shot.png".into(),
                    content_type: Some("image/png".into()),
                    bytes: b"hi".to_vec(),
                }],
            },
        ];

        let html = render_transcript(&meta, &messages);

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("Transcript for ticket-42"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;alert(&#x27;x&#x27;)&lt;/script&gt; &amp; more"));
        assert!(html.contains("data:image/png;base64,aGk="));
        assert!(html.contains("2024-06-01 10:01"));
        let first = html.find("neon</span>").unwrap();
        let second = html.find("support</span>").unwrap();
        assert!(first < second);
    }
}

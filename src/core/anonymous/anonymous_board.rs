// Anonymous board: members DM the bot and it reposts the message without
// their name. Staff still get the author through the log channel.

use thiserror::Error;

pub const MAX_ATTACHMENT_BYTES: u64 = 50 * 1024 * 1024;

pub const ALLOWED_EXTENSIONS: [&str; 10] = [
    "gif", "jpeg", "jpg", "mov", "mp3", "mp4", "pdf", "png", "txt", "wav",
];

const IMAGE_EXTENSIONS: [&str; 4] = ["gif", "jpeg", "jpg", "png"];

#[derive(Debug, Error, PartialEq)]
pub enum AnonymousError {
    #[error("{0} is larger than 50 MiB")]
    TooLarge(String),

    #[error("{0} has no file extension")]
    MissingExtension(String),

    #[error(".{0} files are not allowed. Allowed: {list}", list = ALLOWED_EXTENSIONS.join(", "))]
    ExtensionNotAllowed(String),

    #[error("Send some text or a file to post")]
    EmptyPost,
}

/// What the board needs to know about an attachment before reposting it.
#[derive(Debug, Clone, PartialEq)]
pub struct AttachmentInfo {
    pub filename: String,
    pub size: u64,
}

fn extension(filename: &str) -> Option<String> {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .filter(|ext| !ext.is_empty())
}

pub fn is_image(filename: &str) -> bool {
    extension(filename).is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

/// Check a DM before it is posted. Returns the attachment to show inline as
/// the embed image, if the first one is a picture.
pub fn check_post<'a>(
    content: &str,
    attachments: &'a [AttachmentInfo],
) -> Result<Option<&'a AttachmentInfo>, AnonymousError> {
    if content.trim().is_empty() && attachments.is_empty() {
        return Err(AnonymousError::EmptyPost);
    }
    for attachment in attachments {
        if attachment.size > MAX_ATTACHMENT_BYTES {
            return Err(AnonymousError::TooLarge(attachment.filename.clone()));
        }
        let ext = extension(&attachment.filename)
            .ok_or_else(|| AnonymousError::MissingExtension(attachment.filename.clone()))?;
        if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
            return Err(AnonymousError::ExtensionNotAllowed(ext));
        }
    }
    Ok(attachments.first().filter(|a| is_image(&a.filename)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, size: u64) -> AttachmentInfo {
        AttachmentInfo {
            filename: name.to_string(),
            size,
        }
    }

    #[test]
    fn text_only_posts_pass() {
        assert_eq!(check_post("hello", &[]), Ok(None));
        assert_eq!(check_post("   ", &[]), Err(AnonymousError::EmptyPost));
    }

    #[test]
    fn first_picture_becomes_the_embed_image() {
        let files = [file("Meme.PNG", 1_000), file("notes.txt", 10)];
        assert_eq!(check_post("", &files), Ok(Some(&files[0])));

        let files = [file("notes.txt", 10), file("meme.png", 1_000)];
        assert_eq!(check_post("", &files), Ok(None));
    }

    #[test]
    fn attachments_are_validated() {
        assert_eq!(
            check_post("x", &[file("clip.mp4", MAX_ATTACHMENT_BYTES + 1)]),
            Err(AnonymousError::TooLarge("clip.mp4".to_string()))
        );
        assert_eq!(
            check_post("x", &[file("README", 10)]),
            Err(AnonymousError::MissingExtension("README".to_string()))
        );
        assert_eq!(
            check_post("x", &[file("tool.exe", 10)]),
            Err(AnonymousError::ExtensionNotAllowed("exe".to_string()))
        );
        assert!(check_post("x", &[file("song.MP3", MAX_ATTACHMENT_BYTES)]).is_ok());
    }
}

mod anonymous_board;

pub use anonymous_board::{check_post, AttachmentInfo};

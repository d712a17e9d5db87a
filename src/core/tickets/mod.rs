mod ticket_service;

pub use ticket_service::{
    can_close, render_transcript, ticket_channel_name, TicketError, TranscriptAttachment,
    TranscriptMessage, TranscriptMeta, TRANSCRIPT_MESSAGE_LIMIT,
};

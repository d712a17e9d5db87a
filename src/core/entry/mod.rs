mod entry_form;

pub use entry_form::EntryForm;

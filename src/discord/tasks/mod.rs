mod background_tasks;

pub use background_tasks::spawn_all;

pub mod scheduled_sync;

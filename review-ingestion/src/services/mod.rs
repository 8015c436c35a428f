pub mod browser;
pub mod clova;
pub mod event_stream;

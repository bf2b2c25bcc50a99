pub mod content_api;

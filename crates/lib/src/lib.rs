//! Docent core library — session identity, upload relay, conversation controller and the
//! document-QA backend client, used by both the CLI and desktop applications.

pub mod backend;
pub mod config;
pub mod conversation;
pub mod init;
pub mod session;
pub mod storage;

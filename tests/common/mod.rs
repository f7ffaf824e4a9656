use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use polyglot_messenger::chat::notify::Notification;
use polyglot_messenger::{ChatSession, ConversationStore, Language};

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}

/// Offline session whose notifications are recorded
#[allow(dead_code)]
pub fn recording_session(language: Language) -> (ChatSession, Arc<Mutex<Vec<Notification>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let mut session = ChatSession::new(ConversationStore::new(language, Default::default()));
    session.subscribe(Box::new(move |n: &Notification| {
        sink.lock().unwrap().push(n.clone());
    }));
    (session, seen)
}

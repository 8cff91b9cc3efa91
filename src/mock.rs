// канал команд с заранее записанными ответами модуля, для тестов
use std::collections::HashMap;
use std::string::{String, ToString};
use std::vec::Vec;

use crate::traits::CommandChannel;

pub struct MockChannel {
    replies: HashMap<String, String>,
    fallback: String,
    pub sent: Vec<String>,
}

impl MockChannel {
    pub fn new() -> Self {
        MockChannel {
            replies: HashMap::new(),
            fallback: "\r\nERROR\r\n".to_string(),
            sent: Vec::new(),
        }
    }

    pub fn reply(mut self, command: &str, response: &str) -> Self {
        self.replies.insert(command.to_string(), response.to_string());
        self
    }
}

impl CommandChannel for MockChannel {
    fn send(&mut self, command: &str) -> &str {
        self.sent.push(command.to_string());
        self.replies.get(command).unwrap_or(&self.fallback)
    }
}

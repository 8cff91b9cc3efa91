///--------------------------------------------------------------
/// Разбор списка SMS из ответа AT+CMGL="ALL" (текстовый режим)
///--------------------------------------------------------------
use alloc::vec::Vec;

use heapless::String;
use log::{debug, warn};

use crate::grammar::{split_lines, tokens, truncate_into, Token};
use crate::phonebook::SIM800_NUMBER_LEN;
use crate::traits::CommandChannel;

pub const SMS_ID_LEN: usize = 8; // длина номера ячейки сообщения
pub const SMS_TEXT_LEN: usize = 480; // максимальная длина текста сообщения

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageStatus {
    ReceivedUnread,
    ReceivedRead,
    StoredUnsent,
    StoredSent,
    Unknown,
}

impl MessageStatus {
    fn parse(text: &str) -> Self {
        match text {
            "REC UNREAD" => MessageStatus::ReceivedUnread,
            "REC READ" => MessageStatus::ReceivedRead,
            "STO UNSENT" => MessageStatus::StoredUnsent,
            "STO SENT" => MessageStatus::StoredSent,
            _ => MessageStatus::Unknown,
        }
    }
}

/// Время из заголовка SMS как его прислал модуль, без учёта часового пояса
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    /// смещение пояса в четвертях часа (`+08` = UTC+2), к полям выше не применяется
    pub utc_offset_quarters: Option<i8>,
}

impl Timestamp {
    /// Разбор `YY/MM/DD,HH:MM:SS+TZ`, год считается от 2000.
    pub fn parse(text: &str) -> Option<Self> {
        let (date, time) = text.trim().split_once(',')?;

        let mut date = date.split('/');
        let year: u16 = date.next()?.parse().ok()?;
        let month = parse_field(date.next()?, 1..=12)?;
        let day = parse_field(date.next()?, 1..=31)?;
        if date.next().is_some() || year > 99 {
            return None;
        }

        let (clock, zone) = match time.find(|c: char| c == '+' || c == '-') {
            Some(pos) => (&time[..pos], Some(&time[pos..])),
            None => (time, None),
        };
        let mut clock = clock.split(':');
        let hour = parse_field(clock.next()?, 0..=23)?;
        let minute = parse_field(clock.next()?, 0..=59)?;
        let second = parse_field(clock.next()?, 0..=59)?;
        if clock.next().is_some() {
            return None;
        }

        Some(Timestamp {
            year: 2000 + year,
            month,
            day,
            hour,
            minute,
            second,
            utc_offset_quarters: zone.and_then(|zone| zone.parse().ok()),
        })
    }
}

fn parse_field(text: &str, range: core::ops::RangeInclusive<u8>) -> Option<u8> {
    let value = text.parse().ok()?;
    if range.contains(&value) {
        Some(value)
    } else {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedSmsMessage {
    pub message_id: String<SMS_ID_LEN>,
    pub status: MessageStatus,
    pub sender_number: String<SIM800_NUMBER_LEN>,
    pub timestamp: Option<Timestamp>,
    pub text: String<SMS_TEXT_LEN>,
}

impl ReceivedSmsMessage {
    pub fn list<C: CommandChannel>(channel: &mut C) -> Vec<ReceivedSmsMessage> {
        Self::to_messages(channel.send(r#"AT+CMGL="ALL""#))
    }

    /// Разбор ответа AT+CMGL:
    ///
    /// ```text
    /// +CMGL: 2,"REC READ","+421918987987","","13/08/20,19:00:44+08"
    /// line1
    ///
    /// line2
    /// +CMGL: 1,"REC READ","+421918123123","","13/08/20,19:00:24+08"
    /// test1
    /// ```
    ///
    /// Сообщения возвращаются в обратном порядке: последний блок ответа
    /// становится первым элементом. Пустые строки в конце текста отрезаются,
    /// внутри текста сохраняются. Нет заголовков - пустой список.
    pub fn to_messages(raw: &str) -> Vec<ReceivedSmsMessage> {
        let mut messages = Vec::new();
        let mut current: Option<Block<'_>> = None;

        for line in split_lines(strip_final_ok(raw)) {
            match Header::parse(line) {
                Some(header) => {
                    if let Some(block) = current.take() {
                        messages.push(block.finish());
                    }
                    current = Some(Block::new(header));
                }
                // эхо команды и мусор до первого заголовка пропускаются
                None => {
                    if let Some(block) = current.as_mut() {
                        block.push_line(line);
                    }
                }
            }
        }
        if let Some(block) = current {
            messages.push(block.finish());
        }

        messages.reverse();
        debug!("CMGL: {} messages", messages.len());
        messages
    }
}

// финальный OK модуля не относится к тексту последнего сообщения
fn strip_final_ok(raw: &str) -> &str {
    let trimmed = raw.trim_end_matches(|c: char| c == '\r' || c == '\n');
    match trimmed.strip_suffix("OK") {
        Some(rest) if rest.is_empty() || rest.ends_with('\n') => rest,
        _ => raw,
    }
}

struct Header<'a> {
    id: &'a str,
    status: &'a str,
    sender: &'a str,
    timestamp: &'a str,
}

impl<'a> Header<'a> {
    // +CMGL: <id>,"<stat>","<oa>","<alpha>","<scts>"
    // некоторые модули теряют открывающую кавычку у <scts>: ...,"",21/10/29,16:30:00+12"
    fn parse(line: &'a str) -> Option<Self> {
        let rest = line.trim_start().strip_prefix("+CMGL:")?;
        let mut header = Header {
            id: rest.split(',').next().unwrap_or("").trim(),
            status: "",
            sender: "",
            timestamp: "",
        };
        let mut quoted = 0;
        for token in tokens(rest) {
            match token {
                Token::Quoted(value) => {
                    match quoted {
                        0 => header.status = value,
                        1 => header.sender = value,
                        3 => header.timestamp = value,
                        _ => {}
                    }
                    quoted += 1;
                }
                Token::Bare(text) | Token::Unterminated(text) if quoted == 3 => {
                    let text = text.trim_matches(|c: char| c == ',' || c.is_whitespace());
                    if !text.is_empty() && header.timestamp.is_empty() {
                        header.timestamp = text;
                    }
                }
                _ => {}
            }
        }
        Some(header)
    }
}

/// Заголовок и накопленный текст одного сообщения
struct Block<'a> {
    header: Header<'a>,
    text: String<SMS_TEXT_LEN>,
    lines: usize,     // строк уже попало в текст
    blank_run: usize, // пустые строки, ждущие следующей непустой
    truncated: bool,
}

impl<'a> Block<'a> {
    fn new(header: Header<'a>) -> Self {
        Block {
            header,
            text: String::new(),
            lines: 0,
            blank_run: 0,
            truncated: false,
        }
    }

    fn push_line(&mut self, line: &str) {
        if line.is_empty() {
            // попадут в текст только если за ними будет ещё что-то
            self.blank_run += 1;
            return;
        }
        let separators = if self.lines == 0 {
            self.blank_run
        } else {
            self.blank_run + 1
        };
        for _ in 0..separators {
            self.push_str("\n");
        }
        self.push_str(line);
        self.lines += self.blank_run + 1;
        self.blank_run = 0;
    }

    fn push_str(&mut self, s: &str) {
        if self.truncated {
            return;
        }
        for ch in s.chars() {
            if self.text.push(ch).is_err() {
                self.truncated = true;
                return;
            }
        }
    }

    fn finish(self) -> ReceivedSmsMessage {
        let (message_id, _) = truncate_into(self.header.id);
        let (sender_number, _) = truncate_into(self.header.sender);
        if self.truncated {
            warn!("CMGL: text of message {} truncated", message_id);
        }
        ReceivedSmsMessage {
            message_id,
            status: MessageStatus::parse(self.header.status),
            sender_number,
            timestamp: Timestamp::parse(self.header.timestamp),
            text: self.text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const RAW_SIM_OUTPUT1: &str = "AT+CMGL=\"ALL\"
+CMGL: 2,\"REC READ\",\"+421918987987\",\"\",\"13/08/20,19:00:44+08\"
line1
line2

line3

+CMGL: 1,\"REC READ\",\"+421918123123\",\"\",\"13/08/20,19:00:24+08\"
test1
";

    #[test]
    fn test_newlines_in_message_text() {
        let messages = ReceivedSmsMessage::to_messages(RAW_SIM_OUTPUT1);
        assert_eq!(messages.len(), 2);
        let (m1, m2) = (&messages[0], &messages[1]);

        assert_eq!(m1.text, "test1");
        assert_eq!(m1.sender_number, "+421918123123");
        assert_eq!(m1.message_id, "1");

        assert_eq!(m2.sender_number, "+421918987987");
        assert_eq!(m2.message_id, "2");
        assert_eq!(m2.text, "line1\nline2\n\nline3");
        assert_eq!(m2.status, MessageStatus::ReceivedRead);
    }

    #[test]
    fn test_timestamp_is_parsed() {
        let messages = ReceivedSmsMessage::to_messages(RAW_SIM_OUTPUT1);
        let t = messages[0].timestamp.unwrap();
        assert_eq!(
            t,
            Timestamp {
                year: 2013,
                month: 8,
                day: 20,
                hour: 19,
                minute: 0,
                second: 24,
                utc_offset_quarters: Some(8),
            }
        );
    }

    #[test]
    fn test_timestamp_negative_zone_and_garbage() {
        let t = Timestamp::parse("21/10/29,16:30:00-16").unwrap();
        assert_eq!(t.utc_offset_quarters, Some(-16));
        assert_eq!(t.hour, 16);
        assert!(Timestamp::parse("").is_none());
        assert!(Timestamp::parse("21/13/29,16:30:00+12").is_none());
        assert!(Timestamp::parse("21/10/29").is_none());
    }

    #[test]
    fn test_no_messages() {
        let messages = ReceivedSmsMessage::to_messages("AT+CMGL=\"ALL\"    \n");
        assert!(messages.is_empty());
        assert!(ReceivedSmsMessage::to_messages("\r\nOK\r\n").is_empty());
    }

    #[test]
    fn test_crlf_and_final_ok() {
        let raw = "\r\n+CMGL: 5,\"REC UNREAD\",\"111\",\"\",\"22/01/10,20:50:06+12\"\r\n\r\nbalance\r\nOK?\r\n\r\n\r\nOK\r\n";
        let messages = ReceivedSmsMessage::to_messages(raw);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text, "\nbalance\nOK?");
        assert_eq!(messages[0].status, MessageStatus::ReceivedUnread);
    }

    #[test]
    fn test_blank_header_fields() {
        let messages = ReceivedSmsMessage::to_messages("+CMGL: 3,\"\",\"\"\nhello");
        assert_eq!(messages.len(), 1);
        let m = &messages[0];
        assert_eq!(m.message_id, "3");
        assert_eq!(m.sender_number, "");
        assert_eq!(m.status, MessageStatus::Unknown);
        assert_eq!(m.timestamp, None);
        assert_eq!(m.text, "hello");
    }

    #[test]
    fn test_timestamp_without_opening_quote() {
        let messages = ReceivedSmsMessage::to_messages(
            "+CMGL: 4,\"REC READ\",\"+79850000000\",\"\",21/10/29,16:30:00+12\"\r\nTest\r\n",
        );
        let m = &messages[0];
        assert_eq!(m.sender_number, "+79850000000");
        assert_eq!(m.text, "Test");
        let t = m.timestamp.unwrap();
        assert_eq!((t.year, t.month, t.day), (2021, 10, 29));
        assert_eq!((t.hour, t.minute, t.second), (16, 30, 0));
        assert_eq!(t.utc_offset_quarters, Some(12));
    }

    #[test]
    fn test_timestamp_without_closing_quote() {
        let messages = ReceivedSmsMessage::to_messages(
            "+CMGL: 4,\"REC READ\",\"111\",\"\",\"21/10/29,16:30:00+12\r\nTest",
        );
        assert_eq!(messages[0].timestamp.map(|t| t.day), Some(29));
    }

    #[test]
    fn test_many_messages_last_block_comes_first() {
        let mut raw = std::string::String::from("AT+CMGL=\"ALL\"\r\r\n");
        for id in 1..=40 {
            raw.push_str(&std::format!(
                "+CMGL: {},\"REC READ\",\"+4219181{:05}\",\"\",\"13/08/20,19:00:24+08\"\r\nbody {}\r\n",
                id, id, id
            ));
        }
        raw.push_str("\r\nOK\r\n");
        let messages = ReceivedSmsMessage::to_messages(&raw);
        assert_eq!(messages.len(), 40);
        assert_eq!(messages[0].message_id, "40");
        assert_eq!(messages[0].text, "body 40");
        assert_eq!(messages[39].message_id, "1");
    }

    #[test]
    fn test_long_text_is_truncated() {
        let mut raw = std::string::String::from("+CMGL: 1,\"REC READ\",\"1\",\"\",\"\"\n");
        for _ in 0..60 {
            raw.push_str("0123456789\n");
        }
        let messages = ReceivedSmsMessage::to_messages(&raw);
        assert_eq!(messages[0].text.len(), SMS_TEXT_LEN);
        assert!(messages[0].text.starts_with("0123456789\n0123"));
    }
}

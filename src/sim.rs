///--------------------------------------------------------------
/// Доступ к данным SIM карты через один канал команд
///--------------------------------------------------------------
use core::fmt::Write;

use alloc::vec::Vec;

use heapless::String;
use log::warn;

use crate::errors::Error;
use crate::grammar::split_lines;
use crate::phonebook::Phonebook;
use crate::signal::SignalQuality;
use crate::sms::ReceivedSmsMessage;
use crate::traits::CommandChannel;

/// SIM карта за каналом команд.
///
/// Все запросы идут строго по очереди: `&mut self` не даёт отправить
/// новую команду, пока не разобран ответ на предыдущую.
pub struct SimCard<C> {
    channel: C,
}

impl<C: CommandChannel> SimCard<C> {
    pub fn new(channel: C) -> Self {
        SimCard { channel }
    }

    pub fn into_inner(self) -> C {
        self.channel
    }

    pub fn signal_quality(&mut self) -> SignalQuality {
        SignalQuality::query(&mut self.channel)
    }

    /// Телефонная книга SIM. Каждый вызов создаёт новый кэш и заново
    /// читает границы индексов.
    pub fn phonebook(&mut self) -> Result<Phonebook<&mut C>, Error> {
        Phonebook::new(&mut self.channel)
    }

    // set the SMS mode to text
    pub fn set_text_mode(&mut self) -> Result<(), Error> {
        self.send_expect_ok("AT+CMGF=1")
    }

    /// Все сообщения с SIM, в обратном порядке относительно ответа модуля
    pub fn messages(&mut self) -> Vec<ReceivedSmsMessage> {
        ReceivedSmsMessage::list(&mut self.channel)
    }

    /// Удаление сообщения по его номеру ячейки (`message_id`)
    pub fn delete_message(&mut self, message_id: &str) -> Result<(), Error> {
        if message_id.is_empty() || !message_id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidMessageId);
        }
        let mut cmd: String<24> = String::new();
        write!(cmd, "AT+CMGD={}", message_id)?;
        self.send_expect_ok(&cmd)
    }

    fn send_expect_ok(&mut self, cmd: &str) -> Result<(), Error> {
        let raw = self.channel.send(cmd);
        if split_lines(raw).any(|line| line.trim() == "OK") {
            return Ok(());
        }
        warn!("{}: not confirmed, got {:?}", cmd, raw);
        Err(Error::CommandFailed)
    }
}

//! Разбор ответов GSM модулей (SIM800 и подобных) на AT команды:
//! телефонная книга SIM карты, список принятых SMS и уровень сигнала.
//!
//! Сам обмен с модулем скрыт за [`CommandChannel`]: отправили команду,
//! получили весь текст ответа. Для UART есть готовый [`SerialChannel`].
#![cfg_attr(not(test), no_std)]

extern crate alloc;

mod errors;
mod grammar;
mod phonebook;
mod serial;
mod signal;
mod sim;
mod sms;
mod traits;

#[cfg(test)]
mod mock;

pub use crate::errors::Error;
pub use crate::grammar::{
    contains_error, match_number_pair, match_range, quoted_values, split_lines,
    split_quoted_fields, tokens, truncate_into, Token,
};
pub use crate::phonebook::{
    classify_slot, Phonebook, PhonebookEntry, SlotOutcome, DEFAULT_TAIL_LENGTH,
    PHONEBOOK_NAME_LEN, SIM800_NUMBER_LEN,
};
pub use crate::serial::{SerialChannel, SerialConfig, SIM800_RCV_BUF_LEN};
pub use crate::signal::SignalQuality;
pub use crate::sim::SimCard;
pub use crate::sms::{
    MessageStatus, ReceivedSmsMessage, Timestamp, SMS_ID_LEN, SMS_TEXT_LEN,
};
pub use crate::traits::CommandChannel;

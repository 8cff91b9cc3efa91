///--------------------------------------------------------------
/// Телефонная книга SIM карты
///--------------------------------------------------------------
use alloc::vec::Vec;
use core::cell::OnceCell;
use core::fmt::Write;

use heapless::String;
use log::{debug, warn};

use crate::errors::Error;
use crate::grammar::{contains_error, match_range, quoted_values, split_lines};
use crate::traits::CommandChannel;

pub const SIM800_NUMBER_LEN: usize = 40; // длина буфера телефонного номера SIM800
pub const PHONEBOOK_NAME_LEN: usize = 32; // длина буфера имени контакта
/// по скольким последним символам сравниваются номера при нечётком поиске
pub const DEFAULT_TAIL_LENGTH: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhonebookEntry {
    pub index: u16,
    pub phone_number: String<SIM800_NUMBER_LEN>,
    pub name: String<PHONEBOOK_NAME_LEN>,
}

impl PhonebookEntry {
    // None, если номер или имя не помещаются в буфер
    fn new(index: u16, phone_number: &str, name: &str) -> Option<Self> {
        let mut entry = PhonebookEntry {
            index,
            phone_number: String::new(),
            name: String::new(),
        };
        entry.phone_number.push_str(phone_number).ok()?;
        entry.name.push_str(name).ok()?;
        Some(entry)
    }
}

/// Результат чтения одной ячейки книги командой AT+CPBR=<n>
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotOutcome<'a> {
    Entry { phone_number: &'a str, name: &'a str },
    /// `ERROR`, `+CME ERROR: n` или ответ без `+CPBR:` - ячейка пустая
    EmptySlot,
    Malformed(&'a str),
}

pub fn classify_slot(raw: &str) -> SlotOutcome<'_> {
    if contains_error(raw) {
        return SlotOutcome::EmptySlot;
    }
    // +CPBR: 100,"+421903219222",145,"John/1"
    let mut values = quoted_values(raw);
    match (values.next(), values.next()) {
        (Some(phone_number), Some(name)) => SlotOutcome::Entry { phone_number, name },
        _ if raw.contains("+CPBR:") => SlotOutcome::Malformed(raw),
        _ => SlotOutcome::EmptySlot,
    }
}

/// Телефонная книга SIM карты с кэшем записей.
///
/// При создании выбирается книга `SM` и читаются границы индексов.
/// Записи читаются с модуля один раз, при первом вызове [`Phonebook::all_entries`],
/// дальше отдаются из кэша. Чтобы перечитать книгу, нужен новый объект.
pub struct Phonebook<C> {
    channel: C,
    min_index: u16,
    max_index: u16,
    number_length: Option<u16>,
    text_length: Option<u16>,
    entries: OnceCell<Vec<PhonebookEntry>>,
}

impl<C: CommandChannel> Phonebook<C> {
    pub fn new(mut channel: C) -> Result<Self, Error> {
        // select phonebook memory storage
        if !channel.send(r#"AT+CPBS="SM""#).contains("OK") {
            warn!("Phonebook: unable to switch to SIM phonebook");
            return Err(Error::PhonebookSelect);
        }

        // +CPBR: (1-250),40,14
        let raw = channel.send("AT+CPBR=?");
        let bounds = split_lines(raw)
            .find_map(|line| match_range(line).ok().map(|range| (range, field_lengths(line))));
        let ((min_index, max_index), (number_length, text_length)) = match bounds {
            Some(bounds) => bounds,
            None => {
                warn!("Phonebook: unable to load basic info from {:?}", raw);
                return Err(Error::PhonebookRange);
            }
        };
        if min_index > max_index {
            warn!("Phonebook: inverted range ({}-{})", min_index, max_index);
            return Err(Error::PhonebookRange);
        }
        debug!("Phonebook: indexes {}..={}", min_index, max_index);

        Ok(Phonebook {
            channel,
            min_index,
            max_index,
            number_length,
            text_length,
            entries: OnceCell::new(),
        })
    }

    pub fn min_index(&self) -> u16 {
        self.min_index
    }

    pub fn max_index(&self) -> u16 {
        self.max_index
    }

    /// максимальная длина номера, которую сообщил модуль
    pub fn number_length(&self) -> Option<u16> {
        self.number_length
    }

    /// максимальная длина имени, которую сообщил модуль
    pub fn text_length(&self) -> Option<u16> {
        self.text_length
    }

    pub fn is_loaded(&self) -> bool {
        self.entries.get().is_some()
    }

    /// Все записи книги по возрастанию индекса.
    ///
    /// Первый вызов опрашивает каждую ячейку от `min_index` до `max_index`
    /// по очереди, что может занять заметное время. Повторные вызовы
    /// к модулю не обращаются.
    pub fn all_entries(&mut self) -> &[PhonebookEntry] {
        let channel = &mut self.channel;
        let (min_index, max_index) = (self.min_index, self.max_index);
        self.entries
            .get_or_init(|| load_entries(channel, min_index, max_index))
    }

    /// Поиск по последним `tail_length` символам номера, чтобы находить
    /// записи независимо от национального или международного формата.
    /// Возвращает первую подходящую запись.
    ///
    /// Номер короче `tail_length` символов (или `tail_length == 0`) - ошибка
    /// [`Error::QueryTooShort`], книга при этом не читается. Записи с номером
    /// короче хвоста никогда не совпадают.
    pub fn fuzzy_search_by_number(
        &mut self,
        phone_number: &str,
        tail_length: usize,
    ) -> Result<Option<&PhonebookEntry>, Error> {
        let query = tail(phone_number, tail_length).ok_or(Error::QueryTooShort)?;
        Ok(self
            .all_entries()
            .iter()
            .find(|entry| tail(&entry.phone_number, tail_length) == Some(query)))
    }
}

fn load_entries<C: CommandChannel>(
    channel: &mut C,
    min_index: u16,
    max_index: u16,
) -> Vec<PhonebookEntry> {
    let mut entries = Vec::new();
    let mut cmd: String<16> = String::new();
    for index in min_index..=max_index {
        cmd.clear();
        // "AT+CPBR=65535" всегда помещается
        write!(cmd, "AT+CPBR={}", index).ok();
        match classify_slot(channel.send(&cmd)) {
            SlotOutcome::EmptySlot => {}
            SlotOutcome::Malformed(raw) => {
                warn!("CPBR {}: unreadable reply {:?}", index, raw);
            }
            SlotOutcome::Entry { phone_number, name } => {
                if phone_number.is_empty() || name.is_empty() {
                    debug!("CPBR {}: blank number or name, skipped", index);
                    continue;
                }
                match PhonebookEntry::new(index, phone_number, name) {
                    Some(entry) => entries.push(entry),
                    None => warn!("CPBR {}: number or name too long, skipped", index),
                }
            }
        }
    }
    debug!("Phonebook: {} entries loaded", entries.len());
    entries
}

// числа после диапазона: (1-250),40,14 -> (40, 14)
fn field_lengths(line: &str) -> (Option<u16>, Option<u16>) {
    let rest = line.find(')').map_or("", |pos| &line[pos + 1..]);
    let mut fields = rest.split(',').skip(1).map(|field| field.trim().parse().ok());
    (fields.next().flatten(), fields.next().flatten())
}

// последние len символов строки
fn tail(text: &str, len: usize) -> Option<&str> {
    if len == 0 {
        return None;
    }
    text.char_indices()
        .rev()
        .nth(len - 1)
        .map(|(pos, _)| &text[pos..])
}

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// модуль не подтвердил AT+CPBS="SM"
    PhonebookSelect,
    /// в ответе AT+CPBR=? нет диапазона индексов (или он перевёрнут)
    PhonebookRange,
    /// нет шаблона (low-high) в тексте
    MalformedRange,
    /// номер для поиска короче хвоста сравнения
    QueryTooShort,
    // команда не вернула OK
    CommandFailed,
    /// номер сообщения не число
    InvalidMessageId,
    FmtError,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::PhonebookSelect => f.write_str("Phonebook: unable to switch to SIM phonebook"),
            Error::PhonebookRange => f.write_str("Phonebook: unable to load index range"),
            Error::MalformedRange => f.write_str("no (low-high) range in response"),
            Error::QueryTooShort => f.write_str("phone number is shorter than the search tail"),
            Error::CommandFailed => f.write_str("command was not confirmed with OK"),
            Error::InvalidMessageId => f.write_str("message id is not a number"),
            Error::FmtError => f.write_str("command buffer overflow"),
        }
    }
}

impl From<core::fmt::Error> for Error {
    fn from(_: core::fmt::Error) -> Self {
        Error::FmtError
    }
}

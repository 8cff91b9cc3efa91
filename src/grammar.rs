///--------------------------------------------------------------
/// Общие функции разбора текстовых ответов модуля
///--------------------------------------------------------------
use heapless::String;

use crate::errors::Error;

/// Кусок строки между кавычками `"`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    /// текст вне кавычек: запятые, числа, пробелы
    Bare(&'a str),
    /// значение в закрытых кавычках
    Quoted(&'a str),
    /// кавычка открыта, но до конца строки не закрыта
    Unterminated(&'a str),
}

/// Разбиение ответа на строки. Концом строки считается `\n`,
/// все `\r` в конце строки отрезаются. Пустые строки сохраняются.
pub fn split_lines(raw: &str) -> impl Iterator<Item = &str> {
    raw.split('\n').map(|line| line.trim_end_matches('\r'))
}

/// Разбиение строки по символу `"`: на чётных позициях текст вне кавычек,
/// на нечётных значения в кавычках. Запятые внутри кавычек не мешают.
pub fn split_quoted_fields(line: &str) -> impl Iterator<Item = &str> {
    line.split('"')
}

pub fn tokens(line: &str) -> impl Iterator<Item = Token<'_>> {
    let quotes = line.matches('"').count();
    split_quoted_fields(line)
        .enumerate()
        .map(move |(i, part)| {
            if i % 2 == 0 {
                Token::Bare(part)
            } else if i < quotes {
                Token::Quoted(part)
            } else {
                // после последней кавычки закрывающей нет
                Token::Unterminated(part)
            }
        })
}

/// Только значения в закрытых кавычках, по порядку
pub fn quoted_values(line: &str) -> impl Iterator<Item = &str> {
    tokens(line).filter_map(|token| match token {
        Token::Quoted(value) => Some(value),
        _ => None,
    })
}

/// Первое вхождение шаблона `(<цифры>-<цифры>)`
pub fn match_range(text: &str) -> Result<(u16, u16), Error> {
    for (start, _) in text.match_indices('(') {
        if let Some(range) = range_at(&text[start + 1..]) {
            return Ok(range);
        }
    }
    Err(Error::MalformedRange)
}

fn range_at(text: &str) -> Option<(u16, u16)> {
    let (low, rest) = take_digits(text)?;
    let (high, rest) = take_digits(rest.strip_prefix('-')?)?;
    if !rest.starts_with(')') {
        return None;
    }
    Some((low.parse().ok()?, high.parse().ok()?))
}

/// Первое вхождение шаблона `<цифры>,<цифры>`, например `15,99` в `+CSQ: 15,99`.
/// Если числа не помещаются в u32, пары нет.
pub fn match_number_pair(text: &str) -> Option<(u32, u32)> {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if !bytes[i].is_ascii_digit() {
            i += 1;
            continue;
        }
        if let Some((first, rest)) = take_digits(&text[i..]) {
            if let Some((second, _)) = rest.strip_prefix(',').and_then(take_digits) {
                return Some((first.parse().ok()?, second.parse().ok()?));
            }
            i += first.len();
        }
    }
    None
}

/// непустая последовательность ASCII цифр в начале строки и остаток
fn take_digits(text: &str) -> Option<(&str, &str)> {
    let end = text
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(text.len());
    if end == 0 {
        None
    } else {
        Some(text.split_at(end))
    }
}

/// `ERROR` и `+CME ERROR: n` одинаково считаются ошибкой
pub fn contains_error(raw: &str) -> bool {
    raw.contains("ERROR")
}

/// Копирование текста в буфер фиксированной длины без разрыва символов.
/// Второе значение true, если текст пришлось обрезать.
pub fn truncate_into<const N: usize>(text: &str) -> (String<N>, bool) {
    let mut out: String<N> = String::new();
    for ch in text.chars() {
        if out.push(ch).is_err() {
            return (out, true);
        }
    }
    (out, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec::Vec;

    #[test]
    fn test_split_lines_handles_crlf_and_lf() {
        let lines: Vec<&str> = split_lines("AT+CPBR=?\r\r\n+CPBR: (1-250),40,14\r\n\r\nOK\n").collect();
        assert_eq!(lines, ["AT+CPBR=?", "+CPBR: (1-250),40,14", "", "OK", ""]);
    }

    #[test]
    fn test_split_quoted_fields_keeps_positions() {
        let fields: Vec<&str> =
            split_quoted_fields("+CPBR: 100,\"+421903219222\",145,\"John/1\"").collect();
        assert_eq!(fields, ["+CPBR: 100,", "+421903219222", ",145,", "John/1", ""]);
    }

    #[test]
    fn test_quoted_values_tolerate_commas_inside_quotes() {
        let values: Vec<&str> = quoted_values("+CPBR: 7,\"123\",129,\"Doe, John\"").collect();
        assert_eq!(values, ["123", "Doe, John"]);
    }

    #[test]
    fn test_unterminated_quote_is_not_a_value() {
        let values: Vec<&str> = quoted_values("+CPBR: 7,\"123\",129,\"Jo").collect();
        assert_eq!(values, ["123"]);
        assert_eq!(tokens("\"Jo").last(), Some(Token::Unterminated("Jo")));
    }

    #[test]
    fn test_match_range() {
        assert_eq!(match_range("+CPBR: (1-250),40,14"), Ok((1, 250)));
        assert_eq!(match_range("(x) (-3) (10-20)"), Ok((10, 20)));
        assert_eq!(match_range("+CPBR: 40,14"), Err(Error::MalformedRange));
        assert_eq!(match_range("(1-99999999)"), Err(Error::MalformedRange));
        assert_eq!(match_range("(1-250"), Err(Error::MalformedRange));
    }

    #[test]
    fn test_match_number_pair() {
        assert_eq!(match_number_pair("+CSQ: 15,99"), Some((15, 99)));
        assert_eq!(match_number_pair("+CSQ: 7, 1,3"), Some((1, 3)));
        assert_eq!(match_number_pair("+CSQ: 15"), None);
        assert_eq!(match_number_pair("+CSQ: 99999999999,1"), None);
    }

    #[test]
    fn test_contains_error() {
        assert!(contains_error("\r\nERROR\r\n"));
        assert!(contains_error("\r\n+CME ERROR: 22\r\n"));
        assert!(!contains_error("\r\nOK\r\n"));
    }

    #[test]
    fn test_truncate_into_respects_char_boundaries() {
        let (short, cut): (String<4>, bool) = truncate_into("abc");
        assert_eq!(short, "abc");
        assert!(!cut);

        let (cyr, cut): (String<5>, bool) = truncate_into("ёжик");
        assert_eq!(cyr, "ёж");
        assert!(cut);
    }
}

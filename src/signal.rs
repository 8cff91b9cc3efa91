use log::debug;

use crate::grammar::{match_number_pair, split_lines};
use crate::traits::CommandChannel;

/// Уровень сигнала по ответу AT+CSQ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SignalQuality {
    /// dBm, None если модуль ответил 99 или вне диапазона 0..=31
    pub signal_strength: Option<i16>,
    /// RXQUAL 0..=7, None если 99 или неизвестно
    pub bit_error_rate: Option<u8>,
}

impl SignalQuality {
    pub fn query<C: CommandChannel>(channel: &mut C) -> Self {
        Self::decode(channel.send("AT+CSQ"))
    }

    /// Разбор ответа вида `+CSQ: 15,0\r\n\r\nOK`.
    /// Нет строки или чисел - уровень неизвестен, ошибкой это не считается.
    pub fn decode(raw: &str) -> Self {
        let pair = split_lines(raw)
            .find(|line| line.contains("+CSQ: "))
            .and_then(match_number_pair);
        match pair {
            Some((rssi, ber)) => SignalQuality {
                signal_strength: rssi_to_dbm(rssi),
                bit_error_rate: match ber {
                    0..=7 => Some(ber as u8),
                    _ => None,
                },
            },
            None => {
                debug!("CSQ: no signal data in {:?}", raw);
                SignalQuality::default()
            }
        }
    }
}

// линейная шкала 27.007: 0 -> -113 dBm ... 31 -> -51 dBm, 99 - не известно
fn rssi_to_dbm(rssi: u32) -> Option<i16> {
    match rssi {
        0..=31 => Some(2 * rssi as i16 - 113),
        _ => None,
    }
}

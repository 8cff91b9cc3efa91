///--------------------------------------------------------------
/// Обмен AT командами с модулем через последовательный порт
///--------------------------------------------------------------
use embedded_hal::serial::{Read, Write};
use embedded_hal::timer::CountDown;
use heapless::Vec;
use log::{debug, warn};
use nb::block;

use crate::traits::CommandChannel;

pub const SIM800_RCV_BUF_LEN: usize = 1600; // длина буфера приёма данных от SIM800 по умолчанию
const RESULT_LINE_LEN: usize = 64; // хвост строки, по которому ищем итоговый код после переполнения

/// Таймауты ожидания ответа в тиках таймера
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialConfig {
    /// сколько тиков ждать первый символ ответа
    pub first_char_ticks: u16,
    /// сколько тиков тишины после очередного символа считать концом ответа
    pub idle_ticks: u16,
}

impl Default for SerialConfig {
    fn default() -> Self {
        SerialConfig {
            first_char_ticks: 100,
            idle_ticks: 10,
        }
    }
}

/// Канал команд поверх UART и таймера отсчёта таймаутов.
///
/// Повторов нет: если модуль не ответил, возвращается пустая строка.
/// Ответ длиннее буфера `N` обрезается, остаток вычитывается из порта и
/// выбрасывается.
pub struct SerialChannel<P, T: CountDown, const N: usize = SIM800_RCV_BUF_LEN> {
    port: P,
    timer: T,
    tick: T::Time,
    config: SerialConfig,
    rcv_buf: Vec<u8, N>,
}

impl<P, T> SerialChannel<P, T>
where
    P: Read<u8> + Write<u8>,
    T: CountDown,
    T::Time: Clone,
{
    pub fn new(port: P, timer: T, tick: T::Time, config: SerialConfig) -> Self {
        Self::with_buffer(port, timer, tick, config)
    }
}

impl<P, T, const N: usize> SerialChannel<P, T, N>
where
    P: Read<u8> + Write<u8>,
    T: CountDown,
    T::Time: Clone,
{
    /// Канал с буфером приёма на `N` байт
    pub fn with_buffer(port: P, timer: T, tick: T::Time, config: SerialConfig) -> Self {
        SerialChannel {
            port,
            timer,
            tick,
            config,
            rcv_buf: Vec::new(),
        }
    }

    pub fn release(self) -> (P, T) {
        (self.port, self.timer)
    }

    // читаем мусор из порта и игнорим все ошибки
    fn drain(&mut self) {
        for _ in 0..SIM800_RCV_BUF_LEN {
            match self.port.read() {
                Ok(_) => {}
                Err(nb::Error::WouldBlock) => break,
                Err(nb::Error::Other(_)) => {
                    warn!("SIM e0: serial error while draining");
                    break;
                }
            }
        }
    }

    fn transmit(&mut self, command: &str) {
        debug!("TX: {}", command);
        for byte in command.bytes().chain(*b"\r\n") {
            if block!(self.port.write(byte)).is_err() {
                warn!("SIM e3: serial write error");
                return;
            }
        }
        block!(self.port.flush()).ok();
    }

    fn receive(&mut self) {
        self.rcv_buf.clear();
        self.timer.start(self.tick.clone()); // reset timeout counter
        let mut got_first_char = false; // признак, что получили что-то из порта
        let mut waited: u16 = 0; // сработавших тиков с последнего символа
        let mut overflowed = false;
        let mut line: Vec<u8, RESULT_LINE_LEN> = Vec::new(); // текущая строка после переполнения
        loop {
            match self.port.read() {
                Err(nb::Error::Other(_)) => {
                    warn!("SIM e1: serial read error");
                    break;
                }
                Err(nb::Error::WouldBlock) => {
                    // символ не пришёл ещё
                    if self.timer.wait().is_err() {
                        continue;
                    }
                    let limit = if got_first_char {
                        self.config.idle_ticks
                    } else {
                        self.config.first_char_ticks
                    };
                    if waited >= limit {
                        break; // вылет по таймауту
                    }
                    waited += 1;
                }
                Ok(byte) => {
                    got_first_char = true;
                    waited = 0;
                    self.timer.start(self.tick.clone()); // timeout timer restart after each byte recieved
                    if !overflowed {
                        // защита от переполнения буфера
                        if self.rcv_buf.push(byte).is_ok() {
                            if byte == b'\n' && ends_with_final_result(&self.rcv_buf) {
                                break;
                            }
                            continue;
                        }
                        warn!("SIM: receive buffer full ({} bytes), rest of reply discarded", N);
                        overflowed = true;
                        // начало текущей строки уже в буфере
                        let start = self
                            .rcv_buf
                            .iter()
                            .rposition(|b| *b == b'\n')
                            .map_or(0, |pos| pos + 1);
                        if line.extend_from_slice(&self.rcv_buf[start..]).is_err() {
                            line.clear();
                        }
                    }
                    if byte == b'\n' {
                        if is_final_result(&line) {
                            break;
                        }
                        line.clear();
                    } else {
                        line.push(byte).ok(); // длинная строка не итоговый код, хвост не нужен
                    }
                }
            }
        }
        if self.rcv_buf.is_empty() {
            warn!("SIM nrsp");
        }
    }
}

impl<P, T, const N: usize> CommandChannel for SerialChannel<P, T, N>
where
    P: Read<u8> + Write<u8>,
    T: CountDown,
    T::Time: Clone,
{
    fn send(&mut self, command: &str) -> &str {
        self.drain();
        self.transmit(command);
        self.receive();
        let response = valid_utf8_prefix(&self.rcv_buf);
        debug!("RX: {:?}", response);
        response
    }
}

// последняя строка буфера - итоговый код ответа модуля
fn ends_with_final_result(buf: &[u8]) -> bool {
    let body = buf.strip_suffix(b"\n").unwrap_or(buf);
    let line = match body.iter().rposition(|b| *b == b'\n') {
        Some(pos) => &body[pos + 1..],
        None => body,
    };
    is_final_result(line)
}

fn is_final_result(line: &[u8]) -> bool {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    line == b"OK"
        || line == b"ERROR"
        || line.starts_with(b"+CME ERROR")
        || line.starts_with(b"+CMS ERROR")
}

// модуль может прислать обрывок символа, берём только корректный UTF-8
fn valid_utf8_prefix(buf: &[u8]) -> &str {
    match core::str::from_utf8(buf) {
        Ok(text) => text,
        Err(e) => core::str::from_utf8(&buf[..e.valid_up_to()]).unwrap_or(""),
    }
}

/// характеристика указывает, что через объект можно общаться с модулем AT командами
///
/// Команда передаётся без завершающего `\r\n`, его добавляет транспорт.
/// Ответ возвращается целиком, вместе с финальным `OK`/`ERROR`.
/// Ошибок нет: всё, что не удалось получить, просто отсутствует в тексте.
pub trait CommandChannel {
    fn send(&mut self, command: &str) -> &str;
}

impl<C: CommandChannel + ?Sized> CommandChannel for &mut C {
    fn send(&mut self, command: &str) -> &str {
        (**self).send(command)
    }
}

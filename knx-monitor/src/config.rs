use std::time::Duration;

/// Стандартный порт KNXnet/IP
pub(crate) const KNX_PORT: u16 = 3671;

/// Сколько ждём CONNECT_RESPONSE
pub(crate) const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Интервал CONNECTIONSTATE_REQUEST (шлюз рвёт туннель после 120 с тишины)
pub(crate) const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(60);

/// Сколько ждём CONNECTIONSTATE_RESPONSE
pub(crate) const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(10);

/// Сколько CONNECTIONSTATE_REQUEST подряд без ответа считаем обрывом
pub(crate) const HEARTBEAT_ATTEMPTS: u32 = 3;

/// Тик чтения UDP-сокета (проверка shutdown)
pub(crate) const UDP_SOCKET_TICK: Duration = Duration::from_millis(200);

/// Тик основного цикла мониторинга
pub(crate) const MONITOR_TICK: Duration = Duration::from_millis(200);

/// Ёмкость канала событий tunnel -> monitor
pub(crate) const EVENT_CHANNEL_CAPACITY: usize = 1024;

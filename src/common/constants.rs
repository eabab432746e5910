//! Константы для queryeval

/// Профилирующая инструкция: выполняет запрос, собирает счетчики буферов,
/// не замеряет время по узлам и возвращает дерево плана в JSON
pub const EXPLAIN_PREFIX: &str = "EXPLAIN (ANALYZE, BUFFERS, COSTS ON, TIMING OFF, FORMAT JSON)";

/// Диагностическая инструкция с замером времени по узлам
pub const EXPLAIN_TIMING_PREFIX: &str = "EXPLAIN (ANALYZE, BUFFERS, COSTS ON, TIMING ON, FORMAT JSON)";

/// Сколько самых медленных узлов сохраняется из плана с TIMING ON
pub const TIMING_PLAN_TOP_NODES: usize = 20;

/// Статический таймаут по умолчанию (в секундах)
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 60;

/// Запас времени поверх statement_timeout для процесса клиента
pub const DRIVER_GRACE_SECONDS: u64 = 5;

/// Веса (чтения, стоимость) без замеров времени
pub const DEFAULT_WEIGHTS_NO_TIME: (f64, f64) = (0.85, 0.15);

/// Веса (чтения, время, стоимость) с замерами времени
pub const DEFAULT_WEIGHTS_WITH_TIME: (f64, f64, f64) = (0.5, 0.4, 0.1);

/// Допуск при проверке суммы весов
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

/// Порог Парето по умолчанию
pub const DEFAULT_BOTTLENECKS_PARETO: f64 = 0.90;

/// Количество узких мест в режиме top-K по умолчанию
pub const DEFAULT_BOTTLENECKS_TOP: usize = 5;

/// Относительный допуск для колонок с плавающей точкой
pub const DEFAULT_FLOAT_EPSILON: f64 = 1e-9;

/// Сколько расхождений строк попадает в отчет
pub const DEFAULT_MAX_REPORTED_MISMATCHES: usize = 10;

/// Во сколько раз должна улучшиться основная метрика в A/B эксперименте
pub const AB_REQUIRED_IMPROVEMENT_FACTOR: f64 = 2.0;

/// Допустимый регресс любой отслеживаемой метрики (1.10 = +10%)
pub const AB_MAX_REGRESSION_RATIO: f64 = 1.10;

/// Сколько успешных замеров нужно, чтобы включился динамический таймаут
pub const DYNAMIC_TIMEOUT_MIN_SAMPLES: usize = 3;

/// Размер окна истории для динамического таймаута
pub const DYNAMIC_TIMEOUT_WINDOW: usize = 16;

/// Множитель над самым медленным недавним замером
pub const DYNAMIC_TIMEOUT_FACTOR: f64 = 3.0;

/// Нижняя граница динамического таймаута (в миллисекундах)
pub const DYNAMIC_TIMEOUT_FLOOR_MS: u64 = 1000;

/// Максимальная длина фильтра в отчете об узких местах
pub const MAX_FILTER_SAMPLE_CHARS: usize = 140;

/// Маркер NULL в выводе psql
pub const PSQL_NULL_MARKER: &str = "\u{1}NULL\u{1}";

/// Разделитель полей в выводе psql
pub const PSQL_FIELD_SEPARATOR: char = '\u{1f}';

/// Разделитель записей в выводе psql
pub const PSQL_RECORD_SEPARATOR: char = '\u{1e}';

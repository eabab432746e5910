//! Кэш результатов базового запроса
//!
//! Кэш не следит за изменением данных: после любого изменения таблиц
//! оператор обязан вызвать `invalidate()`.

use crate::common::{QuerySpec, ResultSet};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Ключ кэша: точный текст запроса и параметры привязки
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    sql: String,
    binds: Vec<(String, String)>,
}

impl CacheKey {
    /// Строит ключ для запроса
    pub fn for_query(query: &QuerySpec) -> Self {
        Self {
            sql: query.sql.clone(),
            binds: query
                .binds
                .iter()
                .map(|(name, value)| (name.clone(), value.to_sql_literal()))
                .collect(),
        }
    }
}

/// Статистика кэша
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStatistics {
    /// Количество записей
    pub entries: usize,
    /// Попадания
    pub hits: u64,
    /// Промахи
    pub misses: u64,
}

/// Кэш результатов базового запроса
pub trait ResultCache: Send + Sync {
    /// Возвращает сохраненный результат
    fn get(&self, key: &CacheKey) -> Option<Arc<ResultSet>>;

    /// Сохраняет результат
    fn put(&self, key: CacheKey, result: Arc<ResultSet>);

    /// Удаляет все записи
    fn invalidate(&self);

    /// Статистика
    fn statistics(&self) -> CacheStatistics {
        CacheStatistics::default()
    }
}

/// Кэш в памяти процесса
#[derive(Debug, Default)]
pub struct InMemoryResultCache {
    entries: RwLock<HashMap<CacheKey, Arc<ResultSet>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl InMemoryResultCache {
    /// Создает пустой кэш
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResultCache for InMemoryResultCache {
    fn get(&self, key: &CacheKey) -> Option<Arc<ResultSet>> {
        let found = self.entries.read().get(key).cloned();
        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    fn put(&self, key: CacheKey, result: Arc<ResultSet>) {
        self.entries.write().insert(key, result);
    }

    fn invalidate(&self) {
        let mut entries = self.entries.write();
        log::info!("Кэш базовых результатов очищен ({} записей)", entries.len());
        entries.clear();
    }

    fn statistics(&self) -> CacheStatistics {
        CacheStatistics {
            entries: self.entries.read().len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// Кэш, который ничего не хранит
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopResultCache;

impl ResultCache for NoopResultCache {
    fn get(&self, _key: &CacheKey) -> Option<Arc<ResultSet>> {
        None
    }

    fn put(&self, _key: CacheKey, _result: Arc<ResultSet>) {}

    fn invalidate(&self) {}
}

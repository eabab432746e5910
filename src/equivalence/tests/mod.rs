//! Тесты для модуля equivalence

pub mod cache_tests;

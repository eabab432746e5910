//! Тесты для модуля plan

//! Тесты для модуля evaluator

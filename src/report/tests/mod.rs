//! Тесты для модуля report

pub mod render_tests;

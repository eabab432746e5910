//! Модули интеграционных тестов

pub mod ab_flow_tests;
pub mod common;
pub mod evaluation_flow_tests;

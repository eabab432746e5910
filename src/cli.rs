//! CLI интерфейс для queryeval
//!
//! Команды: оценка кандидата на живой базе, отчет об узких местах по
//! сохраненному плану, решение A/B по двум сохраненным оценкам и вывод
//! действующей конфигурации.

use crate::ab::{AbPolicy, AbSide};
use crate::common::{AppConfig, BindValue, Error, EvaluationConfig, QuerySpec, Result};
use crate::evaluator::{EvaluationRecord, EvaluationRequest, Evaluator};
use crate::executor::PsqlExecutor;
use crate::plan::ExplainDocument;
use crate::report::{BottleneckReport, MarkdownReport, Selection};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

/// queryeval - оценка кандидатов на оптимизацию SQL запросов
#[derive(Parser)]
#[command(name = "queryeval")]
#[command(about = "Evaluation harness for SQL query and index candidates")]
#[command(version)]
pub struct Cli {
    /// Конфигурационный файл (TOML)
    #[arg(short, long, value_name = "CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Уровень детализации логирования (фильтр в формате RUST_LOG)
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Хост PostgreSQL
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Порт PostgreSQL
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// Пользователь PostgreSQL
    #[arg(long, global = true)]
    pub user: Option<String>,

    /// Имя базы данных
    #[arg(long, global = true)]
    pub dbname: Option<String>,

    /// Путь к клиенту psql
    #[arg(long, value_name = "PATH", global = true)]
    pub psql: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Оценить кандидата на живой базе
    Evaluate(EvaluateArgs),

    /// Построить отчет об узких местах по сохраненному плану (EXPLAIN FORMAT JSON)
    Bottlenecks {
        /// Файл с выводом EXPLAIN
        plan: PathBuf,

        /// Порог Парето, 0 включает режим top-K
        #[arg(long)]
        pareto: Option<f64>,

        /// Количество узких мест в режиме top-K
        #[arg(long)]
        top: Option<usize>,

        /// Вывести отчет в JSON вместо markdown
        #[arg(long)]
        json: bool,
    },

    /// Принять или отклонить индекс по оценкам до и после его создания
    Ab {
        /// Запись оценки до создания индекса
        #[arg(long)]
        before: PathBuf,

        /// Запись оценки после создания индекса
        #[arg(long)]
        after: PathBuf,
    },

    /// Показать действующую конфигурацию
    Config,
}

/// Аргументы команды `evaluate`
#[derive(Args, Debug, Clone, Default)]
pub struct EvaluateArgs {
    /// Текст запроса-кандидата
    #[arg(long, conflicts_with = "file", required_unless_present = "file")]
    pub sql: Option<String>,

    /// Файл с запросом-кандидатом
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Текст базового запроса для проверки эквивалентности
    #[arg(long, conflicts_with = "baseline_file")]
    pub baseline_sql: Option<String>,

    /// Файл с базовым запросом
    #[arg(long)]
    pub baseline_file: Option<PathBuf>,

    /// Параметр привязки, можно указывать несколько раз
    #[arg(long = "bind", value_name = "NAME=VALUE", value_parser = parse_bind)]
    pub binds: Vec<(String, BindValue)>,

    /// Параметр привязки базового запроса; без них берутся параметры кандидата
    #[arg(long = "baseline-bind", value_name = "NAME=VALUE", value_parser = parse_bind)]
    pub baseline_binds: Vec<(String, BindValue)>,

    /// Метка оценки
    #[arg(long)]
    pub label: Option<String>,

    /// Куда сохранить запись оценки (JSON)
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Статический таймаут в секундах, 0 отключает
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Количество замеров времени SELECT
    #[arg(long)]
    pub select_runs: Option<u32>,

    /// Приложить отчет об узких местах
    #[arg(long)]
    pub attach_bottlenecks: bool,

    /// Приложить сырое дерево плана
    #[arg(long)]
    pub attach_plan: bool,

    /// Снять дополнительный план с TIMING ON (время по узлам)
    #[arg(long)]
    pub timing_plan: bool,

    /// Порог Парето для отчета, 0 включает режим top-K
    #[arg(long)]
    pub pareto: Option<f64>,

    /// Количество узких мест в режиме top-K
    #[arg(long)]
    pub top: Option<usize>,

    /// Отключить динамическое сокращение таймаута
    #[arg(long)]
    pub dynamic_timeout_disable: bool,
}

impl EvaluateArgs {
    /// Переносит флаги команды в конфигурацию оценки
    pub fn apply_to(&self, config: &mut EvaluationConfig) {
        if let Some(timeout) = self.timeout {
            config.timeout_seconds = timeout;
        }
        if let Some(runs) = self.select_runs {
            config.select_runs = runs;
        }
        if let Some(pareto) = self.pareto {
            config.bottlenecks_pareto = pareto;
        }
        if let Some(top) = self.top {
            config.bottlenecks_top = top;
        }
        config.attach_bottlenecks |= self.attach_bottlenecks;
        config.attach_plan |= self.attach_plan;
        config.timing_plan |= self.timing_plan;
        config.dynamic_timeout_disable |= self.dynamic_timeout_disable;
    }

    /// Запрос-кандидат с параметрами привязки
    pub fn candidate(&self) -> Result<QuerySpec> {
        let sql = read_query_text(self.sql.as_deref(), self.file.as_deref())?
            .ok_or_else(|| Error::configuration("candidate query is required (--sql or --file)"))?;
        Ok(with_binds(sql, &self.binds))
    }

    /// Базовый запрос, если задан. Параметры берутся из `--baseline-bind`,
    /// а без них совпадают с параметрами кандидата
    pub fn baseline(&self) -> Result<Option<QuerySpec>> {
        let sql = read_query_text(self.baseline_sql.as_deref(), self.baseline_file.as_deref())?;
        let binds = if self.baseline_binds.is_empty() {
            &self.binds
        } else {
            &self.baseline_binds
        };
        Ok(sql.map(|sql| with_binds(sql, binds)))
    }
}

impl Cli {
    /// Загружает конфигурацию: файл, переменные окружения, флаги
    pub fn load_config(&self) -> Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => AppConfig::from_file(path)?,
            None => AppConfig::default(),
        }
        .apply_env()?;

        if let Some(host) = &self.host {
            config.connection.host = host.clone();
        }
        if let Some(port) = self.port {
            config.connection.port = port;
        }
        if let Some(user) = &self.user {
            config.connection.user = user.clone();
        }
        if let Some(dbname) = &self.dbname {
            config.connection.dbname = dbname.clone();
        }
        if let Some(psql) = &self.psql {
            config.connection.psql_path = psql.clone();
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if let Some(Commands::Evaluate(args)) = &self.command {
            args.apply_to(&mut config.evaluation);
        }

        config.validate()?;
        Ok(config)
    }

    /// Выполняет команду с уже загруженной конфигурацией
    pub async fn execute(&self, config: AppConfig) -> Result<()> {
        match &self.command {
            Some(Commands::Evaluate(args)) => self.evaluate(config, args).await,
            Some(Commands::Bottlenecks {
                plan,
                pareto,
                top,
                json,
            }) => {
                let selection = Selection::from_parameters(
                    pareto.unwrap_or(config.evaluation.bottlenecks_pareto),
                    top.unwrap_or(config.evaluation.bottlenecks_top),
                );
                self.show_bottlenecks(plan, selection, *json)
            }
            Some(Commands::Ab { before, after }) => self.decide_ab(before, after),
            Some(Commands::Config) => self.show_config(&config),
            None => {
                println!("queryeval v{}", crate::VERSION);
                println!("Используйте --help для получения справки");
                Ok(())
            }
        }
    }

    /// Оценивает кандидата через psql
    async fn evaluate(&self, config: AppConfig, args: &EvaluateArgs) -> Result<()> {
        let mut request = EvaluationRequest::new(args.candidate()?);
        if let Some(baseline) = args.baseline()? {
            request = request.with_baseline(baseline);
        }
        if let Some(label) = &args.label {
            request = request.with_label(label.clone());
        }

        let executor = PsqlExecutor::new(config.connection.clone());
        let mut evaluator = Evaluator::new(executor, config.evaluation)?;
        let record = evaluator.evaluate(&request).await?;
        tracing::info!(
            fingerprint = %record.fingerprint,
            functional_ok = record.functional_ok(),
            "Оценка завершена"
        );

        match &args.out {
            Some(path) => {
                record.write_json(path)?;
                print_summary(&record);
                println!("Запись сохранена: {}", path.display());
            }
            None => println!("{}", serde_json::to_string_pretty(&record)?),
        }
        Ok(())
    }

    /// Отчет об узких местах по файлу с планом
    fn show_bottlenecks(&self, path: &Path, selection: Selection, json: bool) -> Result<()> {
        let raw = std::fs::read_to_string(path)?;
        let document = ExplainDocument::parse(&raw)?;
        let report = BottleneckReport::build(&document.plan, selection);
        if json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            let source = path.display().to_string();
            print!("{}", MarkdownReport::new(&report).with_source(&source));
        }
        Ok(())
    }

    /// Решение A/B по двум записям оценки
    fn decide_ab(&self, before: &Path, after: &Path) -> Result<()> {
        let before = EvaluationRecord::read_json(before)?;
        let after = EvaluationRecord::read_json(after)?;
        let decision = AbPolicy::default().decide(
            &AbSide::from_record(&before),
            &AbSide::from_record(&after),
        )?;
        tracing::info!(outcome = ?decision.outcome, "A/B решение: {}", decision.rule_text);
        println!("{}", serde_json::to_string_pretty(&decision)?);
        Ok(())
    }

    /// Печатает конфигурацию в TOML
    fn show_config(&self, config: &AppConfig) -> Result<()> {
        let content = toml::to_string_pretty(config)
            .map_err(|e| Error::configuration(format!("cannot encode configuration: {}", e)))?;
        print!("{}", content);
        Ok(())
    }
}

/// Разбирает `имя=значение` для флага `--bind`
pub fn parse_bind(raw: &str) -> std::result::Result<(String, BindValue), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got {:?}", raw))?;
    let name = name.trim().trim_start_matches(':');
    if name.is_empty() {
        return Err(format!("empty parameter name in {:?}", raw));
    }
    Ok((name.to_string(), BindValue::parse_cli(value)))
}

fn with_binds(sql: String, binds: &[(String, BindValue)]) -> QuerySpec {
    binds
        .iter()
        .fold(QuerySpec::new(sql), |query, (name, value)| {
            query.bind(name.clone(), value.clone())
        })
}

fn read_query_text(inline: Option<&str>, file: Option<&Path>) -> Result<Option<String>> {
    match (inline, file) {
        (Some(sql), _) => Ok(Some(sql.to_string())),
        (None, Some(path)) => Ok(Some(std::fs::read_to_string(path)?)),
        (None, None) => Ok(None),
    }
}

fn print_summary(record: &EvaluationRecord) {
    println!("Кандидат: {}", record.fingerprint);
    println!("functional_ok: {}", record.functional_ok());
    if let Some(diff) = record.verdict.diff.as_ref() {
        println!("Расхождение: {}", diff);
    }
    if let Some(score) = &record.score {
        println!("combined_score: {:.6}", score.combined_score);
    }
    if let Some(timing) = &record.timing {
        println!("median_ms: {:.3}, p95_ms: {:.3}", timing.median_ms, timing.p95_ms);
    }
    if let Some(timing_plan) = &record.timing_plan {
        println!("План с TIMING ON: {} мс", timing_plan.elapsed_ms);
        for node in timing_plan.top_nodes.iter().take(5) {
            println!(
                "  {:>10.3} мс  {}{}",
                node.actual_total_time,
                node.node_type,
                node.relation
                    .as_deref()
                    .map(|r| format!(" on {}", r))
                    .unwrap_or_default()
            );
        }
    }
    if let Some(markdown) = &record.bottlenecks_markdown {
        println!();
        print!("{}", markdown);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let args = vec!["queryeval", "--log-level", "debug", "config"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert_eq!(cli.log_level, Some("debug".to_string()));
        assert!(matches!(cli.command, Some(Commands::Config)));
    }

    #[test]
    fn test_evaluate_command() {
        let args = vec![
            "queryeval",
            "evaluate",
            "--sql",
            "SELECT * FROM holdings WHERE account_id = :acc",
            "--bind",
            "acc=42",
            "--bind",
            ":code='007'",
            "--select-runs",
            "5",
            "--attach-bottlenecks",
            "--dbname",
            "shareholders",
        ];
        let cli = Cli::try_parse_from(args).unwrap();
        assert_eq!(cli.dbname, Some("shareholders".to_string()));

        let Some(Commands::Evaluate(evaluate)) = &cli.command else {
            panic!("expected evaluate command");
        };
        let query = evaluate.candidate().unwrap();
        assert_eq!(query.binds.get("acc"), Some(&BindValue::Integer(42)));
        assert_eq!(
            query.binds.get("code"),
            Some(&BindValue::Text("007".to_string()))
        );
        assert!(evaluate.baseline().unwrap().is_none());

        let mut config = EvaluationConfig::default();
        evaluate.apply_to(&mut config);
        assert_eq!(config.select_runs, 5);
        assert!(config.attach_bottlenecks);
        assert!(!config.attach_plan);
        assert_eq!(config.timeout_seconds, 60);
    }

    #[test]
    fn test_evaluate_requires_query() {
        assert!(Cli::try_parse_from(vec!["queryeval", "evaluate"]).is_err());
        assert!(Cli::try_parse_from(vec![
            "queryeval",
            "evaluate",
            "--sql",
            "SELECT 1",
            "--file",
            "q.sql"
        ])
        .is_err());
    }

    #[test]
    fn test_baseline_binds() {
        let cli = Cli::try_parse_from(vec![
            "queryeval",
            "evaluate",
            "--sql",
            "SELECT * FROM holdings WHERE account_id = :acc LIMIT :lim",
            "--baseline-sql",
            "SELECT * FROM holdings WHERE account_id = :acc",
            "--bind",
            "acc=42",
            "--bind",
            "lim=10",
            "--baseline-bind",
            "acc=7",
            "--timing-plan",
        ])
        .unwrap();
        let Some(Commands::Evaluate(evaluate)) = &cli.command else {
            panic!("expected evaluate command");
        };
        let baseline = evaluate.baseline().unwrap().unwrap();
        assert_eq!(baseline.binds.get("acc"), Some(&BindValue::Integer(7)));
        assert!(baseline.binds.get("lim").is_none());
        let candidate = evaluate.candidate().unwrap();
        assert_eq!(candidate.binds.get("acc"), Some(&BindValue::Integer(42)));

        let mut config = EvaluationConfig::default();
        evaluate.apply_to(&mut config);
        assert!(config.timing_plan);

        // Без --baseline-bind базовый запрос получает параметры кандидата
        let cli = Cli::try_parse_from(vec![
            "queryeval",
            "evaluate",
            "--sql",
            "SELECT :acc",
            "--baseline-sql",
            "SELECT :acc",
            "--bind",
            "acc=42",
        ])
        .unwrap();
        let Some(Commands::Evaluate(evaluate)) = &cli.command else {
            panic!("expected evaluate command");
        };
        let baseline = evaluate.baseline().unwrap().unwrap();
        assert_eq!(baseline.binds.get("acc"), Some(&BindValue::Integer(42)));
    }

    #[test]
    fn test_parse_bind() {
        assert_eq!(
            parse_bind("limit=10").unwrap(),
            ("limit".to_string(), BindValue::Integer(10))
        );
        assert_eq!(
            parse_bind("name=a=b").unwrap(),
            ("name".to_string(), BindValue::Text("a=b".to_string()))
        );
        assert!(parse_bind("novalue").is_err());
        assert!(parse_bind("=1").is_err());
    }

    #[test]
    fn test_ab_command() {
        let cli = Cli::try_parse_from(vec![
            "queryeval",
            "ab",
            "--before",
            "before.json",
            "--after",
            "after.json",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Ab { before, after }) => {
                assert_eq!(before, PathBuf::from("before.json"));
                assert_eq!(after, PathBuf::from("after.json"));
            }
            _ => panic!("expected ab command"),
        }
    }

    #[test]
    fn test_load_config_applies_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queryeval.toml");
        std::fs::write(
            &path,
            "[evaluation]\ntimeout_seconds = 30\n\n[connection]\nport = 6543\n",
        )
        .unwrap();

        let cli = Cli::try_parse_from(vec![
            "queryeval",
            "--config",
            path.to_str().unwrap(),
            "--port",
            "7000",
            "evaluate",
            "--sql",
            "SELECT 1",
            "--top",
            "3",
        ])
        .unwrap();
        let config = cli.load_config().unwrap();
        assert_eq!(config.connection.port, 7000);
        assert_eq!(config.evaluation.bottlenecks_top, 3);
    }

    #[test]
    fn test_load_config_rejects_invalid_flags() {
        let cli = Cli::try_parse_from(vec![
            "queryeval",
            "evaluate",
            "--sql",
            "SELECT 1",
            "--pareto",
            "1.5",
        ])
        .unwrap();
        assert!(matches!(cli.load_config(), Err(Error::Configuration { .. })));
    }
}

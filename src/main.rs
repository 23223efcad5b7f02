// ==========================================
// UPH 引擎 - 命令行入口
// ==========================================
// 用法:
//   uph-engine [db_path] import <file>... [--corrective]
//   uph-engine [db_path] recalculate
//   uph-engine [db_path] show <operator> <work_center> <routing>
//   uph-engine [db_path] list [routing]
//   uph-engine [db_path] trimmed [routing]
//   uph-engine [db_path] corruption
// 输出: stdout 为 JSON 结果，日志写 stderr
// 退出码: 0 成功 / 1 执行失败 / 2 用法错误
// ==========================================

use std::error::Error;
use std::process::ExitCode;

use serde_json::Value;
use thiserror::Error;
use uph_engine::app::{get_default_db_path, AppState};
use uph_engine::domain::performance::{Page, PerformanceFilter};
use uph_engine::engine::work_center::WorkCenterClassifier;
use uph_engine::{ImportMode, WorkCenter};

/// 命令行用法错误（退出码 2）
#[derive(Error, Debug)]
#[error("{0}")]
struct UsageError(String);

const COMMANDS: &[&str] = &["import", "recalculate", "show", "list", "trimmed", "corruption"];

fn usage() -> String {
    format!(
        "用法: uph-engine [db_path] <{}> [参数...]\n\
         \x20 import <file>... [--corrective]\n\
         \x20 recalculate\n\
         \x20 show <operator> <work_center> <routing>\n\
         \x20 list [routing]\n\
         \x20 trimmed [routing]\n\
         \x20 corruption",
        COMMANDS.join("|")
    )
}

#[tokio::main]
async fn main() -> ExitCode {
    uph_engine::logging::init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let db_path = match args.first() {
        Some(first) if !COMMANDS.contains(&first.as_str()) => args.remove(0),
        _ => get_default_db_path(),
    };

    if args.is_empty() {
        eprintln!("{}", usage());
        return ExitCode::from(2);
    }

    tracing::info!(version = uph_engine::VERSION, db_path = %db_path, "UPH 引擎启动");

    match run(&db_path, &args).await {
        Ok(output) => match serde_json::to_string_pretty(&output) {
            Ok(text) => {
                println!("{}", text);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("结果序列化失败: {}", e);
                ExitCode::FAILURE
            }
        },
        Err(e) if e.is::<UsageError>() => {
            eprintln!("{}", e);
            ExitCode::from(2)
        }
        Err(e) => {
            eprintln!("错误: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// 命令行中的工作中心按导入时的同一规则归类（"Sewing" → ASSEMBLY）
fn parse_work_center(arg: &str) -> WorkCenter {
    WorkCenterClassifier::new().classify_name(arg).work_center
}

/// 运行命令前校验参数个数
fn check_arity(command: &str, rest: &[String]) -> Result<(), UsageError> {
    let ok = match command {
        "import" => rest.iter().any(|a| !a.starts_with("--")),
        "recalculate" | "corruption" => rest.is_empty(),
        "show" => rest.len() == 3,
        "list" | "trimmed" => rest.len() <= 1,
        other => return Err(UsageError(format!("未知命令: {}\n{}", other, usage()))),
    };
    if ok {
        Ok(())
    } else {
        Err(UsageError(usage()))
    }
}

async fn run(db_path: &str, args: &[String]) -> Result<Value, Box<dyn Error>> {
    let command = args[0].as_str();
    let rest = &args[1..];
    check_arity(command, rest)?;
    let state = AppState::new(db_path.to_string())?;

    match command {
        "import" => {
            let mode = if rest.iter().any(|a| a == "--corrective") {
                ImportMode::Corrective
            } else {
                ImportMode::Append
            };
            let files: Vec<String> = rest.iter().filter(|a| !a.starts_with("--")).cloned().collect();
            let results = state.import_api.import_files(files, mode).await?;
            let reports: Vec<Value> = results
                .into_iter()
                .map(|r| match r {
                    Ok(report) => serde_json::to_value(report).unwrap_or(Value::Null),
                    Err(message) => serde_json::json!({ "error": message }),
                })
                .collect();
            Ok(Value::Array(reports))
        }
        "recalculate" => {
            let result = state.performance_api.recalculate()?;
            Ok(serde_json::to_value(result)?)
        }
        "show" => {
            let [operator, work_center, routing] = rest else {
                return Err(UsageError(usage()).into());
            };
            let lookup = state.performance_api.get_performance(
                operator,
                parse_work_center(work_center),
                routing,
            )?;
            Ok(serde_json::to_value(lookup)?)
        }
        "list" => {
            let filter = PerformanceFilter {
                routing_name: rest.first().cloned(),
                ..Default::default()
            };
            let page = state.performance_api.list_performance(
                &filter,
                Page {
                    offset: 0,
                    limit: 10_000,
                },
            )?;
            Ok(serde_json::to_value(page)?)
        }
        "trimmed" => {
            let filter = PerformanceFilter {
                routing_name: rest.first().cloned(),
                ..Default::default()
            };
            let view = state.performance_api.list_performance_trimmed(&filter, None)?;
            Ok(serde_json::json!({
                "records": view.records,
                "removed_observations": view.removed_observations,
            }))
        }
        "corruption" => {
            let summary = state.performance_api.corruption_summary()?;
            Ok(serde_json::to_value(summary)?)
        }
        other => Err(UsageError(format!("未知命令: {}\n{}", other, usage())).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_free_text_work_center_classified() {
        assert_eq!(parse_work_center("Sewing"), WorkCenter::Assembly);
        assert_eq!(parse_work_center("Cutting Table"), WorkCenter::Cutting);
        assert_eq!(parse_work_center("ASSEMBLY"), WorkCenter::Assembly);
        assert_eq!(parse_work_center("packaging"), WorkCenter::Packaging);
        assert_eq!(parse_work_center("Warehouse"), WorkCenter::Other);
    }

    #[test]
    fn test_arity_checked_per_command() {
        assert!(check_arity("show", &args(&["Gus", "Sewing", "Tote"])).is_ok());
        assert!(check_arity("show", &args(&["Gus", "Sewing"])).is_err());
        assert!(check_arity("import", &args(&["--corrective"])).is_err());
        assert!(check_arity("import", &args(&["a.csv", "--corrective"])).is_ok());
        assert!(check_arity("list", &args(&[])).is_ok());
        assert!(check_arity("recalculate", &args(&["extra"])).is_err());
        assert!(check_arity("bogus", &args(&[])).is_err());
    }

    #[tokio::test]
    async fn test_usage_errors_are_distinguishable() {
        let err = run("unused.db", &args(&["show", "Gus"])).await.unwrap_err();
        assert!(err.is::<UsageError>());

        let err = run("unused.db", &args(&["import"])).await.unwrap_err();
        assert!(err.is::<UsageError>());
    }
}

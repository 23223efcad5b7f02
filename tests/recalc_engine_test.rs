// ==========================================
// 重算引擎集成测试
// ==========================================
// 职责: 验证 合并 → 损坏检测 → MO 聚合 → 快照替换 的端到端行为
// ==========================================


#[path = "helpers/test_data_builder.rs"]
mod test_data_builder;

#[cfg(test)]
mod recalc_engine_test {
    use super::test_data_builder::WorkCycleBuilder;
    use super::test_helpers::{build_engine, create_test_db, EngineFixture};
    use tempfile::NamedTempFile;
    use uph_engine::config::config_keys;
    use uph_engine::domain::performance::PerformanceKey;
    use uph_engine::domain::work_cycle::WorkCycleRecord;
    use uph_engine::{ImportMode, RunStatus, WorkCenter};

    fn setup(cycles: &[WorkCycleRecord]) -> (NamedTempFile, EngineFixture) {
        let (temp_file, db_path) = create_test_db().unwrap();
        let fixture = build_engine(&db_path).unwrap();
        fixture
            .cycle_repo
            .upsert_chunk(cycles, ImportMode::Append)
            .unwrap();
        (temp_file, fixture)
    }

    fn key(operator: &str, routing: &str) -> PerformanceKey {
        PerformanceKey::new(operator, WorkCenter::Assembly, routing)
    }

    // ==========================================
    // 合并与均值
    // ==========================================

    #[test]
    fn test_split_rows_consolidated_before_uph() {
        let cycles = vec![
            WorkCycleBuilder::new("c1").duration_secs(600).quantity(Some(0.0)).build(),
            WorkCycleBuilder::new("c2").duration_secs(0).quantity(Some(20.0)).build(),
        ];
        let (_tmp, fx) = setup(&cycles);

        let result = fx.engine.recalculate().unwrap();
        assert!(result.succeeded, "errors: {:?}", result.errors);
        assert_eq!(result.record_count, 1);
        assert_eq!(result.summary.merged_fragments, 1);

        let record = fx.performance_repo.find(&key("Gus", "Tote")).unwrap().unwrap();
        assert!((record.uph - 120.0).abs() < 1e-9);
        assert_eq!(record.observation_count, 1);
    }

    #[test]
    fn test_uph_is_mean_of_per_mo_ratios() {
        // MO1: 20 件 / 0.5h = 40；MO2: 10 件 / 1h = 10；均值 25（总量/总时长为 20）
        let cycles = vec![
            WorkCycleBuilder::new("c1").mo("MO1").duration_secs(1800).quantity(Some(20.0)).build(),
            WorkCycleBuilder::new("c2").mo("MO2").duration_secs(3600).quantity(Some(10.0)).build(),
        ];
        let (_tmp, fx) = setup(&cycles);

        fx.engine.recalculate().unwrap();
        let record = fx.performance_repo.find(&key("Gus", "Tote")).unwrap().unwrap();
        assert!((record.uph - 25.0).abs() < 1e-9);
        assert_eq!(record.observation_count, 2);
    }

    #[test]
    fn test_production_quantity_preferred_over_cycle_quantity() {
        let cycles = vec![WorkCycleBuilder::new("c1")
            .duration_secs(3600)
            .quantity(Some(5.0))
            .production_qty(30.0)
            .build()];
        let (_tmp, fx) = setup(&cycles);

        fx.engine.recalculate().unwrap();
        let record = fx.performance_repo.find(&key("Gus", "Tote")).unwrap().unwrap();
        assert!((record.uph - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_recalculate_is_idempotent() {
        let cycles = vec![
            WorkCycleBuilder::new("c1").mo("MO1").duration_secs(1800).quantity(Some(20.0)).build(),
            WorkCycleBuilder::new("c2").mo("MO2").operator("Ana").build(),
            WorkCycleBuilder::new("c3").mo("MO3").routing("Bag").duration_secs(1200).build(),
        ];
        let (_tmp, fx) = setup(&cycles);

        let snapshot = |fx: &EngineFixture| {
            let mut rows: Vec<(String, String, String, i64, i64)> = fx
                .performance_repo
                .list_all()
                .unwrap()
                .into_iter()
                .map(|r| {
                    (
                        r.operator_name,
                        r.work_center.to_string(),
                        r.routing_name,
                        (r.uph * 1e6).round() as i64,
                        r.observation_count,
                    )
                })
                .collect();
            rows.sort();
            rows
        };

        assert!(fx.engine.recalculate().unwrap().succeeded);
        let first = snapshot(&fx);
        assert!(fx.engine.recalculate().unwrap().succeeded);
        let second = snapshot(&fx);

        assert_eq!(first.len(), 3);
        assert_eq!(first, second);
    }

    // ==========================================
    // 损坏检测
    // ==========================================

    #[test]
    fn test_hard_cap_flag_persisted_and_monotonic() {
        let cycles = vec![
            WorkCycleBuilder::new("c1").mo("MO1").duration_secs(9 * 3600).quantity(Some(40.0)).build(),
            WorkCycleBuilder::new("c2").mo("MO2").duration_secs(3600).quantity(Some(10.0)).build(),
        ];
        let (_tmp, fx) = setup(&cycles);

        let result = fx.engine.recalculate().unwrap();
        assert!(result.succeeded);
        assert_eq!(result.summary.newly_flagged_hard, 1);
        assert!(fx.cycle_repo.is_corrupted("c1").unwrap());
        assert!(!fx.cycle_repo.is_corrupted("c2").unwrap());

        let record = fx.performance_repo.find(&key("Gus", "Tote")).unwrap().unwrap();
        assert!((record.uph - 10.0).abs() < 1e-9);
        assert_eq!(record.observation_count, 1);

        // 第二次运行: 已标记的行直接排除，不重复计数
        let again = fx.engine.recalculate().unwrap();
        assert_eq!(again.summary.newly_flagged_hard, 0);
        assert_eq!(again.summary.cycles_already_corrupted, 1);
        assert!(fx.cycle_repo.is_corrupted("c1").unwrap());

        let summary = fx.cycle_repo.corruption_summary().unwrap();
        assert_eq!(summary.total_cycles, 2);
        assert_eq!(summary.total_flagged, 1);
    }

    #[test]
    fn test_context_threshold_flags_whole_group() {
        // Slow: 3h + 2h 共 2 件 → 2.5 h/件，超过组装上限 2.0
        let cycles = vec![
            WorkCycleBuilder::new("s1").operator("Slow").mo("MO1").duration_secs(3 * 3600).quantity(Some(1.0)).build(),
            WorkCycleBuilder::new("s2").operator("Slow").mo("MO2").duration_secs(2 * 3600).quantity(Some(1.0)).build(),
            WorkCycleBuilder::new("g1").mo("MO4").build(),
        ];
        let (_tmp, fx) = setup(&cycles);

        let result = fx.engine.recalculate().unwrap();
        assert!(result.succeeded);
        assert_eq!(result.summary.newly_flagged_context, 2);
        for id in ["s1", "s2"] {
            assert!(fx.cycle_repo.is_corrupted(id).unwrap(), "{} 应被标记", id);
        }
        assert!(!fx.cycle_repo.is_corrupted("g1").unwrap());
        assert!(fx.performance_repo.find(&key("Slow", "Tote")).unwrap().is_none());
        assert!(fx.performance_repo.find(&key("Gus", "Tote")).unwrap().is_some());
    }

    #[test]
    fn test_hard_cap_read_from_config() {
        let cycles = vec![WorkCycleBuilder::new("c1")
            .duration_secs(9 * 3600)
            .quantity(Some(40.0))
            .build()];
        let (_tmp, fx) = setup(&cycles);
        fx.config_manager
            .set_global_config_value(config_keys::HARD_CAP_HOURS, "10")
            .unwrap();

        let result = fx.engine.recalculate().unwrap();
        assert!(result.succeeded);
        assert_eq!(result.summary.newly_flagged_hard, 0);
        assert!(!fx.cycle_repo.is_corrupted("c1").unwrap());

        let run = fx.run_repo.latest().unwrap().unwrap();
        let snapshot = run.config_snapshot_json.unwrap();
        assert!(snapshot.contains("10"));
    }

    #[test]
    fn test_manually_flagged_cycle_excluded() {
        let cycles = vec![
            WorkCycleBuilder::new("c1").mo("MO1").build(),
            WorkCycleBuilder::new("c2").mo("MO2").operator("Ana").build(),
        ];
        let (_tmp, fx) = setup(&cycles);
        assert!(fx.cycle_repo.flag_corrupted("c1", "manual review").unwrap());

        fx.engine.recalculate().unwrap();
        assert!(fx.performance_repo.find(&key("Gus", "Tote")).unwrap().is_none());
        assert!(fx.performance_repo.find(&key("Ana", "Tote")).unwrap().is_some());
    }

    // ==========================================
    // 失败路径
    // ==========================================

    #[test]
    fn test_persistence_failure_keeps_previous_snapshot() {
        let cycles = vec![WorkCycleBuilder::new("c1").build()];
        let (_tmp, fx) = setup(&cycles);

        let first = fx.engine.recalculate().unwrap();
        assert!(first.succeeded);
        let before = fx.performance_repo.find(&key("Gus", "Tote")).unwrap().unwrap();

        // 新增一名操作员，并让其绩效写入在数据库层失败
        fx.cycle_repo
            .upsert_chunk(
                &[WorkCycleBuilder::new("b1").operator("Boom").mo("MO9").build()],
                ImportMode::Append,
            )
            .unwrap();
        fx.conn
            .lock()
            .unwrap()
            .execute_batch(
                r#"
                CREATE TRIGGER fail_boom BEFORE INSERT ON operator_performance
                WHEN NEW.operator_name = 'Boom'
                BEGIN
                    SELECT RAISE(ABORT, 'boom');
                END;
                "#,
            )
            .unwrap();

        let result = fx.engine.recalculate().unwrap();
        assert!(!result.succeeded);
        assert_eq!(result.status, RunStatus::Failed);
        assert!(!result.errors.is_empty());
        assert_eq!(fx.engine.status(), RunStatus::Failed);
        assert!(!fx.engine.is_running());

        let after = fx.performance_repo.find(&key("Gus", "Tote")).unwrap().unwrap();
        assert_eq!(after, before);
        assert!(fx.performance_repo.find(&key("Boom", "Tote")).unwrap().is_none());

        let run = fx.run_repo.latest().unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Failed);
        assert!(run.error_message.is_some());
    }

    #[test]
    fn test_no_aggregatable_cycles_keeps_previous_snapshot() {
        let cycles = vec![WorkCycleBuilder::new("c1").build()];
        let (_tmp, fx) = setup(&cycles);

        assert!(fx.engine.recalculate().unwrap().succeeded);
        let before = fx.performance_repo.find(&key("Gus", "Tote")).unwrap().unwrap();

        // 唯一的工时被人工标记后，重算没有任何可聚合输入
        assert!(fx.cycle_repo.flag_corrupted("c1", "manual review").unwrap());
        let result = fx.engine.recalculate().unwrap();
        assert!(!result.succeeded);
        assert_eq!(result.status, RunStatus::Failed);
        assert_eq!(result.record_count, 0);
        assert_eq!(result.summary.cycles_already_corrupted, 1);
        assert!(result.errors[0].contains("无有效输入"));

        let after = fx.performance_repo.find(&key("Gus", "Tote")).unwrap().unwrap();
        assert_eq!(after, before);
        let run = fx.run_repo.latest().unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Failed);
    }

    #[test]
    fn test_config_read_failure_aborts_run() {
        let cycles = vec![
            WorkCycleBuilder::new("c1").mo("MO1").build(),
            WorkCycleBuilder::new("c2").mo("MO2").duration_secs(9 * 3600).quantity(Some(40.0)).build(),
        ];
        let (_tmp, fx) = setup(&cycles[..1]);
        assert!(fx.engine.recalculate().unwrap().succeeded);
        let before = fx.performance_repo.find(&key("Gus", "Tote")).unwrap().unwrap();

        fx.cycle_repo
            .upsert_chunk(&cycles[1..], ImportMode::Append)
            .unwrap();
        fx.conn
            .lock()
            .unwrap()
            .execute_batch("DROP TABLE config_kv;")
            .unwrap();

        // 阈值未知时不做检测，也不替换快照
        let result = fx.engine.recalculate().unwrap();
        assert!(!result.succeeded);
        assert!(result.errors[0].contains("配置读取失败"));
        assert!(!fx.cycle_repo.is_corrupted("c2").unwrap());
        let after = fx.performance_repo.find(&key("Gus", "Tote")).unwrap().unwrap();
        assert_eq!(after, before);

        let run = fx.run_repo.latest().unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Failed);
        assert!(run.config_snapshot_json.is_none());
    }

    #[test]
    fn test_stale_running_run_marked_failed() {
        let (_tmp, fx) = setup(&[]);
        fx.run_repo
            .insert_running("stale-run", chrono::Utc::now(), None)
            .unwrap();

        let failed = fx.run_repo.fail_stale_running("进程重启").unwrap();
        assert_eq!(failed, 1);
        let run = fx.run_repo.find("stale-run").unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Failed);
    }
}

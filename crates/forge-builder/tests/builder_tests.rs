#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use forge_builder::{BuildGates, Builder, BuilderSettings};
    use forge_memory::MemoryStore;
    use forge_oracle::MockOracle;
    use forge_registry::CapabilityRegistry;

    const GOOD_HANDLER: &str = "#!/bin/sh\nMAGIC=1\nprintf '{\"status\":\"ok\",\"message\":\"done\"}'\n";
    const BAD_HANDLER: &str = "#!/bin/sh\nprintf 'nothing'\n";
    const MAGIC_TEST: &str = "#!/bin/sh\ngrep -q MAGIC handler.sh\n";

    struct Harness {
        builder: Builder,
        registry: Arc<CapabilityRegistry>,
        memory: Arc<MemoryStore>,
        _dir: tempfile::TempDir,
    }

    fn harness(oracle: MockOracle, max_repair_attempts: u32) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(CapabilityRegistry::new());
        let memory = Arc::new(MemoryStore::open(&dir.path().join("forge.db")).unwrap());
        let settings = BuilderSettings {
            plugins_dir: dir.path().join("plugins"),
            max_repair_attempts,
            build_timeout: Duration::from_secs(30),
            test_command: "sh test.sh".into(),
        };
        Harness {
            builder: Builder::new(
                Arc::new(oracle),
                registry.clone(),
                memory.clone(),
                Arc::new(BuildGates::new()),
                settings,
            ),
            registry,
            memory,
            _dir: dir,
        }
    }

    fn manifest_path(h: &Harness, target: &str) -> std::path::PathBuf {
        h._dir.path().join("plugins").join(target).join("plugin.toml")
    }

    #[tokio::test]
    async fn test_scaffold_passes_first_try() {
        let oracle = MockOracle::new()
            .with_response(GOOD_HANDLER)
            .with_response(MAGIC_TEST);
        let h = harness(oracle, 3);

        let report = h.builder.build("weather", "fetch a forecast").await.unwrap();
        assert!(report.succeeded());
        assert_eq!(report.repair_attempts, 0);
        assert!(manifest_path(&h, "weather").exists());
        assert!(h.registry.resolve("weather").is_some());
        // No repairs happened, so no history rows
        assert!(h.memory.repairs_for_target("weather", 10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failures_then_pass_records_full_history() {
        let oracle = MockOracle::new()
            .with_response(BAD_HANDLER) // scaffold
            .with_response(MAGIC_TEST) // test
            .with_response(BAD_HANDLER) // repair 1, still failing
            .with_response(GOOD_HANDLER); // repair 2, passes
        let h = harness(oracle, 3);

        let report = h.builder.build("calc", "do arithmetic").await.unwrap();
        assert!(report.succeeded());
        assert_eq!(report.repair_attempts, 2);

        // Two failure rows plus one success row, newest first
        let records = h.memory.repairs_for_target("calc", 10).unwrap();
        assert_eq!(records.len(), 3);
        assert!(records[0].success);
        assert!(!records[1].success);
        assert!(!records[2].success);
        assert!(h.registry.resolve("calc").is_some());
    }

    #[tokio::test]
    async fn test_budget_exhausted_publishes_nothing() {
        let oracle = MockOracle::new()
            .with_response(BAD_HANDLER)
            .with_response(MAGIC_TEST)
            .with_response(BAD_HANDLER); // the single allowed repair
        let h = harness(oracle, 1);

        let report = h.builder.build("broken", "never works").await.unwrap();
        assert!(!report.succeeded());
        assert_eq!(report.repair_attempts, 1);
        assert!(!manifest_path(&h, "broken").exists());
        assert!(h.registry.resolve("broken").is_none());

        let records = h.memory.repairs_for_target("broken", 10).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| !r.success));
    }

    #[tokio::test]
    async fn test_oracle_outage_fails_cycle_cleanly() {
        let oracle = MockOracle::new().with_error("backend down");
        let h = harness(oracle, 3);

        let report = h.builder.build("weather", "fetch a forecast").await.unwrap();
        assert!(!report.succeeded());
        assert!(report.detail.contains("backend down"));
        assert!(!manifest_path(&h, "weather").exists());
    }

    #[tokio::test]
    async fn test_timeout_cancels_cycle() {
        let oracle = MockOracle::new()
            .with_response(GOOD_HANDLER)
            .with_response("#!/bin/sh\nsleep 10\n");
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(CapabilityRegistry::new());
        let memory = Arc::new(MemoryStore::open(&dir.path().join("forge.db")).unwrap());
        let builder = Builder::new(
            Arc::new(oracle),
            registry.clone(),
            memory.clone(),
            Arc::new(BuildGates::new()),
            BuilderSettings {
                plugins_dir: dir.path().join("plugins"),
                max_repair_attempts: 3,
                build_timeout: Duration::from_millis(200),
                test_command: "sh test.sh".into(),
            },
        );

        let report = builder.build("slow", "take forever").await.unwrap();
        assert!(!report.succeeded());
        assert!(report.detail.contains("timed out"));
        assert!(registry.resolve("slow").is_none());
        // The timeout is recorded in repair history
        let records = memory.repairs_for_target("slow", 10).unwrap();
        assert_eq!(records.len(), 1);
        assert!(!records[0].success);
    }

    #[tokio::test]
    async fn test_timeout_budget_spans_repairs() {
        // Each test run finishes well inside the budget, but the cycle as
        // a whole does not: the wall clock bounds scaffold, every test
        // run, and every repair together
        let oracle = MockOracle::new()
            .with_response(BAD_HANDLER)
            .with_response("#!/bin/sh\nsleep 0.3\nexit 1\n")
            .with_response(BAD_HANDLER)
            .with_response(BAD_HANDLER)
            .with_response(BAD_HANDLER);
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(CapabilityRegistry::new());
        let memory = Arc::new(MemoryStore::open(&dir.path().join("forge.db")).unwrap());
        let builder = Builder::new(
            Arc::new(oracle),
            registry.clone(),
            memory.clone(),
            Arc::new(BuildGates::new()),
            BuilderSettings {
                plugins_dir: dir.path().join("plugins"),
                max_repair_attempts: 3,
                build_timeout: Duration::from_millis(400),
                test_command: "sh test.sh".into(),
            },
        );

        let report = builder.build("sluggish", "fail slowly").await.unwrap();
        assert!(!report.succeeded());
        assert!(report.detail.contains("timed out"));
        assert!(registry.resolve("sluggish").is_none());
    }

    #[tokio::test]
    async fn test_concurrent_builds_coalesce() {
        // The drafted test sleeps so the cycle is still in flight when the
        // second caller arrives
        let oracle = MockOracle::new()
            .with_response(GOOD_HANDLER)
            .with_response("#!/bin/sh\nsleep 1\ngrep -q MAGIC handler.sh\n");
        let recorded = oracle.clone();
        let h = harness(oracle, 3);
        let builder = Arc::new(h.builder);

        let first = {
            let b = builder.clone();
            tokio::spawn(async move { b.build("weather", "fetch a forecast").await })
        };
        // Give the leader a head start so the second call coalesces
        tokio::time::sleep(Duration::from_millis(20)).await;
        let second = builder.build("weather", "fetch a forecast").await.unwrap();
        let first = first.await.unwrap().unwrap();

        assert!(first.succeeded());
        assert!(second.succeeded());
        // One cycle: exactly two drafts (handler + test), not four
        assert_eq!(recorded.calls().len(), 2);
        assert!(h.registry.resolve("weather").is_some());
    }
}

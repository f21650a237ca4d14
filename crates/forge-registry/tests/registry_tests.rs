#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::Utc;
    use forge_core::{Action, ActionStatus};
    use forge_registry::{
        CapabilityRegistry, DispatchOutcome, Dispatcher, HandlerDescriptor, HandlerResult,
        PluginManifest, ProcessSpecialist, Specialist,
    };

    struct EchoSpecialist {
        capability: String,
    }

    #[async_trait]
    impl Specialist for EchoSpecialist {
        fn describe_capabilities(&self) -> Vec<String> {
            vec![self.capability.clone()]
        }

        fn can_handle(&self, action: &Action) -> bool {
            action.plugin == self.capability
        }

        async fn handle(&self, action: &Action) -> forge_core::Result<HandlerResult> {
            Ok(HandlerResult::ok(format!("handled: {}", action.goal)))
        }
    }

    struct RefusingSpecialist;

    #[async_trait]
    impl Specialist for RefusingSpecialist {
        fn describe_capabilities(&self) -> Vec<String> {
            vec!["picky".into()]
        }

        fn can_handle(&self, _action: &Action) -> bool {
            false
        }

        async fn handle(&self, _action: &Action) -> forge_core::Result<HandlerResult> {
            Ok(HandlerResult::ok("unreachable"))
        }
    }

    fn descriptor(key: &str) -> HandlerDescriptor {
        HandlerDescriptor {
            capability: key.to_string(),
            description: format!("{key} handler"),
            capabilities: vec![key.to_string()],
            location: "builtin".into(),
            registered_at: Utc::now(),
        }
    }

    fn ready_action(plugin: &str, goal: &str) -> Action {
        Action {
            plugin: plugin.to_string(),
            goal: goal.to_string(),
            status: ActionStatus::Ready,
            args: serde_json::json!({}),
        }
    }

    fn register_echo(registry: &CapabilityRegistry, key: &str) {
        registry.register(
            key,
            descriptor(key),
            Arc::new(EchoSpecialist {
                capability: key.to_string(),
            }),
        );
    }

    // ── Registry ───────────────────────────────────────────────

    mod registry {
        use super::*;

        #[test]
        fn test_register_and_resolve() {
            let registry = CapabilityRegistry::new();
            register_echo(&registry, "weather");
            let handler = registry.resolve("weather").unwrap();
            assert_eq!(handler.descriptor.capability, "weather");
            assert!(registry.resolve("calc").is_none());
        }

        #[test]
        fn test_last_registration_wins() {
            let registry = CapabilityRegistry::new();
            register_echo(&registry, "weather");
            let mut second = descriptor("weather");
            second.description = "replacement".into();
            registry.register(
                "weather",
                second,
                Arc::new(EchoSpecialist {
                    capability: "weather".into(),
                }),
            );
            let handler = registry.resolve("weather").unwrap();
            assert_eq!(handler.descriptor.description, "replacement");
            assert_eq!(registry.list_capabilities().len(), 1);
        }

        #[test]
        fn test_reader_snapshot_is_stable_across_register() {
            let registry = CapabilityRegistry::new();
            register_echo(&registry, "weather");
            let snapshot = registry.snapshot();
            register_echo(&registry, "calc");
            // The old snapshot never sees the new entry
            assert_eq!(snapshot.len(), 1);
            assert_eq!(registry.snapshot().len(), 2);
        }

        #[test]
        fn test_refresh_loads_manifests_only() {
            let dir = tempfile::tempdir().unwrap();

            let manifest = PluginManifest {
                name: "weather".into(),
                description: "fetch a forecast".into(),
                capabilities: vec!["weather".into()],
                specialist: "handler.sh".into(),
            };
            manifest.save(&dir.path().join("weather")).unwrap();

            // A directory with code but no manifest must stay invisible
            let bare = dir.path().join("orphan");
            std::fs::create_dir_all(&bare).unwrap();
            std::fs::write(bare.join("handler.sh"), "echo hi").unwrap();

            let registry = CapabilityRegistry::new();
            let loaded = registry.refresh(dir.path()).unwrap();
            assert_eq!(loaded, vec!["weather".to_string()]);
            assert!(registry.resolve("weather").is_some());
            assert!(registry.resolve("orphan").is_none());
        }

        #[test]
        fn test_refresh_preserves_builtins_and_drops_stale() {
            let dir = tempfile::tempdir().unwrap();
            let manifest = PluginManifest {
                name: "weather".into(),
                description: "fetch a forecast".into(),
                capabilities: vec!["weather".into()],
                specialist: "handler.sh".into(),
            };
            manifest.save(&dir.path().join("weather")).unwrap();

            let registry = CapabilityRegistry::new();
            register_echo(&registry, "builtin-calc");
            registry.refresh(dir.path()).unwrap();
            assert!(registry.resolve("builtin-calc").is_some());
            assert!(registry.resolve("weather").is_some());

            // Manifest removed from disk — next refresh drops it
            std::fs::remove_dir_all(dir.path().join("weather")).unwrap();
            registry.refresh(dir.path()).unwrap();
            assert!(registry.resolve("weather").is_none());
            assert!(registry.resolve("builtin-calc").is_some());
        }

        #[test]
        fn test_register_during_refresh_is_never_lost() {
            // register() racing the refresh scan must survive the index
            // swap: the merge happens under the write lock
            let dir = tempfile::tempdir().unwrap();
            let manifest = PluginManifest {
                name: "weather".into(),
                description: "fetch a forecast".into(),
                capabilities: vec!["weather".into()],
                specialist: "handler.sh".into(),
            };
            manifest.save(&dir.path().join("weather")).unwrap();

            let registry = Arc::new(CapabilityRegistry::new());
            let writer = {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for i in 0..200 {
                        register_echo(&registry, &format!("builtin-{i}"));
                    }
                })
            };
            for _ in 0..50 {
                registry.refresh(dir.path()).unwrap();
            }
            writer.join().unwrap();
            registry.refresh(dir.path()).unwrap();

            for i in 0..200 {
                assert!(
                    registry.resolve(&format!("builtin-{i}")).is_some(),
                    "builtin-{i} was dropped by a concurrent refresh"
                );
            }
            assert!(registry.resolve("weather").is_some());
        }

        #[test]
        fn test_refresh_skips_broken_manifest() {
            let dir = tempfile::tempdir().unwrap();
            let broken = dir.path().join("broken");
            std::fs::create_dir_all(&broken).unwrap();
            std::fs::write(broken.join("plugin.toml"), "not = [valid").unwrap();

            let good = PluginManifest {
                name: "calc".into(),
                description: "arithmetic".into(),
                capabilities: vec!["calc".into()],
                specialist: "handler.sh".into(),
            };
            good.save(&dir.path().join("calc")).unwrap();

            let registry = CapabilityRegistry::new();
            let loaded = registry.refresh(dir.path()).unwrap();
            assert_eq!(loaded, vec!["calc".to_string()]);
        }

        #[test]
        fn test_describe_is_sorted() {
            let registry = CapabilityRegistry::new();
            register_echo(&registry, "zeta");
            register_echo(&registry, "alpha");
            let described = registry.describe();
            assert_eq!(described[0].0, "alpha");
            assert_eq!(described[1].0, "zeta");
        }
    }

    // ── Dispatcher ─────────────────────────────────────────────

    mod dispatcher {
        use super::*;

        #[tokio::test]
        async fn test_dispatch_completed() {
            let registry = Arc::new(CapabilityRegistry::new());
            register_echo(&registry, "weather");
            let dispatcher = Dispatcher::new(registry);
            let outcome = dispatcher
                .dispatch(&ready_action("weather", "forecast for Lisbon"))
                .await
                .unwrap();
            match outcome {
                DispatchOutcome::Completed(result) => {
                    assert!(result.succeeded());
                    assert_eq!(result.message, "handled: forecast for Lisbon");
                }
                other => panic!("expected Completed, got {other:?}"),
            }
        }

        #[tokio::test]
        async fn test_unresolved_capability_needs_build() {
            let dispatcher = Dispatcher::new(Arc::new(CapabilityRegistry::new()));
            let outcome = dispatcher
                .dispatch(&ready_action("novel", "do the thing"))
                .await
                .unwrap();
            match outcome {
                DispatchOutcome::NeedsBuild { target, goal } => {
                    assert_eq!(target, "novel");
                    assert_eq!(goal, "do the thing");
                }
                other => panic!("expected NeedsBuild, got {other:?}"),
            }
        }

        #[tokio::test]
        async fn test_declined_action_is_mismatch() {
            let registry = Arc::new(CapabilityRegistry::new());
            registry.register("picky", descriptor("picky"), Arc::new(RefusingSpecialist));
            let dispatcher = Dispatcher::new(registry);
            let outcome = dispatcher
                .dispatch(&ready_action("picky", "anything"))
                .await
                .unwrap();
            assert!(matches!(outcome, DispatchOutcome::Mismatch { .. }));
        }
    }

    // ── ProcessSpecialist ──────────────────────────────────────

    mod process {
        use super::*;

        #[tokio::test]
        async fn test_script_round_trip() {
            let dir = tempfile::tempdir().unwrap();
            let script = dir.path().join("handler.sh");
            // Echoes the incoming goal back inside a structured result
            std::fs::write(
                &script,
                r#"#!/bin/sh
goal=$(cat | sed -n 's/.*"goal":"\([^"]*\)".*/\1/p')
printf '{"status":"ok","message":"did: %s"}' "$goal"
"#,
            )
            .unwrap();

            let specialist = ProcessSpecialist::new(vec!["echo".into()], script);
            let result = specialist
                .handle(&ready_action("echo", "say hi"))
                .await
                .unwrap();
            assert!(result.succeeded());
            assert_eq!(result.message, "did: say hi");
        }

        #[tokio::test]
        async fn test_nonzero_exit_is_dispatch_error() {
            let dir = tempfile::tempdir().unwrap();
            let script = dir.path().join("handler.sh");
            std::fs::write(&script, "#!/bin/sh\necho boom >&2\nexit 3\n").unwrap();

            let specialist = ProcessSpecialist::new(vec!["bad".into()], script);
            let err = specialist
                .handle(&ready_action("bad", "explode"))
                .await
                .unwrap_err();
            assert!(matches!(err, forge_core::ForgeError::Dispatch { .. }));
        }

        #[tokio::test]
        async fn test_malformed_output_is_dispatch_error() {
            let dir = tempfile::tempdir().unwrap();
            let script = dir.path().join("handler.sh");
            std::fs::write(&script, "#!/bin/sh\necho 'not json'\n").unwrap();

            let specialist = ProcessSpecialist::new(vec!["noisy".into()], script);
            let err = specialist
                .handle(&ready_action("noisy", "talk"))
                .await
                .unwrap_err();
            assert!(matches!(err, forge_core::ForgeError::Dispatch { .. }));
        }
    }
}

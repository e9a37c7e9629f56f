//! Tests for the context module.

#[cfg(test)]
mod tests {
    use crate::context::{Dependencies, ExecutionContext};
    use crate::evidence::{CollectingLedger, EvidenceLedger};
    use std::sync::Arc;

    #[derive(Debug, PartialEq)]
    struct Index {
        name: &'static str,
    }

    #[test]
    fn test_context_has_session_id() {
        let a = ExecutionContext::new();
        let b = ExecutionContext::new();
        assert!(!a.session_id().is_empty());
        assert_ne!(a.session_id(), b.session_id());

        let named = ExecutionContext::new().with_session_id("session-1");
        assert_eq!(named.session_id(), "session-1");
    }

    #[test]
    fn test_typed_dependency_lookup() {
        let ctx = ExecutionContext::new().with_dependency("index", Index { name: "main" });

        let index = ctx.dependency::<Index>("index").unwrap();
        assert_eq!(index.name, "main");
        assert!(ctx.dependency::<String>("index").is_none());
        assert!(ctx.dependency::<Index>("missing").is_none());
    }

    #[test]
    fn test_provide_does_not_leak_to_parent() {
        let parent = ExecutionContext::new().with_dependency("model", "small".to_string());
        let child = parent.provide(
            &Dependencies::new()
                .with("model", "large".to_string())
                .with("index", Index { name: "aux" }),
        );

        assert_eq!(child.dependency::<String>("model").unwrap().as_str(), "large");
        assert!(child.dependency::<Index>("index").is_some());

        assert_eq!(parent.dependency::<String>("model").unwrap().as_str(), "small");
        assert!(parent.dependency::<Index>("index").is_none());
        assert_eq!(child.session_id(), parent.session_id());
    }

    #[test]
    fn test_merged_keys() {
        let base = Dependencies::new().with("a", 1_u8).with("b", 2_u8);
        let merged = base.merged(&Dependencies::new().with("c", 3_u8));
        assert_eq!(merged.keys(), vec!["a", "b", "c"]);
        assert_eq!(base.len(), 2);
        assert!(!merged.is_empty());
    }

    #[test]
    fn test_cancellation_is_shared_between_clones() {
        let ctx = ExecutionContext::new();
        let clone = ctx.clone();
        ctx.cancellation().cancel("stop");
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_evidence_ledger_dependency() {
        let ledger: Arc<dyn EvidenceLedger> = Arc::new(CollectingLedger::new());
        let ctx = ExecutionContext::new().with_evidence_ledger(ledger);
        assert!(ctx.evidence_ledger().is_some());
        assert!(ExecutionContext::new().evidence_ledger().is_none());
    }
}

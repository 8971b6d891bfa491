//! End-to-end tests for the sync pipeline over the mock adapters
//!
//! ```bash
//! cargo test -p tagsync-engine --test pipeline_tests
//! ```

mod fixtures;

use fixtures::*;
use pretty_assertions::assert_eq;
use tagsync_catalog::{default_tag_field, ApiError, MockCatalog, MockProtection, MockWarehouse};
use tagsync_core::{DiagnosticCode, MatchPolicy, Severity, TagField, TargetDatabase};
use tagsync_engine::{SyncError, SyncOptions, SyncPipeline};

fn ids(databases: &[TargetDatabase]) -> Vec<i64> {
    databases.iter().map(|db| db.id).collect()
}

fn codes(report: &tagsync_core::SyncReport) -> Vec<DiagnosticCode> {
    report.diagnostics.iter().map(|d| d.code).collect()
}

// =============================================================================
// Full run
// =============================================================================

#[tokio::test]
async fn full_sync_run() {
    let catalog = catalog();
    let protection = protection();
    let warehouse = warehouse();

    let report = SyncPipeline::new(&catalog, &protection, &warehouse, options())
        .run()
        .await
        .unwrap();

    assert!(!report.dry_run);
    assert_eq!(report.summary.tagged_columns, 4);
    assert_eq!(report.summary.warehouse_tags_applied, 3);
    assert_eq!(report.new_databases, vec!["HR".to_string()]);
    assert_eq!(report.summary.databases_created, 1);
    assert_eq!(report.summary.governance_requests, 3);
    assert_eq!(report.summary.governed, 3);
    assert_eq!(report.summary.conflicts, 0);
    assert_eq!(ids(&report.updated_databases), vec![10, 11]);

    // Null placeholder and malformed key, nothing else
    assert_eq!(codes(&report), vec![DiagnosticCode::NullColumn, DiagnosticCode::MalformedKey]);
    assert_eq!(report.diagnostics[0].index, Some(2));
    assert_eq!(report.diagnostics[1].severity, Severity::Warn);

    assert_eq!(
        catalog.calls().await,
        vec!["check_access", "fetch_tag_fields", "fetch_databases", "fetch_tagged_columns"]
    );
    assert_eq!(
        protection.calls().await,
        vec![
            "check_access",
            "fetch_target_databases",
            "create_target_database",
            "fetch_target_databases",
            "submit_governance_request",
            "submit_governance_request",
            "submit_governance_request",
            "update_target_database",
            "update_target_database",
        ]
    );
}

#[tokio::test]
async fn governance_requests_use_registered_ids() {
    let catalog = catalog();
    let protection = protection();
    let warehouse = warehouse();

    SyncPipeline::new(&catalog, &protection, &warehouse, options())
        .run()
        .await
        .unwrap();

    let submitted: Vec<(i64, String, String)> = protection
        .governance_requests()
        .await
        .into_iter()
        .map(|r| (r.database_id, r.table_name, r.column_name))
        .collect();

    assert_eq!(
        submitted,
        vec![
            (10, "PUBLIC.ORDERS".to_string(), "AMOUNT".to_string()),
            (10, "PUBLIC.CUSTOMERS".to_string(), "EMAIL".to_string()),
            (11, "PAYROLL.SALARIES".to_string(), "BASE_PAY".to_string()),
        ]
    );
}

#[tokio::test]
async fn allowed_values_precede_assignments() {
    let catalog = catalog();
    let protection = protection();
    let warehouse = warehouse();

    SyncPipeline::new(&catalog, &protection, &warehouse, options())
        .run()
        .await
        .unwrap();

    let statements = warehouse.statements().await;
    assert_eq!(statements.len(), 9);
    assert_eq!(
        statements[0],
        r#"CREATE TAG IF NOT EXISTS "SALES"."PUBLIC"."ALATION_TAG""#
    );
    assert_eq!(
        statements[1],
        r#"ALTER TAG "SALES"."PUBLIC"."ALATION_TAG" ADD ALLOWED_VALUES 'PCI'"#
    );
    assert_eq!(
        statements[6],
        r#"ALTER TABLE "SALES"."PUBLIC"."ORDERS" MODIFY COLUMN "AMOUNT" SET TAG "SALES"."PUBLIC"."ALATION_TAG" = 'PCI'"#
    );

    let first_set = statements.iter().position(|s| s.contains("SET TAG")).unwrap();
    let last_allowed = statements.iter().rposition(|s| s.contains("ALLOWED_VALUES")).unwrap();
    assert!(last_allowed < first_set);
}

#[tokio::test]
async fn new_databases_get_sequential_ids() {
    let catalog = MockCatalog::new()
        .with_databases(vec![
            datasource(1, "ALPHA", HOST),
            datasource(2, "BETA", HOST),
            datasource(3, "GAMMA", HOST),
        ])
        .with_columns(vec![
            Some(column("2.beta.s.t.b", &["PII"])),
            Some(column("1.alpha.s.t.a", &["PII"])),
            Some(column("3.gamma.s.t.c", &["PII"])),
            Some(column("1.alpha.s.u.d", &["PII"])),
        ]);
    let protection = MockProtection::new();
    let warehouse = MockWarehouse::new();

    let report = SyncPipeline::new(&catalog, &protection, &warehouse, options())
        .run()
        .await
        .unwrap();

    assert_eq!(
        protection.created_databases().await,
        vec!["BETA".to_string(), "ALPHA".to_string(), "GAMMA".to_string()]
    );
    assert_eq!(ids(&report.created_databases), vec![1, 2, 3]);

    let request_ids: Vec<i64> = report.governance_requests.iter().map(|r| r.database_id).collect();
    assert_eq!(request_ids, vec![1, 2, 3, 2]);
}

// =============================================================================
// Dry run
// =============================================================================

#[tokio::test]
async fn dry_run_does_not_mutate() {
    let catalog = catalog();
    let protection = protection();
    let warehouse = warehouse();

    let options = SyncOptions {
        dry_run: true,
        ..options()
    };
    let report = SyncPipeline::new(&catalog, &protection, &warehouse, options)
        .run()
        .await
        .unwrap();

    assert!(report.dry_run);
    assert_eq!(protection.calls().await, vec!["check_access", "fetch_target_databases"]);
    assert!(warehouse.statements().await.is_empty());
    assert!(protection.created_databases().await.is_empty());

    // HR is not registered yet, so only SALES columns map
    assert_eq!(report.new_databases, vec!["HR".to_string()]);
    assert_eq!(report.summary.governance_requests, 2);
    assert_eq!(report.summary.governed, 0);
    assert_eq!(report.summary.warehouse_tags_applied, 0);
    assert_eq!(ids(&report.updated_databases), vec![10]);
    assert!(codes(&report).contains(&DiagnosticCode::UnregisteredDatabase));
}

// =============================================================================
// Failures before mutation
// =============================================================================

#[tokio::test]
async fn permission_failure_aborts_run() {
    let catalog = catalog();
    let protection = protection();
    let warehouse = warehouse();
    catalog
        .fail_on("check_access", ApiError::PermissionDenied("not a server admin".to_string()))
        .await;

    let err = SyncPipeline::new(&catalog, &protection, &warehouse, options())
        .run()
        .await
        .unwrap_err();

    match &err {
        SyncError::PermissionDenied { system, reason } => {
            assert_eq!(*system, "MockCatalog");
            assert!(reason.contains("not a server admin"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.is_pre_mutation());

    // Both probes ran, nothing else did
    assert_eq!(catalog.calls().await, vec!["check_access"]);
    assert_eq!(protection.calls().await, vec!["check_access"]);
    assert!(warehouse.calls().await.is_empty());
}

#[tokio::test]
async fn protection_probe_failure_is_reported() {
    let catalog = catalog();
    let protection = protection();
    let warehouse = warehouse();
    protection
        .fail_on("check_access", ApiError::AuthenticationError("bad key".to_string()))
        .await;

    let err = SyncPipeline::new(&catalog, &protection, &warehouse, options())
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::PermissionDenied { system: "MockProtection", .. }));
    assert_eq!(catalog.calls().await, vec!["check_access"]);
}

#[tokio::test]
async fn warehouse_probe_is_optional() {
    let catalog = catalog();
    let protection = protection();
    let warehouse = warehouse().with_connection_failure();

    // Not probed by default
    let pipeline = SyncPipeline::new(&catalog, &protection, &warehouse, options());
    assert!(pipeline.check_access(false).await.is_ok());

    let options = SyncOptions {
        probe_warehouse: true,
        ..options()
    };
    let err = SyncPipeline::new(&catalog, &protection, &warehouse, options)
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::PermissionDenied { system: "MockWarehouse", .. }));
    assert!(warehouse.statements().await.is_empty());
}

#[tokio::test]
async fn missing_tag_field_is_a_configuration_error() {
    let catalog = catalog().with_tag_fields(Vec::new());
    let protection = protection();
    let warehouse = warehouse();

    let err = SyncPipeline::new(&catalog, &protection, &warehouse, options())
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Configuration(_)));
    assert_eq!(protection.calls().await, vec!["check_access"]);
}

#[tokio::test]
async fn ambiguous_tag_field_is_a_configuration_error() {
    let second = TagField {
        id: 2,
        ..default_tag_field()
    };
    let catalog = catalog().with_tag_fields(vec![default_tag_field(), second]);
    let protection = protection();
    let warehouse = warehouse();

    let err = SyncPipeline::new(&catalog, &protection, &warehouse, options())
        .run()
        .await
        .unwrap_err();

    match err {
        SyncError::Configuration(message) => assert!(message.contains("2 governance tag fields")),
        other => panic!("unexpected error: {other}"),
    }
}

// =============================================================================
// Empty input
// =============================================================================

#[tokio::test]
async fn empty_catalog_is_a_no_op() {
    let catalog = MockCatalog::new().with_databases(datasources());
    let protection = protection();
    let warehouse = warehouse();

    let report = SyncPipeline::new(&catalog, &protection, &warehouse, options())
        .run()
        .await
        .unwrap();

    assert_eq!(report.summary.tagged_columns, 0);
    assert!(report.governance_requests.is_empty());
    assert!(report.diagnostics.is_empty());
    assert_eq!(protection.calls().await, vec!["check_access"]);
    assert!(warehouse.calls().await.is_empty());
}

#[tokio::test]
async fn only_nulls_is_a_no_op() {
    let catalog = MockCatalog::new()
        .with_databases(datasources())
        .with_columns(vec![None, None]);
    let protection = protection();
    let warehouse = warehouse();

    let report = SyncPipeline::new(&catalog, &protection, &warehouse, options())
        .run()
        .await
        .unwrap();

    assert_eq!(codes(&report), vec![DiagnosticCode::NullColumn, DiagnosticCode::NullColumn]);
    assert!(!report.has_errors());
    assert_eq!(protection.calls().await, vec!["check_access"]);
}

// =============================================================================
// Mid-run behaviour
// =============================================================================

#[tokio::test]
async fn conflicts_are_tallied_not_fatal() {
    let catalog = catalog();
    let protection = protection().with_governed(&[(10, "public.orders", "amount")]);
    let warehouse = warehouse();

    let report = SyncPipeline::new(&catalog, &protection, &warehouse, options())
        .run()
        .await
        .unwrap();

    assert_eq!(report.summary.governed, 2);
    assert_eq!(report.summary.conflicts, 1);

    let conflict = report
        .diagnostics
        .iter()
        .find(|d| d.code == DiagnosticCode::GovernanceConflict)
        .unwrap();
    assert_eq!(conflict.subject.as_deref(), Some("PUBLIC.ORDERS.AMOUNT"));
    assert_eq!(conflict.severity, Severity::Info);

    // Updates still go out
    assert_eq!(ids(&protection.updated_databases().await), vec![10, 11]);
}

#[tokio::test]
async fn second_run_is_all_conflicts() {
    let catalog = catalog();
    let protection = protection();
    let warehouse = warehouse();

    let first = SyncPipeline::new(&catalog, &protection, &warehouse, options())
        .run()
        .await
        .unwrap();
    let second = SyncPipeline::new(&catalog, &protection, &warehouse, options())
        .run()
        .await
        .unwrap();

    assert_eq!(first.summary.databases_created, 1);
    assert_eq!(second.summary.databases_created, 0);
    assert!(second.new_databases.is_empty());
    assert_eq!(second.summary.governed, 0);
    assert_eq!(second.summary.conflicts, 3);
}

#[tokio::test]
async fn registration_failure_aborts_before_governance() {
    let catalog = catalog();
    let protection = protection();
    let warehouse = warehouse();
    protection
        .fail_create_for("HR", ApiError::from_status(500, "internal error"))
        .await;

    let err = SyncPipeline::new(&catalog, &protection, &warehouse, options())
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Api { step: "register database", .. }));
    assert!(!err.is_pre_mutation());

    let calls = protection.calls().await;
    assert!(!calls.contains(&"submit_governance_request"));
    assert!(!calls.contains(&"update_target_database"));
}

#[tokio::test]
async fn warehouse_failure_aborts_before_registration() {
    let catalog = catalog();
    let protection = protection();
    let warehouse = warehouse();
    warehouse
        .fail_statements_containing("SET TAG", ApiError::QueryError("insufficient privileges".to_string()))
        .await;

    let err = SyncPipeline::new(&catalog, &protection, &warehouse, options())
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Api { step: "apply warehouse tag", .. }));
    assert_eq!(protection.calls().await, vec!["check_access"]);
}

#[tokio::test]
async fn update_failure_is_fatal() {
    let catalog = catalog();
    let protection = protection();
    let warehouse = warehouse();
    protection
        .fail_on("update_target_database", ApiError::NetworkError("connection reset".to_string()))
        .await;

    let err = SyncPipeline::new(&catalog, &protection, &warehouse, options())
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Api { step: "update database", source: ApiError::NetworkError(_) }));
    assert_eq!(protection.governance_requests().await.len(), 3);
}

// =============================================================================
// Optional behaviour
// =============================================================================

#[tokio::test]
async fn stale_tags_are_removed_when_enabled() {
    let catalog = catalog();
    let protection = protection();
    let warehouse = warehouse().with_tagged_columns(vec![
        warehouse_tag("SALES.PUBLIC.ORDERS.AMOUNT", "PCI"),
        warehouse_tag("SALES.PUBLIC.ORDERS.DISCOUNT", "PCI"),
        warehouse_tag("HR.PAYROLL.SALARIES.BASE_PAY", "PII"),
        warehouse_tag("FINANCE.GL.ENTRIES.AMOUNT", "SOX"),
    ]);

    let options = SyncOptions {
        cleanup_stale_tags: true,
        ..options()
    };
    let report = SyncPipeline::new(&catalog, &protection, &warehouse, options)
        .run()
        .await
        .unwrap();

    assert_eq!(report.summary.stale_tags_removed, 2);

    let unset: Vec<String> = warehouse
        .statements()
        .await
        .into_iter()
        .filter(|s| s.contains("UNSET TAG"))
        .collect();
    assert_eq!(
        unset,
        vec![
            r#"ALTER TABLE "SALES"."PUBLIC"."ORDERS" MODIFY COLUMN "DISCOUNT" UNSET TAG "SALES"."PUBLIC"."ALATION_TAG""#.to_string(),
            r#"ALTER TABLE "HR"."PAYROLL"."SALARIES" MODIFY COLUMN "BASE_PAY" UNSET TAG "HR"."PAYROLL"."ALATION_TAG""#.to_string(),
        ]
    );

    let stale: Vec<_> = report
        .diagnostics
        .iter()
        .filter(|d| d.code == DiagnosticCode::StaleWarehouseTag)
        .filter_map(|d| d.subject.clone())
        .collect();
    assert_eq!(
        stale,
        vec![
            "SALES.PUBLIC.ORDERS.DISCOUNT".to_string(),
            "HR.PAYROLL.SALARIES.BASE_PAY".to_string(),
        ]
    );
}

#[tokio::test]
async fn stale_tags_are_left_alone_by_default() {
    let catalog = catalog();
    let protection = protection();
    let warehouse = warehouse().with_tagged_columns(vec![warehouse_tag("SALES.PUBLIC.ORDERS.DISCOUNT", "PCI")]);

    let report = SyncPipeline::new(&catalog, &protection, &warehouse, options())
        .run()
        .await
        .unwrap();

    assert_eq!(report.summary.stale_tags_removed, 0);
    assert!(!warehouse.calls().await.contains(&"fetch_tagged_columns"));
}

#[tokio::test]
async fn table_policy_checks_warehouse_tables() {
    let catalog = catalog();
    let protection = protection();
    let warehouse = MockWarehouse::new()
        .with_tables("SALES", &[("PUBLIC", "ORDERS")])
        .with_tables("HR", &[("PAYROLL", "SALARIES")]);

    let options = SyncOptions {
        match_policy: MatchPolicy::Table,
        ..options()
    };
    let report = SyncPipeline::new(&catalog, &protection, &warehouse, options)
        .run()
        .await
        .unwrap();

    let columns: Vec<&str> = report
        .governance_requests
        .iter()
        .map(|r| r.column_name.as_str())
        .collect();
    assert_eq!(columns, vec!["AMOUNT", "BASE_PAY"]);
    assert!(codes(&report).contains(&DiagnosticCode::UnknownTable));

    let list_calls = warehouse
        .calls()
        .await
        .into_iter()
        .filter(|op| *op == "list_tables")
        .count();
    assert_eq!(list_calls, 2);
}

#[tokio::test]
async fn options_follow_config() {
    let mut config = tagsync_core::Config::default();
    config.warehouse.hostname = HOST.to_string();
    config.governance.match_policy = MatchPolicy::Table;
    config.governance.cleanup_stale_tags = true;

    let options = SyncOptions::from_config(&config, true);
    assert!(options.dry_run);
    assert_eq!(options.match_policy, MatchPolicy::Table);
    assert!(options.cleanup_stale_tags);
    assert_eq!(options.engine, "snowflake");
    assert_eq!(options.host, HOST);
}

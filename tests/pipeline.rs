use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use tempfile::TempDir;

use chatdb::config::Config;
use chatdb::db;
use chatdb::document_store::SqliteDocumentStore;
use chatdb::generation::GenerationProvider;
use chatdb::migrate;
use chatdb::pipeline::Pipeline;
use chatdb_core::store::DocumentStore;
use chatdb_core::{
    Document, ExecutionResult, MutationSummary, PipelineError, QueryOutcome, StoreKind,
    StructuredQuery,
};

/// Returns a fixed reply, or fails when there is none.
struct CannedProvider {
    reply: Option<String>,
}

impl CannedProvider {
    fn new(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
        }
    }

    fn failing() -> Self {
        Self { reply: None }
    }
}

#[async_trait]
impl GenerationProvider for CannedProvider {
    fn model_name(&self) -> &str {
        "canned"
    }

    async fn generate(&self, _prompt: &chatdb_core::GenerationPrompt) -> Result<String> {
        self.reply
            .clone()
            .ok_or_else(|| anyhow::anyhow!("upstream timed out"))
    }
}

fn doc(value: serde_json::Value) -> Document {
    value.as_object().cloned().unwrap()
}

async fn shop(tmp: &TempDir) -> Config {
    let config = Config::minimal(tmp.path());
    migrate::init_database(&config, StoreKind::Relational, "shop")
        .await
        .unwrap();
    let pool = db::connect(&config, StoreKind::Relational, "shop").await.unwrap();
    for sql in [
        "CREATE TABLE orders (id INTEGER PRIMARY KEY, total REAL)",
        "INSERT INTO orders (id, total) VALUES (1, 50.0), (2, 150.0), (3, 320.5)",
    ] {
        sqlx::query(sql).execute(&pool).await.unwrap();
    }
    pool.close().await;
    config
}

async fn clinic(tmp: &TempDir) -> Config {
    let config = Config::minimal(tmp.path());
    migrate::init_database(&config, StoreKind::Document, "clinic")
        .await
        .unwrap();
    let pool = db::connect(&config, StoreKind::Document, "clinic").await.unwrap();
    let store = SqliteDocumentStore::new(pool.clone());
    store
        .insert_many(
            "doctors",
            vec![
                doc(json!({"name": "John Smith", "specialty": "ENT", "years_experience": 25})),
                doc(json!({"name": "Ana Ruiz", "specialty": "GP", "years_experience": 8})),
                doc(json!({"name": "Wei Chen", "specialty": "ENT", "years_experience": 12})),
            ],
        )
        .await
        .unwrap();
    pool.close().await;
    config
}

async fn order_count(config: &Config) -> i64 {
    let pool = db::connect(config, StoreKind::Relational, "shop").await.unwrap();
    let n = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
        .fetch_one(&pool)
        .await
        .unwrap();
    pool.close().await;
    n
}

#[tokio::test]
async fn test_relational_select_from_fenced_reply() {
    let tmp = TempDir::new().unwrap();
    let config = shop(&tmp).await;
    let provider = CannedProvider::new("```sql\nSELECT * FROM orders WHERE total > 100;\n```");
    let pipeline = Pipeline::new(&config, Box::new(provider));

    let report = pipeline
        .ask(StoreKind::Relational, "shop", "orders over 100")
        .await
        .unwrap();

    assert_eq!(
        report.compiled.query,
        StructuredQuery::RelationalStatements {
            statements: vec!["SELECT * FROM orders WHERE total > 100".to_string()]
        }
    );
    let prompt = report.compiled.prompt.as_ref().unwrap().as_str().to_string();
    assert!(prompt.contains("- orders with fields: [id, total]"));
    assert!(prompt.ends_with("orders over 100"));

    match &report.outcome {
        QueryOutcome::Statements { reports } => {
            assert_eq!(reports.len(), 1);
            match &reports[0].result {
                ExecutionResult::Table(t) => {
                    assert_eq!(t.columns, vec!["id", "total"]);
                    assert_eq!(t.rows, vec![vec![json!(2), json!(150.0)], vec![json!(3), json!(320.5)]]);
                }
                other => panic!("expected a table, got {:?}", other),
            }
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert!(report.is_success());
}

#[tokio::test]
async fn test_relational_failure_does_not_stop_later_statements() {
    let tmp = TempDir::new().unwrap();
    let config = shop(&tmp).await;
    let provider = CannedProvider::new("DROP TABLE missing; SELECT 1;");
    let pipeline = Pipeline::new(&config, Box::new(provider));

    let report = pipeline
        .ask(StoreKind::Relational, "shop", "clean up")
        .await
        .unwrap();

    let QueryOutcome::Statements { reports } = &report.outcome else {
        panic!("unexpected outcome {:?}", report.outcome);
    };
    assert_eq!(reports.len(), 2);
    assert!(reports[0].result.is_error());
    match &reports[1].result {
        ExecutionResult::Table(t) => {
            assert_eq!(t.columns.len(), 1);
            assert_eq!(t.rows, vec![vec![json!(1)]]);
        }
        other => panic!("expected a table, got {:?}", other),
    }
    assert!(!report.is_success());
    assert_eq!(report.outcome.errors().len(), 1);
}

#[tokio::test]
async fn test_statements_are_not_one_transaction() {
    let tmp = TempDir::new().unwrap();
    let config = shop(&tmp).await;
    let pipeline = Pipeline::new(&config, Box::new(CannedProvider::failing()));

    let report = pipeline
        .run_payload(
            StoreKind::Relational,
            "shop",
            "INSERT INTO orders (id, total) VALUES (4, 10); INSERT INTO nowhere VALUES (1); DELETE FROM orders WHERE id = 1",
        )
        .await
        .unwrap();

    let QueryOutcome::Statements { reports } = &report.outcome else {
        panic!("unexpected outcome {:?}", report.outcome);
    };
    assert_eq!(
        reports[0].result,
        ExecutionResult::Mutation(MutationSummary { affected: Some(1) })
    );
    assert!(reports[1].result.is_error());
    assert_eq!(
        reports[2].result,
        ExecutionResult::Mutation(MutationSummary { affected: Some(1) })
    );
    assert_eq!(order_count(&config).await, 3);
}

#[tokio::test]
async fn test_document_aggregation() {
    let tmp = TempDir::new().unwrap();
    let config = clinic(&tmp).await;
    let provider = CannedProvider::new(
        "Here is the query:\n```python\n('doctors', [{\"$match\": {\"specialty\": \"ENT\"}}, {\"$project\": {\"name\": 1, \"_id\": 0}}])\n```\nExplanation: filters ENT doctors.",
    );
    let pipeline = Pipeline::new(&config, Box::new(provider));

    let report = pipeline
        .ask(StoreKind::Document, "clinic", "names of ENT doctors")
        .await
        .unwrap();

    assert!(matches!(
        report.compiled.query,
        StructuredQuery::DocumentPipeline { ref container, ref stages } if container == "doctors" && stages.len() == 2
    ));
    match &report.outcome {
        QueryOutcome::Table(t) => {
            assert_eq!(t.columns, vec!["name"]);
            assert_eq!(t.rows, vec![vec![json!("John Smith")], vec![json!("Wei Chen")]]);
        }
        other => panic!("unexpected outcome {:?}", other),
    }
}

#[tokio::test]
async fn test_document_update() {
    let tmp = TempDir::new().unwrap();
    let config = clinic(&tmp).await;
    let provider = CannedProvider::new(
        "('doctors', ({\"name\": {\"$regex\": \"Smith$\"}}, {\"$set\": {\"years_experience\": 30}}))",
    );
    let pipeline = Pipeline::new(&config, Box::new(provider));

    let report = pipeline
        .ask(StoreKind::Document, "clinic", "set Smith's experience to 30")
        .await
        .unwrap();

    assert_eq!(report.compiled.query.shape().to_string(), "update");
    assert_eq!(
        report.outcome,
        QueryOutcome::Mutation(MutationSummary { affected: Some(1) })
    );

    let check = pipeline
        .run_payload(
            StoreKind::Document,
            "clinic",
            "('doctors', {'years_experience': 30})",
        )
        .await
        .unwrap();
    match &check.outcome {
        QueryOutcome::Table(t) => {
            assert_eq!(t.row_count(), 1);
            assert_eq!(t.cell(0, "name"), Some(&json!("John Smith")));
        }
        other => panic!("unexpected outcome {:?}", other),
    }
}

#[tokio::test]
async fn test_match_wrapped_filter_is_unwrapped() {
    let tmp = TempDir::new().unwrap();
    let config = clinic(&tmp).await;
    let pipeline = Pipeline::new(&config, Box::new(CannedProvider::failing()));

    let report = pipeline
        .run_payload(
            StoreKind::Document,
            "clinic",
            "('doctors', {'$match': {'specialty': 'GP'}})",
        )
        .await
        .unwrap();
    match &report.compiled.query {
        StructuredQuery::DocumentFilter { filter, .. } => {
            assert_eq!(serde_json::Value::Object(filter.clone()), json!({"specialty": "GP"}));
        }
        other => panic!("unexpected query {:?}", other),
    }
    match &report.outcome {
        QueryOutcome::Table(t) => assert_eq!(t.cell(0, "name"), Some(&json!("Ana Ruiz"))),
        other => panic!("unexpected outcome {:?}", other),
    }
}

#[tokio::test]
async fn test_document_execution_error_is_reported() {
    let tmp = TempDir::new().unwrap();
    let config = clinic(&tmp).await;
    let pipeline = Pipeline::new(&config, Box::new(CannedProvider::failing()));

    let report = pipeline
        .run_payload(
            StoreKind::Document,
            "clinic",
            "('doctors', [{'$lookup': {'from': 'nurses'}}])",
        )
        .await
        .unwrap();
    match &report.outcome {
        QueryOutcome::Failed(err) => {
            assert!(err.message.contains("$lookup"));
            assert!(err.statement.starts_with("db['doctors'].aggregate("));
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert!(!report.is_success());
}

#[tokio::test]
async fn test_unsupported_expression_operator_fails_the_operation() {
    let tmp = TempDir::new().unwrap();
    let config = clinic(&tmp).await;
    let provider = CannedProvider::new(
        "('doctors', [{\"$project\": {\"label\": {\"$concat\": [\"$name\", \" (\", \"$specialty\", \")\"]}, \"_id\": 0}}])",
    );
    let pipeline = Pipeline::new(&config, Box::new(provider));

    let report = pipeline
        .ask(StoreKind::Document, "clinic", "label every doctor")
        .await
        .unwrap();
    match &report.outcome {
        QueryOutcome::Failed(err) => {
            assert!(err.message.contains("unsupported expression operator '$concat'"));
            assert!(err.statement.starts_with("db['doctors'].aggregate("));
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert!(!report.is_success());

    let report = pipeline
        .run_payload(
            StoreKind::Document,
            "clinic",
            "('doctors', [{'$group': {'_id': None, 'total': {'$sum': {'$multiply': ['$years_experience', 2]}}}}])",
        )
        .await
        .unwrap();
    assert!(matches!(
        report.outcome,
        QueryOutcome::Failed(ref err) if err.message.contains("'$multiply'")
    ));
}

#[tokio::test]
async fn test_unsafe_reply_executes_nothing() {
    let tmp = TempDir::new().unwrap();
    let config = clinic(&tmp).await;
    let provider = CannedProvider::new(
        "db['doctors'].delete_many({})",
    );
    let pipeline = Pipeline::new(&config, Box::new(provider));

    let err = pipeline
        .ask(StoreKind::Document, "clinic", "remove everyone")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "unsafe_payload");

    let check = pipeline
        .run_payload(StoreKind::Document, "clinic", "('doctors', {})")
        .await
        .unwrap();
    match &check.outcome {
        QueryOutcome::Table(t) => assert_eq!(t.row_count(), 3),
        other => panic!("unexpected outcome {:?}", other),
    }
}

#[tokio::test]
async fn test_fatal_errors_before_execution() {
    let tmp = TempDir::new().unwrap();
    let config = shop(&tmp).await;

    let pipeline = Pipeline::new(&config, Box::new(CannedProvider::failing()));
    let err = pipeline
        .ask(StoreKind::Relational, "shop", "anything")
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::GenerationFailed(ref m) if m.contains("timed out")));

    let pipeline = Pipeline::new(&config, Box::new(CannedProvider::new("Note: I cannot help.")));
    let err = pipeline
        .ask(StoreKind::Relational, "shop", "anything")
        .await
        .unwrap_err();
    assert_eq!(err, PipelineError::EmptyPayload);

    let pipeline = Pipeline::new(
        &config,
        Box::new(CannedProvider::new("('orders', {'total': 5})")),
    );
    let err = pipeline
        .ask(StoreKind::Relational, "shop", "anything")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "shape_mismatch");

    let err = pipeline
        .ask(StoreKind::Relational, "no_such_db", "anything")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "schema_unavailable");
    assert_eq!(order_count(&config).await, 3);
}

mod common;

use std::io::Cursor;
use std::path::Path;

use anyhow::{anyhow, Result};
use consolectl::bulk::{BulkOptions, BulkRunner, FileFormat, InputSource, Outcome, Reporter};
use consolectl::error::InputError;
use consolectl::fields::{LinePrompt, NoFlags, Setter, Value};

use common::{account_fields, account_setters, write_input, Account, MapSource};

#[derive(Default)]
struct Recorder {
    successes: Vec<String>,
    failures: Vec<(Option<String>, String)>,
}

impl Reporter<String> for Recorder {
    fn success(&mut self, result: &String) -> Result<()> {
        self.successes.push(result.clone());
        Ok(())
    }

    fn failure(&mut self, id: Option<&str>, error: &anyhow::Error) -> Result<()> {
        self.failures.push((id.map(str::to_string), error.to_string()));
        Ok(())
    }
}

fn runner(options: BulkOptions) -> BulkRunner<Account> {
    BulkRunner::new(account_fields(), account_setters(), options)
        .identify_with(|a: &Account| Some(a.name.clone()))
}

fn multi(continue_on_error: bool) -> BulkOptions {
    BulkOptions {
        continue_on_error,
        errors_only: false,
        multi: true,
    }
}

fn file(path: &Path, format: FileFormat) -> InputSource {
    InputSource::File {
        path: path.to_path_buf(),
        format,
    }
}

fn no_input() -> LinePrompt<Cursor<&'static str>, Vec<u8>> {
    LinePrompt::new(Cursor::new(""), Vec::new())
}

/// Creates every account, rejecting the one named "b"
async fn create_all(
    runner: &BulkRunner<Account>,
    source: &InputSource,
    reporter: &mut Recorder,
    seen: &mut Vec<Account>,
) -> Result<consolectl::bulk::BatchReport<String>> {
    runner
        .run(source, &Account::default(), &NoFlags, &mut no_input(), reporter, |account: Account| {
            seen.push(account.clone());
            async move {
                if account.name == "b" {
                    Err(anyhow!("409 conflict for {}", account.name))
                } else {
                    Ok(account.name)
                }
            }
        })
        .await
}

#[tokio::test]
async fn test_csv_column_mismatch_stops_after_processed_rows() -> Result<()> {
    let (_dir, path) = write_input("accounts.csv", "name,age\na,1\nc,2\nd\ne,4\n");
    let mut seen = Vec::new();

    let err = create_all(&runner(multi(true)), &file(&path, FileFormat::Csv), &mut Recorder::default(), &mut seen)
        .await
        .unwrap_err();

    match err.downcast_ref::<InputError>() {
        Some(InputError::ColumnMismatch {
            row,
            expected,
            found,
            ..
        }) => {
            assert_eq!(*row, 4);
            assert_eq!(*expected, 2);
            assert_eq!(*found, 1);
        }
        other => panic!("expected a column mismatch, got {:?}", other),
    }
    let names: Vec<_> = seen.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["a", "c"]);
    Ok(())
}

#[tokio::test]
async fn test_csv_column_mismatch_reports_file_line() -> Result<()> {
    let (_dir, path) = write_input("accounts.csv", "name,age\n\"multi\nline\",1\nd\n");
    let mut seen = Vec::new();

    let err = create_all(&runner(multi(true)), &file(&path, FileFormat::Csv), &mut Recorder::default(), &mut seen)
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<InputError>(),
        Some(InputError::ColumnMismatch { row: 4, .. })
    ));
    assert_eq!(seen.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_csv_missing_header_is_fatal() -> Result<()> {
    let (_dir, path) = write_input("empty.csv", "");
    let mut seen = Vec::new();

    let err = create_all(&runner(multi(true)), &file(&path, FileFormat::Csv), &mut Recorder::default(), &mut seen)
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<InputError>(),
        Some(InputError::MissingHeader { .. })
    ));
    assert!(seen.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_stop_on_first_failure() -> Result<()> {
    let (_dir, path) = write_input("accounts.csv", "name\na\nb\nc\n");
    let mut recorder = Recorder::default();
    let mut seen = Vec::new();

    let err = create_all(&runner(multi(false)), &file(&path, FileFormat::Csv), &mut recorder, &mut seen)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("409 conflict for b"));
    assert_eq!(seen.len(), 2);
    assert_eq!(recorder.successes, vec!["a"]);
    assert!(recorder.failures.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_continue_on_error_attempts_every_record_once() -> Result<()> {
    let (_dir, path) = write_input("accounts.csv", "name\na\nb\nc\n");
    let mut recorder = Recorder::default();
    let mut seen = Vec::new();

    let report = create_all(&runner(multi(true)), &file(&path, FileFormat::Csv), &mut recorder, &mut seen).await?;

    assert_eq!(seen.len(), 3);
    assert_eq!(report.outcomes.len(), 3);
    assert_eq!(report.succeeded(), 2);
    assert_eq!(report.failed(), 1);
    assert!(report.has_failures());

    assert!(report.outcomes[0].is_success());
    match &report.outcomes[1] {
        Outcome::Failure { id, error } => {
            assert_eq!(id.as_deref(), Some("b"));
            assert!(error.to_string().contains("409"));
        }
        Outcome::Success(_) => panic!("second record should have failed"),
    }
    assert!(report.outcomes[2].is_success());

    assert_eq!(recorder.successes, vec!["a", "c"]);
    assert_eq!(recorder.failures.len(), 1);
    assert_eq!(recorder.failures[0].0.as_deref(), Some("b"));
    Ok(())
}

#[tokio::test]
async fn test_errors_only_suppresses_success_reports() -> Result<()> {
    let (_dir, path) = write_input("accounts.json", r#"[{"name":"a"},{"name":"b"},{"name":"c"}]"#);
    let options = BulkOptions {
        errors_only: true,
        ..multi(true)
    };
    let mut recorder = Recorder::default();

    let report = create_all(&runner(options), &file(&path, FileFormat::Json), &mut recorder, &mut Vec::new()).await?;

    assert_eq!(report.outcomes.len(), 3);
    assert!(recorder.successes.is_empty());
    assert_eq!(recorder.failures.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_json_values_are_weakly_coerced() -> Result<()> {
    let (_dir, path) = write_input(
        "accounts.json",
        r#"[
            {"name": "x", "age": "42", "admin": "yes", "tags": "ops, dev", "scores": "1,2", "note": "kept"},
            {"name": 7, "admin": 0, "tags": ["a", 3], "scores": [4, "5"]},
            {"name": "z"}
        ]"#,
    );
    let mut seen = Vec::new();

    create_all(&runner(multi(false)), &file(&path, FileFormat::Json), &mut Recorder::default(), &mut seen).await?;

    assert_eq!(
        seen[0],
        Account {
            name: "x".to_string(),
            age: 42,
            admin: true,
            tags: vec!["ops".to_string(), "dev".to_string()],
            scores: vec![1, 2],
        }
    );
    assert_eq!(seen[1].name, "7");
    assert!(!seen[1].admin);
    assert_eq!(seen[1].tags, vec!["a", "3"]);
    assert_eq!(seen[1].scores, vec![4, 5]);
    assert_eq!(seen[2], Account { name: "z".to_string(), ..Account::default() });
    Ok(())
}

#[tokio::test]
async fn test_blank_csv_cells_keep_defaults() -> Result<()> {
    let (_dir, path) = write_input("accounts.csv", "name,age,admin,scores\nz, , ,\n");
    let mut seen = Vec::new();

    create_all(&runner(multi(false)), &file(&path, FileFormat::Csv), &mut Recorder::default(), &mut seen).await?;

    assert_eq!(seen, vec![Account { name: "z".to_string(), ..Account::default() }]);
    Ok(())
}

#[tokio::test]
async fn test_undecodable_record_is_a_record_failure() -> Result<()> {
    let (_dir, path) = write_input("accounts.json", r#"[{"name":"a","age":"old"},{"name":"c","age":-3},{"name":"d"}]"#);
    let mut recorder = Recorder::default();
    let mut seen = Vec::new();

    let report = create_all(&runner(multi(true)), &file(&path, FileFormat::Json), &mut recorder, &mut seen).await?;

    assert_eq!(report.failed(), 2);
    assert_eq!(recorder.successes, vec!["d"]);
    // the operation never sees records that could not be decoded
    assert_eq!(seen.len(), 1);
    assert!(recorder.failures.iter().all(|(id, _)| id.is_none()));
    assert!(recorder.failures[1].1.contains("age cannot be negative"));
    Ok(())
}

#[tokio::test]
async fn test_missing_mandatory_column_is_a_record_failure() -> Result<()> {
    let (_dir, path) = write_input("accounts.csv", "age\n40\n");
    let mut recorder = Recorder::default();
    let mut seen = Vec::new();

    let report = create_all(&runner(multi(true)), &file(&path, FileFormat::Csv), &mut recorder, &mut seen).await?;

    assert_eq!(report.failed(), 1);
    match &report.outcomes[0] {
        Outcome::Failure { error, .. } => assert!(matches!(
            error.downcast_ref::<InputError>(),
            Some(InputError::InvalidValue { field, reason, .. })
                if field == "name" && reason == "a value is required"
        )),
        Outcome::Success(_) => panic!("an account without a name should not be created"),
    }
    assert!(seen.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_null_mandatory_value_is_a_record_failure() -> Result<()> {
    let (_dir, path) = write_input("accounts.json", r#"[{"name": null, "age": 3}, {"name": "ok"}]"#);
    let mut seen = Vec::new();

    let report = create_all(&runner(multi(true)), &file(&path, FileFormat::Json), &mut Recorder::default(), &mut seen).await?;

    assert_eq!(report.failed(), 1);
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].name, "ok");
    Ok(())
}

struct ClosedOutput;

impl Reporter<String> for ClosedOutput {
    fn success(&mut self, _result: &String) -> Result<()> {
        Err(anyhow!("broken pipe"))
    }

    fn failure(&mut self, _id: Option<&str>, _error: &anyhow::Error) -> Result<()> {
        Err(anyhow!("broken pipe"))
    }
}

#[tokio::test]
async fn test_reporter_errors_end_the_batch() -> Result<()> {
    let (_dir, path) = write_input("accounts.csv", "name\nb\na\nc\n");
    let mut seen = 0;

    let err = runner(multi(true))
        .run(&file(&path, FileFormat::Csv), &Account::default(), &NoFlags, &mut no_input(), &mut ClosedOutput, |account: Account| {
            seen += 1;
            async move {
                if account.name == "b" {
                    Err(anyhow!("409 conflict"))
                } else {
                    Ok(account.name)
                }
            }
        })
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "broken pipe");
    assert_eq!(seen, 1);
    Ok(())
}

#[tokio::test]
async fn test_json_must_be_an_array_of_objects() -> Result<()> {
    let (_dir, path) = write_input("single.json", r#"{"name":"a"}"#);
    let err = create_all(&runner(multi(true)), &file(&path, FileFormat::Json), &mut Recorder::default(), &mut Vec::new())
        .await
        .unwrap_err();
    assert!(matches!(err.downcast_ref::<InputError>(), Some(InputError::NotAnArray { .. })));

    let (_dir, path) = write_input("mixed.json", r#"[{"name":"a"}, 3]"#);
    let mut seen = Vec::new();
    let err = create_all(&runner(multi(true)), &file(&path, FileFormat::Json), &mut Recorder::default(), &mut seen)
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<InputError>(),
        Some(InputError::NotAnObject { index: 1, .. })
    ));
    assert!(seen.is_empty());

    let (_dir, path) = write_input("broken.json", "[{");
    let err = create_all(&runner(multi(true)), &file(&path, FileFormat::Json), &mut Recorder::default(), &mut Vec::new())
        .await
        .unwrap_err();
    assert!(matches!(err.downcast_ref::<InputError>(), Some(InputError::Parse { .. })));
    Ok(())
}

#[tokio::test]
async fn test_missing_file_is_an_io_error() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("absent.csv");

    let err = create_all(&runner(multi(true)), &file(&path, FileFormat::Csv), &mut Recorder::default(), &mut Vec::new())
        .await
        .unwrap_err();

    assert!(matches!(err.downcast_ref::<InputError>(), Some(InputError::Io { .. })));
    Ok(())
}

#[tokio::test]
async fn test_flag_mode_prompts_for_mandatory_fields() -> Result<()> {
    let runner = runner(multi(false));
    let flags = MapSource::default().with("age", Value::Int(41));
    let mut output = Vec::new();
    let mut prompt = LinePrompt::new(Cursor::new("\nbob\n"), &mut output);
    let mut seen = Vec::new();

    let report = runner
        .run(&InputSource::Flags, &Account::default(), &flags, &mut prompt, &mut (), |account: Account| {
            seen.push(account.clone());
            async move { Ok(account.name) }
        })
        .await?;
    drop(prompt);

    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(
        seen,
        vec![Account {
            name: "bob".to_string(),
            age: 41,
            ..Account::default()
        }]
    );
    let transcript = String::from_utf8(output)?;
    assert_eq!(transcript.matches("name (account name): ").count(), 2);
    assert!(transcript.contains("a value is required"));
    Ok(())
}

#[tokio::test]
async fn test_flag_mode_rejects_invalid_explicit_value() -> Result<()> {
    let flags = MapSource::default()
        .with("name", Value::Str("ann".to_string()))
        .with("age", Value::Int(-1));
    let mut called = false;

    let err = runner(multi(false))
        .run(&InputSource::Flags, &Account::default(), &flags, &mut no_input(), &mut (), |account: Account| {
            called = true;
            async move { Ok(account.name) }
        })
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<InputError>(),
        Some(InputError::InvalidValue { .. })
    ));
    assert!(!called);
    Ok(())
}

#[tokio::test]
async fn test_prompt_end_of_input_aborts() -> Result<()> {
    let err = runner(multi(false))
        .run(&InputSource::Flags, &Account::default(), &NoFlags, &mut no_input(), &mut (), |account: Account| async move {
            Ok(account.name)
        })
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<InputError>(),
        Some(InputError::PromptEof(field)) if field == "name"
    ));
    Ok(())
}

#[tokio::test]
async fn test_single_mode_applies_only_explicit_values() -> Result<()> {
    let options = BulkOptions::default();
    let seed = Account {
        name: "orig".to_string(),
        age: 50,
        admin: true,
        tags: vec!["keep".to_string()],
        scores: vec![9],
    };
    let flags = MapSource::default().with("scores", Value::IntList(vec![1, 2]));
    let mut updated = None;

    runner(options)
        .run(&InputSource::Flags, &seed, &flags, &mut no_input(), &mut (), |account: Account| {
            updated = Some(account.clone());
            async move { Ok(account.name) }
        })
        .await?;

    assert_eq!(updated, Some(Account { scores: vec![1, 2], ..seed }));
    Ok(())
}

#[tokio::test]
async fn test_single_mode_rejects_file_input() -> Result<()> {
    let (_dir, path) = write_input("accounts.csv", "name\na\n");

    let err = create_all(&runner(BulkOptions::default()), &file(&path, FileFormat::Csv), &mut Recorder::default(), &mut Vec::new())
        .await
        .unwrap_err();

    assert!(matches!(err.downcast_ref::<InputError>(), Some(InputError::FileNotAllowed)));
    Ok(())
}

#[test]
fn test_input_source_from_args() {
    assert_eq!(InputSource::from_args(None, "json").unwrap(), InputSource::Flags);
    assert_eq!(
        InputSource::from_args(Some(Path::new("in.csv")), "CSV").unwrap(),
        file(Path::new("in.csv"), FileFormat::Csv)
    );
    assert!(matches!(
        InputSource::from_args(Some(Path::new("in.xml")), "xml"),
        Err(InputError::UnsupportedFormat(format)) if format == "xml"
    ));
}

#[test]
#[should_panic(expected = "5 fields declared but 4 setters supplied")]
fn test_setter_count_mismatch_panics() {
    let mut setters = account_setters();
    setters.pop();
    BulkRunner::new(account_fields(), setters, BulkOptions::default());
}

#[test]
#[should_panic(expected = "field `age` is declared as Int")]
fn test_setter_type_mismatch_panics() {
    let mut setters = account_setters();
    setters[1] = Setter::string(|a: &mut Account, v| a.name = v);
    BulkRunner::new(account_fields(), setters, BulkOptions::default());
}

//! Config loading from disk and its effect on pipelines.

use std::io::Write;
use std::sync::Arc;

use deckscope_core::config::CONFIG_ENV;
use deckscope_core::domain::ConfigError;
use deckscope_core::{
    DeckscopeConfig, FailurePolicy, PipelineDefinition, PipelineKind, RubricCategory,
    ScriptedModelClient, TextRetriever,
};

const CONFIG: &str = r#"
[retry]
base_delay_ms = 100
max_delay_ms = 800

[pipelines.scoring]
failure_policy = "abort_on_failure"

[agents.team]
timeout_ms = 5000
max_retries = 4
"#;

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn loads_config_from_file() {
    let file = write_config(CONFIG);
    let config = DeckscopeConfig::load(file.path()).unwrap();

    assert_eq!(config.retry.base_delay_ms, 100);
    assert_eq!(config.retry.max_delay_ms, 800);
    assert_eq!(
        config.failure_policy(PipelineKind::Scoring),
        FailurePolicy::AbortOnFailure
    );
    assert_eq!(
        config.failure_policy(PipelineKind::Analysis),
        FailurePolicy::ContinueOnFailure
    );
}

#[test]
fn missing_file_is_a_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = DeckscopeConfig::load(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
    assert!(err.to_string().contains("absent.toml"));
}

#[test]
fn explicit_path_wins_over_defaults() {
    let file = write_config("[retry]\nbase_delay_ms = 5\nmax_delay_ms = 5\n");
    let config = DeckscopeConfig::load_or_default(Some(file.path())).unwrap();
    assert_eq!(config.retry.base_delay_ms, 5);

    // Only meaningful when the variable is unset in the test environment.
    if std::env::var_os(CONFIG_ENV).is_none() {
        assert_eq!(
            DeckscopeConfig::load_or_default(None).unwrap(),
            DeckscopeConfig::default()
        );
    }
}

#[test]
fn overrides_reach_the_standard_battery() {
    let file = write_config(CONFIG);
    let config = DeckscopeConfig::load(file.path()).unwrap();

    let definition = PipelineDefinition::standard(
        PipelineKind::Scoring,
        Arc::new(TextRetriever::new()),
        Arc::new(ScriptedModelClient::new()),
        &config,
    )
    .unwrap();

    assert_eq!(definition.failure_policy(), FailurePolicy::AbortOnFailure);
    let team = definition
        .agents()
        .iter()
        .find(|a| a.descriptor().name == "team")
        .unwrap();
    assert_eq!(team.descriptor().timeout_ms, 5_000);
    assert_eq!(team.descriptor().max_retries, 4);

    let market = definition
        .agents()
        .iter()
        .find(|a| a.descriptor().name == "market")
        .unwrap();
    assert_eq!(market.descriptor().max_retries, 2);
}

#[test]
fn custom_mapping_table_replaces_builtin() {
    let file = write_config(
        r#"
[category_mapping]
team = [{ target = "team_execution", percentage = 0.5 }, { target = "exit_potential", percentage = 0.5 }]
"#,
    );
    let config = DeckscopeConfig::load(file.path()).unwrap();
    let mapper = config.category_mapper().unwrap();

    assert!(mapper.is_mapped(RubricCategory::ExitPotential));
    assert!(!mapper.is_mapped(RubricCategory::MarketOpportunity));
}

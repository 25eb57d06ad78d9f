//! The deploy log: one INFO line per confirmed contract and one ERROR
//! line for the task that stopped the run.

use dtrust_deploy::core::{DeploymentPlan, DeploymentTask};
use dtrust_deploy::deployer::DeployError;
use dtrust_deploy::log::{self, LogLevel};
use dtrust_deploy::Error;

use crate::fixtures::{manager, temp_dir, RecordingDeployer, RecordingHarness};

fn count_lines(contents: &str, needle: &str) -> usize {
    contents.lines().filter(|line| line.contains(needle)).count()
}

/// Given a four-task plan whose third task reverts
/// When the plan runs with logging directed to a file
/// Then the log holds two "deployed at" lines and one "failed" line
#[tokio::test]
async fn test_log_lines_for_partial_run() {
    let dir = temp_dir();
    log::init_at(&dir.path().join("deploy.log"));
    log::set_level(LogLevel::Info);
    let path = log::log_path().expect("logging initialized").to_path_buf();

    let plan = DeploymentPlan::new("logged")
        .task(DeploymentTask::new("LogGovernance").arg(manager()))
        .task(DeploymentTask::new("LogToken").address_of("LogGovernance"))
        .task(DeploymentTask::new("LogFactory").address_of("LogGovernance"))
        .task(DeploymentTask::new("LogKey").address_of("LogGovernance"));
    let deployer = RecordingDeployer::failing_on(
        "LogFactory",
        DeployError::Reverted("factory init failed".to_string()),
    );
    let harness = RecordingHarness::with_deployer(&plan, deployer);

    let err = harness.sequencer.run(&plan).await.unwrap_err();
    assert!(matches!(err, Error::DeploymentFailure(_)));

    let contents = std::fs::read_to_string(&path).unwrap();
    assert_eq!(count_lines(&contents, "] LogGovernance deployed at 0x"), 1);
    assert_eq!(count_lines(&contents, "] LogToken deployed at 0x"), 1);
    let deployed = contents
        .lines()
        .filter(|line| line.contains("] Log") && line.contains(" deployed at 0x"))
        .count();
    assert_eq!(deployed, 2);
    assert_eq!(
        count_lines(&contents, "[ERROR] LogFactory failed: constructor reverted: factory init failed"),
        1
    );
    assert_eq!(count_lines(&contents, "] LogFactory deployed at"), 0);
    assert_eq!(count_lines(&contents, "LogKey deployed at"), 0);
    assert_eq!(count_lines(&contents, "LogKey failed"), 0);
}

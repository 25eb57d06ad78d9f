//! Address logs, plan files and build-directory artifacts on disk.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use dtrust_deploy::artifact::BuildDirRegistry;
use dtrust_deploy::core::{presets, DeploymentPlan};
use dtrust_deploy::deployer::{ChainConfig, LocalChain};
use dtrust_deploy::{AddressLog, Error, Sequencer};

use crate::fixtures::{manager, temp_dir, ChainHarness};

fn write_artifact(dir: &Path, name: &str) {
    let json = serde_json::json!({
        "contractName": name,
        "abi": [],
        "bytecode": format!("0x6080604052{}", "00".repeat(32)),
        "deployedBytecode": "0x",
        "sourcePath": format!("contracts/{}.sol", name),
    });
    fs::write(dir.join(format!("{}.json", name)), json.to_string()).unwrap();
}

#[tokio::test]
async fn test_address_log_saved_and_found() {
    let runs = temp_dir();
    let plan = presets::governance(manager());
    let report = ChainHarness::new(&plan)
        .sequencer
        .execute(&plan)
        .await
        .unwrap();

    let log = AddressLog::new(report.run_id, &report.plan, &report.deployed);
    let path = log.save_in(runs.path()).unwrap();
    assert!(path.starts_with(runs.path()));

    let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["plan"], "governance");
    assert_eq!(raw["contracts"][0]["name"], "Governance");
    assert_eq!(raw["contracts"][4]["position"], 4);

    let found = AddressLog::find(runs.path(), &report.run_id.short()).unwrap();
    assert_eq!(found.get("DTtoken"), Some(report.deployed[1].address));
    assert_eq!(AddressLog::latest(runs.path()).unwrap().run_id, report.run_id);
}

#[tokio::test]
async fn test_partial_log_after_failure() {
    let runs = temp_dir();
    let plan = presets::governance(manager());
    let harness = ChainHarness::new(&plan);
    harness.chain.revert_on("PRtoken", "out of gas").await;

    let report = harness.sequencer.execute(&plan).await.unwrap();
    let log = AddressLog::new(report.run_id, &report.plan, &report.deployed).failed_at("PRtoken");
    log.save_in(runs.path()).unwrap();

    let loaded = AddressLog::latest(runs.path()).unwrap();
    assert!(!loaded.is_complete());
    assert_eq!(loaded.len(), 3);
    assert_eq!(loaded.get("PRtoken"), None);
}

#[tokio::test]
async fn test_build_dir_artifacts_and_plan_file() {
    let build = temp_dir();
    for name in ["Governance", "DTtoken", "DTRUSTFactory"] {
        write_artifact(build.path(), name);
    }
    let plan_path = build.path().join("core.toml");
    fs::write(
        &plan_path,
        r#"
[[task]]
name = "Governance"
args = ["$manager"]

[[task]]
name = "DTtoken"
args = ["$manager", { address_of = "Governance" }]

[[task]]
name = "Factory"
contract = "DTRUSTFactory"
args = [{ address_of = "Governance" }]
"#,
    )
    .unwrap();

    let plan = DeploymentPlan::load(&plan_path, Some(manager())).unwrap();
    let registry = Arc::new(BuildDirRegistry::new(build.path()).unwrap());
    let chain = Arc::new(LocalChain::new(ChainConfig::default()));

    let deployed = Sequencer::new(registry, chain.clone())
        .run(&plan)
        .await
        .unwrap();

    assert_eq!(plan.name, "core");
    assert_eq!(deployed.len(), 3);
    assert_eq!(deployed[2].name, "Factory");
    assert_eq!(deployed[2].contract, "DTRUSTFactory");
    assert_eq!(deployed[2].args[0].as_address(), Some(deployed[0].address));
    let created: Vec<String> = chain.deployments().await.into_iter().map(|(c, _)| c).collect();
    assert_eq!(created, vec!["Governance", "DTtoken", "DTRUSTFactory"]);
}

#[tokio::test]
async fn test_build_dir_missing_artifact() {
    let build = temp_dir();
    write_artifact(build.path(), "Governance");
    let plan = presets::governance(manager());
    let chain = Arc::new(LocalChain::new(ChainConfig::default()));
    let registry = Arc::new(BuildDirRegistry::new(build.path()).unwrap());

    let err = Sequencer::new(registry, chain.clone())
        .run(&plan)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::ArtifactNotFound(name) if name == "DTtoken"));
    assert_eq!(chain.nonce().await, 0);
}

#[tokio::test]
async fn test_chain_snapshot_file() {
    let dir = temp_dir();
    let path = dir.path().join("chain.json");
    let plan = presets::factory(manager());

    let chain = Arc::new(LocalChain::load_or_new(&path, ChainConfig::default()).unwrap());
    ChainHarness::on_chain(&plan, chain.clone())
        .sequencer
        .run(&plan)
        .await
        .unwrap();
    chain.snapshot().await.save(&path).unwrap();

    let resumed = LocalChain::load_or_new(&path, ChainConfig::default()).unwrap();
    assert_eq!(resumed.nonce().await, 1);
}

//! End-to-end provisioning sequences against an in-memory node.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use clusterseed::test_support::{FakeHost, HostCall, SequentialClusterIds};
use clusterseed::{
    KUBECONFIG_PATH, KUBELET_PULL_SECRET_PATH, Kubeconfig, PULL_SECRET_MANIFEST_PATH,
    ProvisionError, ProvisionInputs, ProvisionSettings, ProvisioningOrchestrator, PullSecret,
    RemoteHost, Step,
};
use rstest::{fixture, rstest};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

const KUBECONFIG: &str = "apiVersion: v1\nkind: Config\nclusters: []\n";
const PULL_SECRET: &str = "{\"auths\":{\"registry.example.com\":{\"auth\":\"dXNlcjpwYXNz\"}}}";

#[fixture]
fn inputs() -> ProvisionInputs {
    ProvisionInputs::new(Kubeconfig::new(KUBECONFIG), PullSecret::new(PULL_SECRET))
}

fn orchestrator() -> ProvisioningOrchestrator<SequentialClusterIds> {
    ProvisioningOrchestrator::with_settings(
        SequentialClusterIds::new(),
        ProvisionSettings::default(),
    )
}

fn write(path: &str, content: &str, privileged: bool) -> HostCall {
    HostCall::Write {
        path: path.to_owned(),
        content: content.to_owned(),
        privileged,
    }
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn successful_provision_runs_every_step_in_order(inputs: ProvisionInputs) {
    let host = FakeHost::new();
    let remote = RemoteHost::new(&host, &host);

    orchestrator()
        .provision(&remote, &inputs, &CancellationToken::new())
        .await
        .expect("provisioning should succeed");

    let manifest = inputs.pull_secret.manifest();
    assert_eq!(
        host.calls(),
        vec![
            write(KUBECONFIG_PATH, KUBECONFIG, false),
            write(PULL_SECRET_MANIFEST_PATH, &manifest, false),
            HostCall::StartService(String::from("kubelet")),
            HostCall::ReplacePullSecret,
            HostCall::PatchClusterId {
                cluster_id: String::from("cluster-id-1"),
            },
            HostCall::StopService(String::from("kubelet")),
            HostCall::StopAndRemovePods,
            write(KUBELET_PULL_SECRET_PATH, PULL_SECRET, true),
        ]
    );
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn installed_files_match_inputs(inputs: ProvisionInputs) {
    let host = FakeHost::new();
    let remote = RemoteHost::new(&host, &host);

    orchestrator()
        .provision(&remote, &inputs, &CancellationToken::new())
        .await
        .expect("provisioning should succeed");

    assert_eq!(host.file(KUBECONFIG_PATH).as_deref(), Some(KUBECONFIG));
    assert_eq!(host.file(KUBELET_PULL_SECRET_PATH).as_deref(), Some(PULL_SECRET));

    let manifest = host
        .file(PULL_SECRET_MANIFEST_PATH)
        .expect("manifest should be installed");
    let encoded = manifest
        .lines()
        .find_map(|line| line.trim().strip_prefix(".dockerconfigjson: "))
        .expect("manifest should embed the secret");
    let decoded = STANDARD.decode(encoded).expect("valid base64");
    assert_eq!(decoded, PULL_SECRET.as_bytes());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn unavailable_api_times_out_once_and_still_finishes(inputs: ProvisionInputs) {
    let host = FakeHost::new();
    host.fail_commands_containing("replace -f");
    let remote = RemoteHost::new(&host, &host);
    let started = Instant::now();

    let err = orchestrator()
        .provision(&remote, &inputs, &CancellationToken::new())
        .await
        .expect_err("replacement should time out");

    assert!(matches!(err, ProvisionError::Aggregate(_)), "got: {err:?}");
    let timeouts = err
        .causes()
        .iter()
        .filter(|cause| matches!(cause, ProvisionError::Timeout { .. }))
        .count();
    assert_eq!(timeouts, 1, "got: {err}");
    assert_eq!(err.causes().len(), 1, "got: {err}");
    assert!(started.elapsed() >= Duration::from_secs(80));

    let calls = host.calls();
    assert!(calls.contains(&HostCall::PatchClusterId {
        cluster_id: String::from("cluster-id-1"),
    }));
    assert!(calls.contains(&HostCall::StopService(String::from("kubelet"))));
    assert!(calls.contains(&HostCall::StopAndRemovePods));
    assert_eq!(
        calls.last(),
        Some(&write(KUBELET_PULL_SECRET_PATH, PULL_SECRET, true))
    );
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn cleanup_failures_keep_their_order(inputs: ProvisionInputs) {
    let host = FakeHost::new();
    host.fail_commands_containing("systemctl stop");
    host.fail_commands_containing("crictl");
    let remote = RemoteHost::new(&host, &host);

    let err = orchestrator()
        .provision(&remote, &inputs, &CancellationToken::new())
        .await
        .expect_err("cleanup should fail");

    let steps: Vec<&str> = err
        .causes()
        .iter()
        .map(|cause| match cause {
            ProvisionError::Service { .. } => "service",
            ProvisionError::CommandFailed {
                step: Step::RemoveWorkloads,
                ..
            } => "workloads",
            _ => "other",
        })
        .collect();
    assert_eq!(steps, vec!["service", "workloads"]);
    assert_eq!(
        host.file(KUBELET_PULL_SECRET_PATH).as_deref(),
        Some(PULL_SECRET)
    );
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn cancellation_mid_poll_still_cleans_up(inputs: ProvisionInputs) {
    let host = FakeHost::new();
    host.fail_commands_containing("replace -f");
    let remote = RemoteHost::new(&host, &host);
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();

    let orchestrator = orchestrator();
    let provisioning = orchestrator.provision(&remote, &inputs, &cancel);
    let interrupt = async move {
        tokio::time::sleep(Duration::from_millis(4_500)).await;
        trigger.cancel();
    };
    let (result, ()) = tokio::join!(provisioning, interrupt);

    let err = result.expect_err("cancelled run should fail");
    assert_eq!(
        err.causes(),
        &[
            ProvisionError::Cancelled {
                step: Step::ReplacePullSecret,
            },
            ProvisionError::Cancelled {
                step: Step::PatchClusterId,
            },
        ]
    );

    let calls = host.calls();
    let replacements = calls
        .iter()
        .filter(|call| **call == HostCall::ReplacePullSecret)
        .count();
    assert_eq!(replacements, 5);
    assert!(calls.contains(&HostCall::StopService(String::from("kubelet"))));
    assert_eq!(calls.last(), Some(&HostCall::StopAndRemovePods));
    assert_eq!(host.file(KUBELET_PULL_SECRET_PATH), None);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn each_run_draws_a_fresh_cluster_id(inputs: ProvisionInputs) {
    let host = FakeHost::new();
    let remote = RemoteHost::new(&host, &host);
    let orchestrator = orchestrator();

    for _ in 0..2 {
        orchestrator
            .provision(&remote, &inputs, &CancellationToken::new())
            .await
            .expect("provisioning should succeed");
    }

    let ids: Vec<String> = host
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            HostCall::PatchClusterId { cluster_id } => Some(cluster_id),
            _ => None,
        })
        .collect();
    assert_eq!(ids, vec!["cluster-id-1", "cluster-id-2"]);
}

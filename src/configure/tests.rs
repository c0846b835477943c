//! Unit tests for the configure bracket.

use std::time::Duration;

use super::*;
use crate::remote::RemoteError;
use crate::test_support::{FakeHost, HostCall, SequentialClusterIds};
use rstest::{fixture, rstest};
use tokio::time::Instant;

#[fixture]
fn settings() -> ProvisionSettings {
    ProvisionSettings::default()
}

async fn configure(
    host: &FakeHost,
    ids: &SequentialClusterIds,
    settings: &ProvisionSettings,
    cancel: &CancellationToken,
) -> Result<(), ProvisionError> {
    let remote = RemoteHost::new(host, host);
    ClusterConfigurer::new(&remote, ids, settings)
        .run(cancel)
        .await
}

fn count(host: &FakeHost, wanted: &HostCall) -> usize {
    host.calls().iter().filter(|call| *call == wanted).count()
}

#[test]
fn states_advance_in_order_and_stop_at_done() {
    let mut state = ConfigureState::Idle;
    let mut visited = Vec::new();
    while state != ConfigureState::Done {
        state = state.next();
        visited.push(state);
    }
    assert_eq!(
        visited,
        vec![
            ConfigureState::ServiceStarting,
            ConfigureState::SecretReplacing,
            ConfigureState::ClusterIdPatching,
            ConfigureState::CleaningUp,
            ConfigureState::Done,
        ]
    );
    assert_eq!(ConfigureState::Done.next(), ConfigureState::Done);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn successful_run_brackets_cluster_steps(settings: ProvisionSettings) {
    let host = FakeHost::new();
    let ids = SequentialClusterIds::new();

    configure(&host, &ids, &settings, &CancellationToken::new())
        .await
        .expect("configure should succeed");

    assert_eq!(
        host.calls(),
        vec![
            HostCall::StartService(String::from("kubelet")),
            HostCall::ReplacePullSecret,
            HostCall::PatchClusterId {
                cluster_id: String::from("cluster-id-1"),
            },
            HostCall::StopService(String::from("kubelet")),
            HostCall::StopAndRemovePods,
        ]
    );
    assert_eq!(ids.issued(), 1);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn replacement_is_polled_until_api_answers(settings: ProvisionSettings) {
    let host = FakeHost::new();
    host.fail_commands_containing_times("replace -f", 3);
    let ids = SequentialClusterIds::new();
    let started = Instant::now();

    configure(&host, &ids, &settings, &CancellationToken::new())
        .await
        .expect("configure should recover");

    assert_eq!(count(&host, &HostCall::ReplacePullSecret), 4);
    assert_eq!(started.elapsed(), Duration::from_secs(3));
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn replacement_timeout_still_runs_later_states(settings: ProvisionSettings) {
    let host = FakeHost::new();
    host.fail_commands_containing("replace -f");
    let ids = SequentialClusterIds::new();
    let started = Instant::now();

    let err = configure(&host, &ids, &settings, &CancellationToken::new())
        .await
        .expect_err("replacement should time out");

    let causes = err.causes();
    assert_eq!(causes.len(), 1, "unexpected causes: {err}");
    assert!(
        matches!(
            causes.first(),
            Some(ProvisionError::Timeout {
                step: Step::ReplacePullSecret,
                last_error: RemoteError::CommandFailure { .. },
                ..
            })
        ),
        "got: {err:?}"
    );
    assert!(started.elapsed() >= Duration::from_secs(80));
    assert_eq!(
        count(
            &host,
            &HostCall::PatchClusterId {
                cluster_id: String::from("cluster-id-1"),
            }
        ),
        1
    );
    assert_eq!(count(&host, &HostCall::StopService(String::from("kubelet"))), 1);
    assert_eq!(count(&host, &HostCall::StopAndRemovePods), 1);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn cleanup_failures_are_aggregated_in_order(settings: ProvisionSettings) {
    let host = FakeHost::new();
    host.fail_commands_containing("systemctl stop");
    host.fail_commands_containing("crictl");
    let ids = SequentialClusterIds::new();

    let err = configure(&host, &ids, &settings, &CancellationToken::new())
        .await
        .expect_err("cleanup should fail");

    match err.causes() {
        [
            ProvisionError::Service {
                action: ServiceAction::Stop,
                ..
            },
            ProvisionError::CommandFailed {
                step: Step::RemoveWorkloads,
                ..
            },
        ] => {}
        other => panic!("unexpected causes: {other:?}"),
    }
    assert_eq!(count(&host, &HostCall::StopAndRemovePods), 2);
    assert!(err.to_string().starts_with("2 error(s) occurred: 1) failed to stop service kubelet"));
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn workload_cleanup_retries_once(settings: ProvisionSettings) {
    let host = FakeHost::new();
    host.fail_commands_containing_times("crictl", 1);
    let ids = SequentialClusterIds::new();
    let started = Instant::now();

    configure(&host, &ids, &settings, &CancellationToken::new())
        .await
        .expect("second cleanup attempt should succeed");

    assert_eq!(count(&host, &HostCall::StopAndRemovePods), 2);
    assert_eq!(started.elapsed(), Duration::from_secs(2));
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn failed_start_does_not_stop_the_bracket(settings: ProvisionSettings) {
    let host = FakeHost::new();
    host.fail_commands_containing("systemctl start");
    let ids = SequentialClusterIds::new();

    let err = configure(&host, &ids, &settings, &CancellationToken::new())
        .await
        .expect_err("start failure should be reported");

    assert!(
        matches!(
            err.causes(),
            [ProvisionError::Service {
                action: ServiceAction::Start,
                ..
            }]
        ),
        "got: {err:?}"
    );
    assert_eq!(host.calls().len(), 5);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn cancellation_skips_polling_but_not_cleanup(settings: ProvisionSettings) {
    let host = FakeHost::new();
    let ids = SequentialClusterIds::new();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = configure(&host, &ids, &settings, &cancel)
        .await
        .expect_err("cancelled polls should be reported");

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
    assert_eq!(
        host.calls(),
        vec![
            HostCall::StartService(String::from("kubelet")),
            HostCall::StopService(String::from("kubelet")),
            HostCall::StopAndRemovePods,
        ]
    );
    assert_eq!(ids.issued(), 1);
}

#[tokio::test(start_paused = true)]
async fn service_name_comes_from_settings() {
    let settings = ProvisionSettings {
        service_name: String::from("crio"),
        ..ProvisionSettings::default()
    };
    let host = FakeHost::new();
    let ids = SequentialClusterIds::new();

    configure(&host, &ids, &settings, &CancellationToken::new())
        .await
        .expect("configure should succeed");

    let calls = host.calls();
    assert_eq!(calls.first(), Some(&HostCall::StartService(String::from("crio"))));
    assert!(calls.contains(&HostCall::StopService(String::from("crio"))));
}

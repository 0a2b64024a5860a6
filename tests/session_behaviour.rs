//! Session planning through the public API against the in-memory cloud.

use std::net::{IpAddr, Ipv4Addr};

use camino::Utf8PathBuf;
use remote_docker::instance::InstanceState;
use remote_docker::test_support::{FakeCloud, ScriptedRunner};
use remote_docker::{
    InstanceError, InstanceLocator, PortForwardSet, SessionError, SessionPlanner, ServiceTag,
    SshIdentity, SyncError,
};
use rstest::{fixture, rstest};

const HOST: IpAddr = IpAddr::V4(Ipv4Addr::new(203, 0, 113, 7));

#[fixture]
fn cloud() -> FakeCloud {
    let cloud = FakeCloud::new(HOST);
    cloud.seed_instance("i-1", InstanceState::Running);
    cloud
}

fn planner(
    cloud: &FakeCloud,
    runner: ScriptedRunner,
) -> SessionPlanner<&FakeCloud, ScriptedRunner> {
    SessionPlanner::new(
        InstanceLocator::new(cloud, ServiceTag::new("remote-docker-ec2-agent")),
        runner,
        SshIdentity::new("ubuntu", "/keys/id_rsa"),
    )
}

#[rstest]
fn sync_prepares_remote_then_returns_watch_session(cloud: FakeCloud) {
    let runner = ScriptedRunner::new();
    runner.push_success();
    runner.push_success();

    let watch = planner(&cloud, runner.clone())
        .sync(
            vec![
                Utf8PathBuf::from("/work/api"),
                Utf8PathBuf::from("/work/web"),
            ],
            &[String::from("node_modules/")],
        )
        .expect("sync plan");

    let calls = runner.invocations();
    assert_eq!(calls.len(), 2);
    let preflight = calls.first().expect("preflight call");
    assert_eq!(preflight.program, "ssh");
    assert_eq!(
        preflight.args.last().map(String::as_str),
        Some("sudo install -d -o ubuntu -g ubuntu /work/api /work/web")
    );
    let push = calls.get(1).expect("push call");
    assert_eq!(push.program, "unison");
    assert!(push.args.ends_with(&[String::from("-force"), String::from("/work")]));
    assert_eq!(watch.program(), "unison");
    assert!(watch.render().contains("ssh://ubuntu@203.0.113.7//work"));
    assert!(watch.render().ends_with("-path api -path web -repeat watch"));
}

#[rstest]
fn invalid_directories_fail_before_any_remote_call(cloud: FakeCloud) {
    let runner = ScriptedRunner::new();

    let err = planner(&cloud, runner.clone())
        .sync(vec![Utf8PathBuf::from("/a")], &[])
        .expect_err("too shallow");

    assert_eq!(
        err,
        SessionError::Sync(SyncError::TooShallow {
            path: Utf8PathBuf::from("/a")
        })
    );
    assert_eq!(cloud.describe_calls(), 0);
    assert!(runner.invocations().is_empty());
}

#[rstest]
fn failed_preflight_stops_before_unison(cloud: FakeCloud) {
    let runner = ScriptedRunner::new();
    runner.push_failure(1);

    let err = planner(&cloud, runner.clone())
        .sync(vec![Utf8PathBuf::from("/work/api")], &[])
        .expect_err("preflight fails");

    assert!(matches!(err, SessionError::Process(_)));
    assert_eq!(runner.invocations().len(), 1);
}

#[rstest]
fn tunnel_requires_a_running_instance() {
    let cloud = FakeCloud::new(HOST);
    cloud.seed_instance("i-1", InstanceState::Stopped);

    let err = planner(&cloud, ScriptedRunner::new())
        .tunnel("me", &PortForwardSet::new(), &PortForwardSet::new())
        .expect_err("stopped");

    assert_eq!(
        err,
        SessionError::Instance(InstanceError::NotRunning {
            state: InstanceState::Stopped
        })
    );
}

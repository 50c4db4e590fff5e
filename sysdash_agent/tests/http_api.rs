//! End-to-end tests of the HTTP surface against an ephemeral-port server.
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use sysdash_agent::actions::{ActionPolicy, HostActionDispatcher, HostOs, RecordingRunner};
use sysdash_agent::api::router;
use sysdash_agent::config::AgentConfig;
use sysdash_agent::provider::fake::{FakeProvider, KillBehavior};
use sysdash_agent::provider::host::HostProvider;
use sysdash_agent::provider::{ProviderError, TelemetryProvider};
use sysdash_agent::state::AppState;

async fn serve(state: AppState) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.expect("serve");
    });
    format!("http://{addr}")
}

fn fake_state(fake: FakeProvider) -> (AppState, Arc<RecordingRunner>) {
    let provider: Arc<dyn TelemetryProvider> = Arc::new(fake);
    let runner = Arc::new(RecordingRunner::new());
    let cfg = AgentConfig {
        cpu_interval: Duration::from_millis(10),
        ..AgentConfig::default()
    };
    let actions = HostActionDispatcher::new(provider.clone(), runner.clone(), cfg.actions.clone())
        .with_os(HostOs::Linux)
        .with_user(Some("tester".into()));
    let state = AppState::new(provider, runner.clone(), &cfg).with_actions(actions);
    (state, runner)
}

async fn get_json(url: String) -> (u16, Value) {
    let res = reqwest::get(url).await.expect("request");
    let status = res.status().as_u16();
    (status, res.json().await.expect("json body"))
}

async fn post_json(url: String) -> (u16, Value) {
    let res = reqwest::Client::new()
        .post(url)
        .send()
        .await
        .expect("request");
    let status = res.status().as_u16();
    (status, res.json().await.expect("json body"))
}

#[tokio::test]
async fn summary_has_dashboard_shape() {
    let fake = FakeProvider::new().with_sensor("coretemp", "Package id 0", Some(48.0));
    let (state, _) = fake_state(fake);
    let base = serve(state).await;

    let (status, js) = get_json(format!("{base}/api/summary")).await;
    assert_eq!(status, 200);
    assert_eq!(js["cpu_percent"], 12.5);
    assert_eq!(js["per_cpu"].as_array().map(Vec::len), Some(2));
    for block in ["memory", "swap", "disk"] {
        for key in ["total", "used", "percent"] {
            assert!(js[block][key].is_number(), "{block}.{key}");
        }
    }
    assert_eq!(js["disk"]["temperature"], 48.0);
    assert_eq!(js["system"]["total_ram"], 8.0);
    assert_eq!(js["system"]["cpu"], "Fake CPU @ 1.00GHz");
    assert!(js["system"]["uptime"].is_string());
    assert_eq!(js["time"].as_str().map(str::len), Some(8));
}

#[tokio::test]
async fn summary_survives_missing_sensors() {
    let mut fake = FakeProvider::new();
    fake.sensors = Err(ProviderError::unavailable("no sensors"));
    let (state, _) = fake_state(fake);
    let base = serve(state).await;
    let (status, js) = get_json(format!("{base}/api/summary")).await;
    assert_eq!(status, 200);
    assert!(js["disk"]["temperature"].is_null());
}

#[tokio::test]
async fn processes_ranked_and_limited() {
    let fake = FakeProvider::new()
        .with_processes(&[
            (1, "a", 1.0, 0.5),
            (2, "b", 50.0, 0.5),
            (3, "c", 25.0, 0.5),
            (4, "d", 75.0, 0.5),
        ])
        .with_failing_process(ProviderError::AccessDenied);
    let (state, _) = fake_state(fake);
    let base = serve(state).await;

    let (status, js) = get_json(format!("{base}/api/processes?limit=2")).await;
    assert_eq!(status, 200);
    let pids: Vec<u64> = js
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|p| p["pid"].as_u64())
        .collect();
    assert_eq!(pids, vec![4, 2]);

    let (_, js) = get_json(format!("{base}/api/processes")).await;
    assert_eq!(js.as_array().map(Vec::len), Some(4));

    let (status, js) = get_json(format!("{base}/api/processes?limit=-3")).await;
    assert_eq!(status, 200);
    assert_eq!(js, serde_json::json!([]));
}

#[tokio::test]
async fn kill_statuses() {
    let fake = FakeProvider::new()
        .with_kill(100, KillBehavior::Killable)
        .with_kill(101, KillBehavior::Denied);
    let (state, _) = fake_state(fake);
    let base = serve(state).await;

    let (status, js) = post_json(format!("{base}/api/processes/100/kill")).await;
    assert_eq!(status, 200);
    assert_eq!(js["success"], true);

    let (status, js) = post_json(format!("{base}/api/processes/101/kill")).await;
    assert_eq!(status, 403);
    assert_eq!(js["success"], false);
    assert_eq!(js["message"], "Access denied");

    let (status, js) = post_json(format!("{base}/api/processes/999/kill")).await;
    assert_eq!(status, 404);
    assert_eq!(js["message"], "Process not found");

    let (status, js) = post_json(format!("{base}/api/processes/abc/kill")).await;
    assert_eq!(status, 400);
    assert_eq!(js["success"], false);
}

#[tokio::test]
async fn power_actions_issue_commands() {
    let (state, runner) = fake_state(FakeProvider::new());
    let base = serve(state).await;

    let (status, js) = post_json(format!("{base}/api/shutdown")).await;
    assert_eq!((status, js), (200, serde_json::json!({ "success": true })));
    let (status, _) = post_json(format!("{base}/api/restart")).await;
    assert_eq!(status, 200);

    // user-kill logoff is opt-in
    let (status, js) = post_json(format!("{base}/api/logoff")).await;
    assert_eq!(status, 403);
    assert_eq!(js["success"], false);

    let lines: Vec<String> = runner.issued().iter().map(|c| c.command_line()).collect();
    assert_eq!(lines, vec!["shutdown -h now", "shutdown -r now"]);
}

#[tokio::test]
async fn logoff_with_opt_in() {
    let provider: Arc<dyn TelemetryProvider> = Arc::new(FakeProvider::new());
    let runner = Arc::new(RecordingRunner::new());
    let policy = ActionPolicy {
        enabled: true,
        allow_user_kill: true,
    };
    let actions = HostActionDispatcher::new(provider.clone(), runner.clone(), policy)
        .with_os(HostOs::Linux)
        .with_user(Some("tester".into()));
    let state = AppState::new(provider, runner.clone(), &AgentConfig::default()).with_actions(actions);
    let base = serve(state).await;

    let (status, js) = post_json(format!("{base}/api/logoff")).await;
    assert_eq!((status, js), (200, serde_json::json!({ "success": true })));
    assert_eq!(runner.issued()[0].command_line(), "pkill -KILL -u tester");
}

#[tokio::test]
async fn index_serves_dashboard() {
    let (state, _) = fake_state(FakeProvider::new());
    let base = serve(state).await;
    let res = reqwest::get(format!("{base}/")).await.expect("request");
    assert_eq!(res.status().as_u16(), 200);
    let body = res.text().await.expect("body");
    assert!(body.contains("/api/summary"));
}

#[tokio::test]
async fn live_host_top_five() {
    // Guarantee at least five processes even on a bare container.
    let mut sleepers: Vec<std::process::Child> = (0..5)
        .filter_map(|_| {
            std::process::Command::new("sleep")
                .arg("30")
                .stdout(std::process::Stdio::null())
                .spawn()
                .ok()
        })
        .collect();
    let provider: Arc<dyn TelemetryProvider> =
        Arc::new(tokio::task::spawn_blocking(HostProvider::new).await.expect("provider"));
    let runner = Arc::new(RecordingRunner::new());
    let state = AppState::new(provider, runner, &AgentConfig::default());
    let base = serve(state).await;

    let (status, js) = get_json(format!("{base}/api/processes?limit=5")).await;
    assert_eq!(status, 200);
    let list = js.as_array().expect("array");
    assert_eq!(list.len(), 5, "a test host runs at least five processes");
    let cpus: Vec<f64> = list
        .iter()
        .map(|p| {
            assert!(p["pid"].is_u64());
            assert!(p["name"].is_string());
            assert!(p["memory_percent"].is_number());
            assert!(p["status"].is_string());
            p["cpu_percent"].as_f64().expect("cpu_percent")
        })
        .collect();
    assert!(cpus.windows(2).all(|w| w[0] >= w[1]), "not descending: {cpus:?}");

    for child in &mut sleepers {
        let _ = child.kill();
        let _ = child.wait();
    }
}

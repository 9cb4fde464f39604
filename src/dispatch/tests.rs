use super::*;
use crate::bus::{BusEvent, LocalBus, PEER_KEY};
use crate::config::{Config, LiveConfig};
use crate::db::Persistence;
use crate::error::HandlerError;
use crate::handlers::{HandlerClass, HandlerModule, ModuleRegistry, system};
use crate::state::Identity;
use bee_proto::{Params, RuleSpec, ShortcutTable};
use serde_json::Value as Json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

struct Harness {
    dispatcher: Dispatcher,
    bus: Arc<LocalBus>,
}

fn system_rule() -> RuleSpec {
    RuleSpec {
        m: Some("system".into()),
        ..RuleSpec::default()
    }
}

async fn harness(free: Vec<RuleSpec>) -> Harness {
    let mut config: Config =
        toml::from_str("[server]\nname = \"test-hive\"\n[console]\nenabled = false\n").unwrap();
    config.free_actions = free;
    let bus = Arc::new(LocalBus::bind(&config.bus).unwrap());
    let db = Persistence::bind("sqlite::memory:").await.unwrap();
    let registry = Arc::new(ModuleRegistry::new(false));
    system::register(&registry);
    let authority = PermissionAuthority::new(&config.free_actions).unwrap();
    let live = Arc::new(LiveConfig::new("unused.toml", config));
    let hive = Arc::new(Hive::new(bus.clone(), db, live, registry));
    Harness {
        dispatcher: Dispatcher::new(hive, authority, ShortcutSet::empty()),
        bus,
    }
}

fn command(m: &str, c: &str, f: &str, data: Json) -> Json {
    json!({ "_m": m, "_c": c, "_f": f, "data": data })
}

fn text(value: Json) -> Payload {
    Payload::Text(value.to_string())
}

fn drain(rx: &mut broadcast::Receiver<BusEvent>) -> Vec<BusEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn realtime_client(h: &Harness) -> (Client, mpsc::Receiver<String>) {
    let (tx, rx) = mpsc::channel(16);
    let peer: SocketAddr = "127.0.0.1:40000".parse().unwrap();
    let client = h
        .dispatcher
        .hive()
        .sessions
        .add_client(Transport::Realtime, Some(peer), Some(tx));
    (client, rx)
}

async fn next_frame(rx: &mut mpsc::Receiver<String>) -> Json {
    let frame = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    serde_json::from_str(&frame).unwrap()
}

#[tokio::test]
async fn test_batch_failure_does_not_block_next_element() {
    let h = harness(vec![system_rule()]).await;
    let mut events = h.bus.psubscribe();
    let (client, mut out) = realtime_client(&h);

    let batch = json!([
        command("system", "Diag", "fail", json!({"_sc": 1, "msg": "boom"})),
        command("system", "Info", "ping", json!({"_sc": 1})),
    ]);
    let outcomes = h.dispatcher.dispatch_realtime(&client, text(batch)).await;

    assert_eq!(outcomes.len(), 2);
    assert!(matches!(&outcomes[0], Outcome::Failed(e) if e.to_string() == "boom"));
    assert!(matches!(&outcomes[1], Outcome::Succeeded(Value::Map(_))));

    let reply = next_frame(&mut out).await;
    assert_eq!(reply["target"], "system.Info.ping");
    assert_eq!(reply["result"]["pong"], true);
    assert_eq!(reply["result"]["server"], "test-hive");

    let published = drain(&mut events);
    let exp = published.iter().find(|e| e.channel == "bee-exp").unwrap();
    assert_eq!(exp.payload["desc"], "boom");
    assert_eq!(exp.payload[PEER_KEY], "127.0.0.1:40000");
}

#[tokio::test]
async fn test_msgpack_batch_with_bad_element() {
    let h = harness(vec![system_rule()]).await;
    let (client, _out) = realtime_client(&h);

    let batch = json!([
        {"_c": "Info", "_f": "ping", "data": {}},
        command("system", "Diag", "echo", json!({"_sc": 1, "n": 7})),
    ]);
    let bytes = rmp_serde::to_vec_named(&batch).unwrap();
    let outcomes = h
        .dispatcher
        .dispatch_realtime(&client, Payload::Binary(bytes))
        .await;

    assert!(matches!(&outcomes[0], Outcome::Rejected(_)));
    let Outcome::Succeeded(Value::Map(echoed)) = &outcomes[1] else {
        panic!("expected echo result, got {:?}", outcomes[1]);
    };
    assert_eq!(echoed["n"], Value::Int(7));
}

#[tokio::test]
async fn test_undecodable_frame_is_rejected() {
    let h = harness(vec![system_rule()]).await;
    let (client, _out) = realtime_client(&h);
    let outcomes = h
        .dispatcher
        .dispatch_realtime(&client, Payload::Text("{not json".into()))
        .await;
    assert_eq!(outcomes.len(), 1);
    assert!(matches!(&outcomes[0], Outcome::Rejected(_)));
}

#[tokio::test]
async fn test_default_realtime_invocation_is_spawned() {
    let h = harness(vec![system_rule()]).await;
    let (client, mut out) = realtime_client(&h);

    let frame = text(command("system", "Info", "uptime", json!({})));
    let outcomes = h.dispatcher.dispatch_realtime(&client, frame).await;
    assert!(matches!(outcomes[..], [Outcome::Spawned]));

    let reply = next_frame(&mut out).await;
    assert_eq!(reply["target"], "system.Info.uptime");
    assert!(reply["result"].as_str().unwrap().contains(':'));
}

async fn settled(h: &Harness) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while h.dispatcher.pending_tasks() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_spawned_failure_does_not_block_next_element() {
    let h = harness(vec![system_rule()]).await;
    let mut events = h.bus.psubscribe();
    let (client, mut out) = realtime_client(&h);

    let batch = json!([
        command("system", "Diag", "fail", json!({"msg": "boom"})),
        command("system", "Info", "ping", json!({})),
    ]);
    let outcomes = h.dispatcher.dispatch_realtime(&client, text(batch)).await;
    assert!(matches!(outcomes[..], [Outcome::Spawned, Outcome::Spawned]));

    let reply = next_frame(&mut out).await;
    assert_eq!(reply["target"], "system.Info.ping");
    assert_eq!(reply["result"]["pong"], true);

    let exp = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = events.recv().await.unwrap();
            if event.channel == "bee-exp" {
                return event;
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(exp.payload["desc"], "boom");
    assert_eq!(exp.payload[PEER_KEY], "127.0.0.1:40000");
}

#[tokio::test]
async fn test_spawned_command_is_counted_and_timed_once_settled() {
    crate::metrics::init();
    let counter = crate::metrics::COMMAND_COUNTER.get().unwrap();
    let latency = crate::metrics::COMMAND_LATENCY.get().unwrap();
    let spawned = counter.with_label_values(&["realtime", "spawned"]);
    let succeeded = counter.with_label_values(&["realtime", "succeeded"]);
    let timed = latency.with_label_values(&["realtime"]);

    let h = harness(vec![RuleSpec::default()]).await;
    h.dispatcher.hive().registry.register(Transport::Realtime, "slow", || {
        Ok(HandlerModule::new("slow").class(HandlerClass::new("Work").function(
            "nap",
            "",
            |_inv| async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(Value::from("rested"))
            },
        )))
    });
    let (client, mut out) = realtime_client(&h);
    let succeeded_before = succeeded.get();
    let timed_before = timed.get_sample_sum();

    let frame = text(command("slow", "Work", "nap", json!({})));
    let outcomes = h.dispatcher.dispatch_realtime(&client, frame).await;
    assert!(matches!(outcomes[..], [Outcome::Spawned]));

    assert_eq!(next_frame(&mut out).await["result"], "rested");
    settled(&h).await;

    assert_eq!(spawned.get(), 0);
    assert!(succeeded.get() > succeeded_before);
    assert!(timed.get_sample_sum() - timed_before >= 0.2);
}

#[tokio::test]
async fn test_denied_is_published() {
    let h = harness(Vec::new()).await;
    let mut events = h.bus.psubscribe();
    let (client, _out) = realtime_client(&h);

    let frame = text(command("system", "Info", "ping", json!({"_sc": 1})));
    let outcomes = h.dispatcher.dispatch_realtime(&client, frame).await;
    assert!(matches!(&outcomes[0], Outcome::Denied(_)));

    let published = drain(&mut events);
    let error = published.iter().find(|e| e.channel == "bee-error").unwrap();
    assert_eq!(error.payload["desc"], "Permission denied!");
    assert_eq!(error.payload["detail"], "system.Info.ping");
}

#[tokio::test]
async fn test_session_rules_and_static_calls() {
    let h = harness(Vec::new()).await;
    let (client, mut out) = realtime_client(&h);
    let rule = bee_proto::PermissionRule::new(RuleSpec {
        c: Some("Diag".into()),
        ..RuleSpec::default()
    })
    .unwrap();
    client
        .session
        .write()
        .login(Identity::new("u1"), vec![rule], Params::new());

    let frame = text(command("system", "Diag", "whoami", json!({"_sc": 1})));
    let outcomes = h.dispatcher.dispatch_realtime(&client, frame).await;
    assert!(matches!(&outcomes[0], Outcome::Succeeded(Value::Str(uid)) if uid == "u1"));
    assert_eq!(next_frame(&mut out).await["result"], "u1");

    let frame = text(command("system", "Diag", "whoami", json!({"_sc": 1, "_st": 1})));
    let outcomes = h.dispatcher.dispatch_realtime(&client, frame).await;
    assert!(matches!(&outcomes[0], Outcome::Succeeded(Value::Null)));

    // Granted Diag, not Info.
    let frame = text(command("system", "Info", "ping", json!({"_sc": 1})));
    let outcomes = h.dispatcher.dispatch_realtime(&client, frame).await;
    assert!(matches!(&outcomes[0], Outcome::Denied(_)));
}

#[tokio::test]
async fn test_console_is_exempt_from_permissions() {
    let h = harness(Vec::new()).await;
    let client = h
        .dispatcher
        .hive()
        .sessions
        .add_client(Transport::Console, None, None);
    let caller = Caller {
        session: Arc::clone(&client.session),
        client: Some(client),
    };

    let outcome = h
        .dispatcher
        .dispatch_console(&caller, "system/Diag/echo a='i+ 3' b=hello")
        .await;
    let Outcome::Succeeded(Value::Map(echoed)) = outcome else {
        panic!("expected echo result, got {outcome:?}");
    };
    assert_eq!(echoed["a"], Value::Int(3));
    assert_eq!(echoed["b"], Value::from("hello"));

    let outcome = h
        .dispatcher
        .dispatch_console(&caller, "system/Diag/echo n='i+ x'")
        .await;
    assert!(matches!(outcome, Outcome::Rejected(_)));
}

#[tokio::test]
async fn test_web_dispatch() {
    let h = harness(vec![system_rule()]).await;
    let mut events = h.bus.psubscribe();

    let outcome = h.dispatcher.dispatch_web("/system/Info/ping", None).await;
    assert!(matches!(outcome, Outcome::Succeeded(Value::Map(_))));

    let outcome = h.dispatcher.dispatch_web("/a/b/Info/ping", None).await;
    assert!(matches!(
        outcome,
        Outcome::Rejected(DispatchError::Protocol(ProtocolError::Parse(_)))
    ));

    let outcome = h.dispatcher.dispatch_web("/shop/Cart/add", None).await;
    assert!(matches!(outcome, Outcome::Denied(_)));

    let outcome = h.dispatcher.dispatch_web("/system/Nope/ping", None).await;
    assert!(matches!(outcome, Outcome::NotFound(DispatchError::UnknownClass { .. })));

    let published = drain(&mut events);
    assert!(published.iter().any(|e| e.channel == "bee-error"));
    assert!(published.iter().any(|e| e.channel == "bee-exp"));
}

#[tokio::test]
async fn test_unknown_module_event() {
    let h = harness(vec![RuleSpec::default()]).await;
    let mut events = h.bus.psubscribe();

    let outcome = h.dispatcher.dispatch_web("/nope/A/b", None).await;
    assert!(matches!(outcome, Outcome::NotFound(DispatchError::UnknownModule { .. })));
    let published = drain(&mut events);
    let error = published.iter().find(|e| e.channel == "bee-error").unwrap();
    assert_eq!(error.payload["desc"], "Module not found, action-> nope.A.b");
}

#[tokio::test]
async fn test_help_short_circuit() {
    let h = harness(vec![RuleSpec::default()]).await;
    h.dispatcher.hive().registry.register(Transport::Web, "plain", || {
        Ok(HandlerModule::new("plain")
            .class(HandlerClass::new("Box").function("open", "", |_inv| async { Ok(Value::Null) })))
    });

    let outcome = h.dispatcher.dispatch_web("/system/Info/ping?_help=1", None).await;
    assert!(matches!(outcome, Outcome::HelpReturned(doc) if doc.starts_with("Liveness check")));

    let outcome = h.dispatcher.dispatch_web("/plain/Box/open?_h=1", None).await;
    assert!(matches!(outcome, Outcome::HelpReturned(doc) if doc == MISSING_DOC));

    let outcome = h.dispatcher.dispatch_web("/system/Diag/help", None).await;
    let Outcome::Succeeded(Value::List(entries)) = outcome else {
        panic!("expected a listing");
    };
    assert!(entries.contains(&Value::from("system.Diag.echo")));
    assert!(!entries.contains(&Value::from("system.Diag.fail")));
}

#[tokio::test]
async fn test_force_reload() {
    let h = harness(vec![RuleSpec::default()]).await;
    let mut events = h.bus.psubscribe();
    let builds = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&builds);
    h.dispatcher
        .hive()
        .registry
        .register(Transport::Realtime, "shop", move || {
            let generation = counter.fetch_add(1, Ordering::SeqCst) as i64;
            Ok(HandlerModule::new("shop").class(HandlerClass::new("Cart").function(
                "generation",
                "",
                move |_inv| async move { Ok(Value::Int(generation)) },
            )))
        });
    let (client, _out) = realtime_client(&h);

    let call = |data: Json| text(command("shop", "Cart", "generation", data));
    let first = h.dispatcher.dispatch_realtime(&client, call(json!({"_sc": 1}))).await;
    assert!(matches!(first[0], Outcome::Succeeded(Value::Int(0))));

    let reloaded = h
        .dispatcher
        .dispatch_realtime(&client, call(json!({"_sc": 1, "_reload": 1})))
        .await;
    assert!(matches!(reloaded[0], Outcome::Succeeded(Value::Int(1))));
    assert_eq!(builds.load(Ordering::SeqCst), 2);

    let published = drain(&mut events);
    let notice = published.iter().find(|e| e.channel == "bee-info").unwrap();
    assert_eq!(notice.payload["desc"], "Reloading shop");
}

#[tokio::test]
async fn test_panics_are_contained() {
    let h = harness(vec![RuleSpec::default()]).await;
    h.dispatcher.hive().registry.register(Transport::Realtime, "bad", || {
        Ok(HandlerModule::new("bad").class(HandlerClass::new("Code").function(
            "boom",
            "",
            |_inv| async { panic!("kaboom") },
        )))
    });
    let (client, _out) = realtime_client(&h);

    let frame = text(command("bad", "Code", "boom", json!({"_sc": 1})));
    let outcomes = h.dispatcher.dispatch_realtime(&client, frame).await;
    assert!(matches!(&outcomes[0], Outcome::Failed(DispatchError::Panicked(msg)) if msg == "kaboom"));
}

#[tokio::test]
async fn test_handler_errors_map_to_failed() {
    let h = harness(vec![RuleSpec::default()]).await;
    let (client, _out) = realtime_client(&h);
    let frame = text(command("system", "Info", "online", json!({"_sc": 1})));
    let outcomes = h.dispatcher.dispatch_realtime(&client, frame).await;
    assert!(matches!(
        &outcomes[0],
        Outcome::Failed(DispatchError::Handler(HandlerError::MissingParam(p))) if p == "uid"
    ));
}

#[tokio::test]
async fn test_shortcut_applies_before_validation() {
    let h = harness(vec![system_rule()]).await;
    h.dispatcher.shortcuts().set(
        Transport::Realtime,
        ShortcutTable::from_yaml_str("p:\n  _m: system\n  _c: Info\n  _f: ping\n").unwrap(),
    );
    let (client, _out) = realtime_client(&h);

    let frame = text(json!({"_f": "p", "data": {"_sc": 1}}));
    let outcomes = h.dispatcher.dispatch_realtime(&client, frame).await;
    assert!(matches!(&outcomes[0], Outcome::Succeeded(Value::Map(_))));
}

#[tokio::test]
async fn test_shutdown_aborts_background_tasks() {
    let h = harness(vec![RuleSpec::default()]).await;
    h.dispatcher.hive().registry.register(Transport::Realtime, "slow", || {
        Ok(HandlerModule::new("slow").class(HandlerClass::new("Work").function(
            "nap",
            "",
            |_inv| async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(Value::Null)
            },
        )))
    });
    let (client, _out) = realtime_client(&h);
    let token = client.killed();

    let frame = text(command("slow", "Work", "nap", json!({})));
    let outcomes = h.dispatcher.dispatch_realtime(&client, frame).await;
    assert!(matches!(outcomes[..], [Outcome::Spawned]));
    assert_eq!(h.dispatcher.pending_tasks(), 1);

    tokio::time::timeout(Duration::from_secs(5), h.dispatcher.shutdown())
        .await
        .unwrap();
    assert_eq!(h.dispatcher.pending_tasks(), 0);
    assert!(token.is_cancelled());
    assert!(h.dispatcher.hive().sessions.is_empty());
}

#[tokio::test]
async fn test_realtime_help_is_pushed_to_caller() {
    let h = harness(vec![system_rule()]).await;
    let (client, mut out) = realtime_client(&h);

    let frame = command("system", "Info", "uptime", json!({"_h": 1}));
    let outcomes = h.dispatcher.dispatch_realtime(&client, text(frame)).await;
    assert!(matches!(&outcomes[0], Outcome::HelpReturned(doc) if doc == "Time since the daemon started."));

    let pushed = next_frame(&mut out).await;
    assert_eq!(pushed["target"], "system.Info.uptime");
    assert_eq!(pushed["help"], "Time since the daemon started.");
}

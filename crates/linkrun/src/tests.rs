//! Tests for the Peer against recording and failing transports.

use std::any::Any;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use serde_json::json;

use linkwire::ApplyFrame;
use linkwire::Descriptor;
use linkwire::FinalizeFrame;
use linkwire::Message;
use linkwire::OobFrame;
use linkwire::ResultFrame;
use linkwire::Tagged;

use crate::channel::ChannelTransport;
use crate::error::Error;
use crate::peer::Peer;
use crate::serializer::Serializer;
use crate::target::Fault;
use crate::target::Object;
use crate::target::Target;
use crate::transport;
use crate::transport::Transport;
use crate::value::Value;

/// Records every sent buffer. Never delivers anything inbound.
#[derive(Clone, Default)]
struct RecordingTransport {
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl RecordingTransport {
    fn messages(&self) -> Vec<Message> {
        let sent = self.sent.lock().unwrap();
        sent.iter().map(|bytes| linkwire::decode(bytes).expect("peer sent an undecodable frame")).collect()
    }

    fn results(&self) -> Vec<ResultFrame> {
        self.messages()
            .into_iter()
            .filter_map(|m| match m {
                Message::Result(frame) => Some(frame),
                _ => None,
            })
            .collect()
    }

    fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, payload: &[u8]) -> transport::Result<()> {
        self.sent.lock().unwrap().push(payload.to_vec());
        Ok(())
    }

    async fn recv(&self) -> transport::Result<Option<Vec<u8>>> {
        futures::future::pending().await
    }
}

/// Rejects every send. Never delivers anything inbound.
struct FailingTransport;

#[async_trait::async_trait]
impl Transport for FailingTransport {
    async fn send(&self, _payload: &[u8]) -> transport::Result<()> {
        Err(transport::Error::ConnectionLost("wire cut".into()))
    }

    async fn recv(&self) -> transport::Result<Option<Vec<u8>>> {
        futures::future::pending().await
    }
}

/// Reports the far side as closed immediately.
struct ClosedTransport;

#[async_trait::async_trait]
impl Transport for ClosedTransport {
    async fn send(&self, _payload: &[u8]) -> transport::Result<()> {
        Ok(())
    }

    async fn recv(&self) -> transport::Result<Option<Vec<u8>>> {
        Ok(None)
    }
}

fn recording_peer() -> (Peer, RecordingTransport) {
    let transport = RecordingTransport::default();
    let peer = Peer::new("local", "remote", Box::new(transport.clone()));
    (peer, transport)
}

/// Polls `cond` until it holds, failing the test after a second.
async fn eventually(mut cond: impl FnMut() -> bool) {
    let waited = tokio::time::timeout(Duration::from_secs(1), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "condition not reached in time");
}

fn remote_id(tagged: &Tagged) -> (u64, u64) {
    match tagged {
        Tagged::Remote(d) => (d.remote_id, d.finalizer_generation),
        other => panic!("expected a remote descriptor, got {:?}", other),
    }
}

fn echo() -> Arc<Object> {
    Object::builder("Echo")
        .method("echo", |args: Vec<Value>| async move { Ok(Value::List(args)) })
        .oneway("poke", |_args: Vec<Value>| async move { Ok(Value::null()) })
        .build()
}

// --- Serialization ---

#[tokio::test]
async fn test_data_passes_through_unchanged() {
    let (peer, _) = recording_peer();
    let data = json!({ "a": [1, 2, { "b": null }], "c": "text" });

    let tagged = peer.serialize(&Value::from(data.clone())).unwrap();
    assert_eq!(tagged, Tagged::Data { value: data.clone() });
    assert_eq!(peer.exposed_count(), 0);

    let back = peer.deserialize(tagged).unwrap();
    assert_eq!(back, Value::Data(data));
}

#[tokio::test]
async fn test_reexposing_bumps_generation_and_keeps_id() {
    let (peer, _) = recording_peer();
    let value = Value::from(echo());

    let (id_a, gen_a) = remote_id(&peer.serialize(&value).unwrap());
    let (id_b, gen_b) = remote_id(&peer.serialize(&value).unwrap());

    assert_eq!(id_a, id_b);
    assert_eq!((gen_a, gen_b), (1, 2));
    assert_eq!(peer.exposed_generation(id_a), Some(2));
    assert_eq!(peer.exposed_count(), 1);
}

#[tokio::test]
async fn test_distinct_objects_get_distinct_ids() {
    let (peer, _) = recording_peer();
    let (a, _) = remote_id(&peer.serialize(&Value::from(echo())).unwrap());
    let (b, _) = remote_id(&peer.serialize(&Value::from(echo())).unwrap());
    assert_ne!(a, b);
}

#[tokio::test]
async fn test_descriptor_carries_metadata() {
    let (peer, _) = recording_peer();
    let object = Object::builder("Widget")
        .properties(json!({ "size": 3 }))
        .oneway("ping", |_args: Vec<Value>| async move { Ok(Value::null()) })
        .build();

    match peer.serialize(&Value::from(object)).unwrap() {
        Tagged::Remote(Descriptor { constructor_tag, declared_properties, oneway_methods, .. }) => {
            assert_eq!(constructor_tag, "Widget");
            assert_eq!(declared_properties, Some(json!({ "size": 3 })));
            assert_eq!(oneway_methods, Some(vec!["ping".to_string()]));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn test_back_reference_resolves_to_original_object() {
    let (peer, _) = recording_peer();
    let value = Value::from(echo());
    let (id, _) = remote_id(&peer.serialize(&value).unwrap());

    let back = peer.deserialize(Tagged::Local { local_id: id }).unwrap();
    assert_eq!(back, value);
}

#[tokio::test]
async fn test_unknown_local_id_is_rejected() {
    let (peer, _) = recording_peer();
    let err = peer.deserialize(Tagged::Local { local_id: 99 }).unwrap_err();
    assert_eq!(err, Error::InvalidLocalId(99));
}

#[tokio::test]
async fn test_descriptors_for_same_id_share_one_handle() {
    let (peer, _) = recording_peer();
    let descriptor = |generation| {
        Tagged::Remote(Descriptor {
            remote_id: 5,
            finalizer_generation: generation,
            constructor_tag: "Thing".into(),
            declared_properties: None,
            oneway_methods: None,
        })
    };

    let a = peer.deserialize(descriptor(1)).unwrap().into_remote().unwrap();
    let b = peer.deserialize(descriptor(3)).unwrap().into_remote().unwrap();
    let c = peer.deserialize(descriptor(2)).unwrap().into_remote().unwrap();

    assert!(a.ptr_eq(&b) && b.ptr_eq(&c));
    // Generations only move forward.
    assert_eq!(a.generation(), 3);
}

#[tokio::test]
async fn test_handle_goes_home_as_back_reference() {
    let (peer, _) = recording_peer();
    let handle = peer
        .deserialize(Tagged::Remote(Descriptor {
            remote_id: 8,
            finalizer_generation: 1,
            constructor_tag: "Thing".into(),
            declared_properties: None,
            oneway_methods: None,
        }))
        .unwrap();

    assert_eq!(peer.serialize(&handle).unwrap(), Tagged::Local { local_id: 8 });
    assert_eq!(peer.exposed_count(), 0);
}

// --- Custom serializers ---

#[derive(Debug, PartialEq)]
struct Point {
    x: i64,
    y: i64,
}

#[async_trait::async_trait]
impl Target for Point {
    fn constructor_tag(&self) -> &str {
        "Point"
    }

    async fn invoke(&self, method: Option<&str>, _args: Vec<Value>) -> Result<Value, Fault> {
        Err(Fault::method_not_found("Point", method))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct PointSerializer;

impl Serializer for PointSerializer {
    fn serialize(&self, target: &dyn Target, _peer: &Peer) -> crate::Result<serde_json::Value> {
        let point = target.as_any().downcast_ref::<Point>().ok_or_else(|| Error::Serializer {
            tag: "Point".into(),
            details: "not a point".into(),
        })?;
        Ok(json!([point.x, point.y]))
    }

    fn deserialize(&self, encoded: serde_json::Value, _peer: &Peer) -> crate::Result<Value> {
        let x = encoded[0].as_i64().unwrap_or_default();
        let y = encoded[1].as_i64().unwrap_or_default();
        Ok(Value::object(Point { x, y }))
    }
}

#[tokio::test]
async fn test_registered_serializer_encodes_by_value() {
    let (peer, _) = recording_peer();
    peer.add_serializer("Point", PointSerializer);

    let tagged = peer.serialize(&Value::object(Point { x: 2, y: -7 })).unwrap();
    assert_eq!(
        tagged,
        Tagged::Custom { constructor_tag: "Point".into(), encoded: json!([2, -7]) }
    );
    assert_eq!(peer.exposed_count(), 0);

    let back = peer.deserialize(tagged).unwrap();
    let point = back.as_object().and_then(|t| t.as_any().downcast_ref::<Point>());
    assert_eq!(point, Some(&Point { x: 2, y: -7 }));
}

#[tokio::test]
async fn test_missing_deserializer_is_an_error() {
    let (peer, _) = recording_peer();
    let err = peer
        .deserialize(Tagged::Custom { constructor_tag: "Point".into(), encoded: json!([1, 1]) })
        .unwrap_err();
    assert_eq!(err, Error::MissingDeserializer("Point".into()));
}

#[tokio::test]
async fn test_serializers_are_per_peer() {
    let (with, _) = recording_peer();
    let (without, _) = recording_peer();
    with.add_serializer("Point", PointSerializer);

    let point = Value::object(Point { x: 0, y: 0 });
    assert!(matches!(with.serialize(&point).unwrap(), Tagged::Custom { .. }));
    assert!(matches!(without.serialize(&point).unwrap(), Tagged::Remote(_)));
}

// --- Inbound dispatch ---

#[tokio::test]
async fn test_apply_invokes_exposed_method() {
    let (peer, transport) = recording_peer();
    let (id, _) = remote_id(&peer.serialize(&Value::from(echo())).unwrap());

    let args = vec![Tagged::data(json!("hi"))];
    peer.handle_message(Message::Apply(ApplyFrame::call(7, id, Some("echo".into()), args)));

    eventually(|| !transport.results().is_empty()).await;
    let result = &transport.results()[0];
    assert_eq!(result.id, 7);
    assert_eq!(
        result.result,
        Some(Tagged::List { items: vec![Tagged::data(json!("hi"))] })
    );
}

#[tokio::test]
async fn test_unknown_method_faults_with_method_not_found() {
    let (peer, transport) = recording_peer();
    let (id, _) = remote_id(&peer.serialize(&Value::from(echo())).unwrap());

    peer.handle_message(Message::Apply(ApplyFrame::call(3, id, Some("nope".into()), vec![])));
    // The object has no call handler either.
    peer.handle_message(Message::Apply(ApplyFrame::call(4, id, None, vec![])));

    eventually(|| transport.results().len() == 2).await;
    for result in transport.results() {
        assert!(result.is_error());
        assert_eq!(result.name.as_deref(), Some("MethodNotFound"));
    }
}

#[tokio::test]
async fn test_apply_to_unknown_proxy_replies_with_error() {
    let (peer, transport) = recording_peer();
    peer.handle_message(Message::Apply(ApplyFrame::call(11, 404, Some("x".into()), vec![])));

    eventually(|| !transport.results().is_empty()).await;
    let result = &transport.results()[0];
    assert_eq!(result.id, 11);
    assert_eq!(result.name.as_deref(), Some("UnknownProxy"));
    assert!(!peer.is_killed());
}

#[tokio::test]
async fn test_oneway_apply_never_replies() {
    let (peer, transport) = recording_peer();
    let calls = Arc::new(Mutex::new(0));
    let counter = calls.clone();
    let object = Object::builder("Sink")
        .oneway("push", move |_args: Vec<Value>| {
            let counter = counter.clone();
            async move {
                *counter.lock().unwrap() += 1;
                Err(Fault::new("Ignored", "one-way faults are dropped"))
            }
        })
        .build();
    let (id, _) = remote_id(&peer.serialize(&Value::from(object)).unwrap());

    peer.handle_message(Message::Apply(ApplyFrame::oneway(id, Some("push".into()), vec![])));
    peer.handle_message(Message::Apply(ApplyFrame::oneway(404, Some("push".into()), vec![])));

    eventually(|| *calls.lock().unwrap() == 1).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(transport.results().is_empty());
}

#[tokio::test]
async fn test_param_request_is_answered() {
    let (peer, transport) = recording_peer();
    peer.set_param("answer", 42);

    peer.handle_message(Message::Param(linkwire::ParamFrame { id: 1, param: "answer".into() }));
    peer.handle_message(Message::Param(linkwire::ParamFrame { id: 2, param: "missing".into() }));

    eventually(|| transport.results().len() == 2).await;
    let results = transport.results();
    assert_eq!(results[0].result, Some(Tagged::data(json!(42))));
    assert_eq!(results[1].name.as_deref(), Some("ParamNotFound"));
}

#[tokio::test]
async fn test_results_settle_pending_calls() {
    let (peer, transport) = recording_peer();

    let ok = tokio::spawn({
        let peer = peer.clone();
        async move { peer.get_param("a").await }
    });
    let err = tokio::spawn({
        let peer = peer.clone();
        async move { peer.get_param("b").await }
    });
    eventually(|| transport.count() == 2).await;

    let ids: Vec<(String, u64)> = transport
        .messages()
        .into_iter()
        .filter_map(|m| match m {
            Message::Param(frame) => Some((frame.param, frame.id)),
            _ => None,
        })
        .collect();
    let id_of = |name: &str| ids.iter().find(|(p, _)| p == name).map(|(_, id)| *id).unwrap();

    peer.handle_message(Message::Result(ResultFrame::err(
        id_of("b"),
        "TypeError",
        "bad thing",
        Some("at b".into()),
    )));
    peer.handle_message(Message::Result(ResultFrame::ok(id_of("a"), Tagged::data(json!("A")))));

    assert_eq!(ok.await.unwrap().unwrap(), Value::from("A"));
    match err.await.unwrap() {
        Err(Error::Remote(remote)) => {
            assert_eq!(remote.name, "TypeError");
            assert_eq!(remote.message, "bad thing");
            assert_eq!(remote.stack.as_deref(), Some("at b"));
            assert_eq!(remote.peer_name, "remote");
            assert_eq!(remote.self_name, "local");
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(peer.pending_calls(), 0);
}

#[tokio::test]
async fn test_result_for_unknown_call_is_ignored() {
    let (peer, _) = recording_peer();
    peer.handle_message(Message::Result(ResultFrame::ok(999, Tagged::null())));
    assert!(!peer.is_killed());
}

#[tokio::test]
async fn test_oob_reaches_handler() {
    let (peer, _) = recording_peer();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    peer.set_oob_handler(move |payload| sink.lock().unwrap().push(payload));

    peer.handle_message(Message::Oob(OobFrame { oob: json!({ "hello": true }) }));
    assert_eq!(*seen.lock().unwrap(), vec![json!({ "hello": true })]);
}

#[tokio::test]
async fn test_undecodable_frames_do_not_kill_the_peer() {
    let (peer, _) = recording_peer();
    peer.receive(b"not json");
    peer.receive(br#"{"type":"teleport"}"#);
    peer.receive(br#"{"id":1}"#);
    assert!(!peer.is_killed());
}

#[tokio::test]
async fn test_broken_result_rejects_its_call() {
    let (peer, transport) = recording_peer();
    let call = tokio::spawn({
        let peer = peer.clone();
        async move { peer.get_param("p").await }
    });
    eventually(|| transport.count() == 1).await;

    let id = match &transport.messages()[0] {
        Message::Param(frame) => frame.id,
        other => panic!("unexpected {:?}", other),
    };
    let frame = format!(r#"{{"type":"result","id":{},"result":{{"kind":"bogus"}}}}"#, id);
    peer.receive(frame.as_bytes());

    assert!(matches!(call.await.unwrap(), Err(Error::Wire(_))));
    assert!(!peer.is_killed());
}

#[tokio::test]
async fn test_broken_apply_is_answered_with_wire_error() {
    let (peer, transport) = recording_peer();
    let (id, _) = remote_id(&peer.serialize(&Value::from(echo())).unwrap());

    let frame = format!(r#"{{"type":"apply","id":5,"proxyId":{},"method":"echo","args":[{{"kind":"bogus"}}]}}"#, id);
    peer.receive(frame.as_bytes());
    // Missing its param name.
    peer.receive(br#"{"type":"param","id":6}"#);

    eventually(|| transport.results().len() == 2).await;
    let results = transport.results();
    assert_eq!(results[0].id, 5);
    assert_eq!(results[0].name.as_deref(), Some("WireError"));
    assert_eq!(results[1].id, 6);
    assert_eq!(results[1].name.as_deref(), Some("WireError"));
    assert!(!peer.is_killed());
}

#[tokio::test]
async fn test_broken_oneway_apply_gets_no_reply() {
    let (peer, transport) = recording_peer();
    peer.receive(br#"{"type":"apply","id":5,"proxyId":1,"args":"nope","oneway":true}"#);
    peer.receive(br#"{"type":"apply","proxyId":1,"args":"nope"}"#);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(transport.count(), 0);
}

// --- Finalization ---

#[tokio::test]
async fn test_stale_finalize_is_ignored() {
    let (peer, _) = recording_peer();
    let value = Value::from(echo());
    let (id, _) = remote_id(&peer.serialize(&value).unwrap());
    let (_, latest) = remote_id(&peer.serialize(&value).unwrap());
    assert_eq!(latest, 2);

    peer.handle_message(Message::Finalize(FinalizeFrame { local_id: id, finalizer_generation: 1 }));
    assert_eq!(peer.exposed_count(), 1);

    peer.handle_message(Message::Finalize(FinalizeFrame { local_id: id, finalizer_generation: 2 }));
    assert_eq!(peer.exposed_count(), 0);
    assert_eq!(peer.exposed_generation(id), None);

    // Exposed again from scratch.
    let (_, generation) = remote_id(&peer.serialize(&value).unwrap());
    assert_eq!(generation, 1);
}

#[tokio::test]
async fn test_finalize_for_unknown_id_is_a_no_op() {
    let (peer, _) = recording_peer();
    peer.handle_message(Message::Finalize(FinalizeFrame { local_id: 77, finalizer_generation: 1 }));
    assert!(!peer.is_killed());
}

#[tokio::test]
async fn test_dropping_last_handle_sends_finalize() {
    let (peer, transport) = recording_peer();
    let descriptor = |generation| {
        Tagged::Remote(Descriptor {
            remote_id: 12,
            finalizer_generation: generation,
            constructor_tag: "Thing".into(),
            declared_properties: None,
            oneway_methods: None,
        })
    };

    let first = peer.deserialize(descriptor(1)).unwrap();
    let second = peer.deserialize(descriptor(4)).unwrap();
    drop(first);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(transport.count(), 0);

    drop(second);
    eventually(|| transport.count() == 1).await;
    assert_eq!(
        transport.messages()[0],
        Message::Finalize(FinalizeFrame { local_id: 12, finalizer_generation: 4 })
    );
}

#[tokio::test]
async fn test_returned_handle_is_released_after_its_result() {
    let (peer, transport) = recording_peer();
    let identity = Object::function(|args: Vec<Value>| async move {
        Ok(args.into_iter().next().unwrap_or_else(Value::null))
    });
    let (id, _) = remote_id(&peer.serialize(&Value::from(identity)).unwrap());

    // The argument deserializes into a handle held only by the call itself.
    let arg = Tagged::Remote(Descriptor {
        remote_id: 5,
        finalizer_generation: 1,
        constructor_tag: "Greeter".into(),
        declared_properties: None,
        oneway_methods: None,
    });
    peer.handle_message(Message::Apply(ApplyFrame::call(9, id, None, vec![arg])));

    eventually(|| transport.count() == 2).await;
    let messages = transport.messages();
    match &messages[0] {
        Message::Result(result) => {
            assert_eq!(result.id, 9);
            assert_eq!(result.result, Some(Tagged::Local { local_id: 5 }));
        }
        other => panic!("expected the result first, got {:?}", other),
    }
    assert_eq!(
        messages[1],
        Message::Finalize(FinalizeFrame { local_id: 5, finalizer_generation: 1 })
    );
}

// --- Kill and transport failures ---

#[tokio::test]
async fn test_kill_rejects_pending_and_blocks_sends() {
    let (peer, transport) = recording_peer();
    let call = tokio::spawn({
        let peer = peer.clone();
        async move { peer.get_param("slow").await }
    });
    eventually(|| transport.count() == 1).await;

    peer.kill("shutting down");
    peer.kill("ignored second reason");
    assert!(peer.is_killed());
    assert_eq!(call.await.unwrap(), Err(Error::Killed("shutting down".into())));
    assert_eq!(peer.pending_calls(), 0);

    assert_eq!(peer.get_param("late").await, Err(Error::Killed("shutting down".into())));
    assert!(peer.send_oob(json!(1)).is_err());
    assert!(peer.serialize(&Value::from(1)).is_err());
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(transport.count(), 1);
}

#[tokio::test]
async fn test_kill_clears_reference_tables() {
    let (peer, _) = recording_peer();
    peer.serialize(&Value::from(echo())).unwrap();
    assert_eq!(peer.exposed_count(), 1);

    peer.kill("done");
    assert_eq!(peer.exposed_count(), 0);
    tokio::time::timeout(Duration::from_secs(1), peer.closed()).await.unwrap();
}

#[tokio::test]
async fn test_send_failure_rejects_only_that_call() {
    let peer = Peer::new("local", "remote", Box::new(FailingTransport));

    let err = peer.get_param("x").await.unwrap_err();
    assert_eq!(err, Error::Transport(transport::Error::ConnectionLost("wire cut".into())));
    assert!(!peer.is_killed());

    // Still usable afterwards.
    assert!(matches!(peer.get_param("y").await, Err(Error::Transport(_))));
}

#[tokio::test]
async fn test_closed_transport_kills_peer() {
    let peer = Peer::new("local", "remote", Box::new(ClosedTransport));
    tokio::time::timeout(Duration::from_secs(1), peer.closed()).await.unwrap();
    assert_eq!(peer.get_param("x").await, Err(Error::Killed("transport closed".into())));
}

#[tokio::test]
async fn test_handles_cannot_invoke_after_kill() {
    let (peer, transport) = recording_peer();
    let handle = peer
        .deserialize(Tagged::Remote(Descriptor {
            remote_id: 3,
            finalizer_generation: 1,
            constructor_tag: "Logger".into(),
            declared_properties: None,
            oneway_methods: Some(vec!["log".into()]),
        }))
        .unwrap()
        .into_remote()
        .unwrap();

    peer.kill("gone");
    let reason = Error::Killed("gone".into());
    assert_eq!(handle.method("flush").call(vec![]).await, Err(reason.clone()));
    assert_eq!(handle.method("log").call(vec![Value::from("x")]).await, Err(reason.clone()));
    assert_eq!(handle.call(vec![]).await, Err(reason));

    drop(handle);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(transport.count(), 0);
}

#[tokio::test]
async fn test_dropped_peer_releases_its_transport() {
    let (near, far) = ChannelTransport::pair();
    let peer = Peer::new("local", "remote", Box::new(near));
    let weak = Arc::downgrade(&peer.inner);
    assert!(!far.is_closed());

    drop(peer);
    eventually(|| weak.upgrade().is_none()).await;
    eventually(|| far.is_closed()).await;
    assert_eq!(far.recv().await, Ok(None));
}

#[tokio::test]
async fn test_live_handle_keeps_its_peer_running() {
    let (near, far) = ChannelTransport::pair();
    let peer = Peer::new("local", "remote", Box::new(near));
    let handle = peer
        .deserialize(Tagged::Remote(Descriptor {
            remote_id: 2,
            finalizer_generation: 1,
            constructor_tag: "Thing".into(),
            declared_properties: None,
            oneway_methods: None,
        }))
        .unwrap();
    drop(peer);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!far.is_closed());

    // Dropping the last handle still says goodbye before the peer goes.
    drop(handle);
    let bytes = tokio::time::timeout(Duration::from_secs(1), far.recv()).await.unwrap().unwrap().unwrap();
    assert_eq!(
        linkwire::decode(&bytes).unwrap(),
        Message::Finalize(FinalizeFrame { local_id: 2, finalizer_generation: 1 })
    );
    eventually(|| far.is_closed()).await;
}

#[tokio::test]
async fn test_port_delivers_whole_buffers_and_reports_close() {
    let (left, right) = ChannelTransport::pair();
    left.send(b"one").await.unwrap();
    left.send(b"two").await.unwrap();
    assert_eq!(right.recv().await, Ok(Some(b"one".to_vec())));
    assert_eq!(right.recv().await, Ok(Some(b"two".to_vec())));

    drop(right);
    assert!(left.is_closed());
    assert!(matches!(left.send(b"three").await, Err(transport::Error::ConnectionLost(_))));
    assert_eq!(left.recv().await, Ok(None));
}

//! # Inbound Dispatch
//!
//! Routes each decoded message to its handler. Handlers never fail the peer:
//! protocol errors are logged and, where a caller is waiting, answered with an
//! error `result`.
//!
//! `apply` is resolved synchronously (target lookup and argument decoding
//! happen in arrival order) and then runs as its own task, so a slow method
//! never holds up the frames behind it.

use tracing::debug;
use tracing::trace;
use tracing::warn;

use linkwire::ApplyFrame;
use linkwire::FinalizeFrame;
use linkwire::Header;
use linkwire::Message;
use linkwire::OobFrame;
use linkwire::ParamFrame;
use linkwire::ResultFrame;

use crate::error::Error;
use crate::error::RemoteError;
use crate::error::Result;
use crate::peer::Peer;
use crate::target::Fault;
use crate::value::Value;

impl Peer {
    /// Decodes one raw frame and handles it.
    pub fn receive(&self, bytes: &[u8]) {
        match linkwire::decode(bytes) {
            Ok(message) => self.handle_message(message),
            Err(e) => {
                warn!(peer = %self.self_name(), error = %e, "dropping undecodable frame");
                // A broken frame can still name the call it belongs to.
                if let Ok(header) = linkwire::decode_header(bytes) {
                    self.fail_broken(header, Error::Wire(e));
                }
            }
        }
    }

    /// A broken `result` rejects the call it answers; a broken `param` or
    /// two-way `apply` is answered with an error so its caller does not hang.
    fn fail_broken(&self, header: Header, error: Error) {
        let Some(id) = header.id else { return };
        match header.kind.as_str() {
            "result" => {
                self.settle(id, Err(error));
            }
            "param" | "apply" if !header.oneway && !self.is_killed() => {
                self.reply(ResultFrame::err(id, error.name(), error.to_string(), None));
            }
            _ => {}
        }
    }

    /// Handles one inbound message. Ignored once the peer is killed.
    pub fn handle_message(&self, message: Message) {
        if self.is_killed() {
            trace!(peer = %self.self_name(), kind = message.kind(), "ignoring message on killed peer");
            return;
        }

        trace!(peer = %self.self_name(), kind = message.kind(), "received");
        match message {
            Message::Param(frame) => self.on_param(frame),
            Message::Apply(frame) => self.on_apply(frame),
            Message::Result(frame) => self.on_result(frame),
            Message::Finalize(frame) => self.on_finalize(frame),
            Message::Oob(frame) => self.on_oob(frame),
        }
    }

    fn on_param(&self, frame: ParamFrame) {
        let value = self.inner.params.get(&frame.param).map(|v| v.value().clone());
        let reply = match &value {
            Some(value) => match self.serialize(value) {
                Ok(tagged) => ResultFrame::ok(frame.id, tagged),
                Err(e) => ResultFrame::err(frame.id, e.name(), e.to_string(), None),
            },
            None => {
                debug!(peer = %self.self_name(), param = %frame.param, "param not found");
                ResultFrame::err(frame.id, "ParamNotFound", format!("no param named '{}'", frame.param), None)
            }
        };
        self.reply(reply);
        drop(value);
    }

    fn on_apply(&self, frame: ApplyFrame) {
        let ApplyFrame { id, proxy_id, method, args, oneway } = frame;
        // A one-way call never gets a result, even if it carries an id.
        let reply_id = if oneway { None } else { id };

        let prepared = self.exposed_target(proxy_id).and_then(|target| {
            let args = args.into_iter().map(|arg| self.deserialize(arg)).collect::<Result<Vec<_>>>()?;
            Ok((target, args))
        });

        let (target, args) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => {
                warn!(peer = %self.self_name(), proxy_id, method = ?method, error = %e, "cannot apply");
                if let Some(id) = reply_id {
                    self.reply(ResultFrame::err(id, e.name(), e.to_string(), None));
                }
                return;
            }
        };

        let peer = self.clone();
        tokio::spawn(async move {
            let outcome = target.invoke(method.as_deref(), args).await;
            let Some(id) = reply_id else {
                if let Err(fault) = outcome {
                    debug!(peer = %peer.self_name(), proxy_id, %fault, "one-way call failed");
                }
                return;
            };

            // The returned value may hold the last clone of a handle the
            // result refers back to. It must outlive the queued result, or
            // its finalize would reach the owner first.
            let (reply, returned) = match outcome {
                Ok(value) => match peer.serialize(&value) {
                    Ok(tagged) => (ResultFrame::ok(id, tagged), Some(value)),
                    Err(e) => {
                        let fault = Fault::from(e);
                        (ResultFrame::err(id, fault.name, fault.message, fault.stack), Some(value))
                    }
                },
                Err(fault) => (ResultFrame::err(id, fault.name, fault.message, fault.stack), None),
            };
            peer.reply(reply);
            drop(returned);
        });
    }

    fn on_result(&self, frame: ResultFrame) {
        let id = frame.id;
        let outcome = if frame.is_error() {
            Err(Error::Remote(RemoteError {
                name: frame.name.unwrap_or_else(|| "Error".to_string()),
                message: frame.message.unwrap_or_default(),
                stack: frame.stack,
                peer_name: self.peer_name().to_string(),
                self_name: self.self_name().to_string(),
            }))
        } else {
            match frame.result {
                Some(tagged) => self.deserialize(tagged),
                None => Ok(Value::null()),
            }
        };

        if !self.settle(id, outcome) {
            warn!(peer = %self.self_name(), id, "result for unknown call");
        }
    }

    fn on_finalize(&self, frame: FinalizeFrame) {
        let FinalizeFrame { local_id, finalizer_generation } = frame;
        match self.release_exposed(local_id, finalizer_generation) {
            Some(entry) => {
                debug!(peer = %self.self_name(), local_id, finalizer_generation, "released exposed object");
                drop(entry);
            }
            None => debug!(
                peer = %self.self_name(),
                local_id,
                finalizer_generation,
                "stale finalize ignored"
            ),
        }
    }

    fn on_oob(&self, frame: OobFrame) {
        let handler = self
            .inner
            .oob_handler
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone();
        match handler {
            Some(handler) => handler(frame.oob),
            None => debug!(peer = %self.self_name(), "oob message with no handler"),
        }
    }

    fn reply(&self, frame: ResultFrame) {
        let id = frame.id;
        if let Err(e) = self.post(Message::Result(frame), None) {
            debug!(peer = %self.self_name(), id, error = %e, "result not sent");
        }
    }
}

//! Schema-driven RPC client.

use std::sync::Arc;

use rift::protocol::{codec, MessageHeader, MessageKind, Protocol};
use rift::rpc::{ApplicationError, ApplicationErrorKind};
use rift::schema::{MethodDef, Schema, TypeRef, SUCCESS_FIELD_ID};
use rift::value::{StructValue, Value};

use crate::error::{CallError, Result};

/// Client side of the processor: sends calls, decodes replies.
///
/// Sequence ids are chosen here and checked against the server's echo; the
/// input and output protocols may share a socket (via cloned handles) or be
/// entirely separate transports.
pub struct RpcClient {
    schema: Arc<Schema>,
    service: String,
    iprot: Box<dyn Protocol>,
    oprot: Box<dyn Protocol>,
    seqid: i32,
}

impl RpcClient {
    pub fn new(
        schema: Arc<Schema>,
        service: &str,
        iprot: Box<dyn Protocol>,
        oprot: Box<dyn Protocol>,
    ) -> Result<Self> {
        if schema.service_def(service).is_none() {
            return Err(CallError::UnknownService(service.to_string()));
        }
        Ok(Self {
            schema,
            service: service.to_string(),
            iprot,
            oprot,
            seqid: 0,
        })
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Invokes a method: send, then (for non-oneway) receive.
    ///
    /// Returns the success value, `None` for `void` and oneway methods.
    pub fn call(&mut self, method: &str, args: StructValue) -> Result<Option<Value>> {
        let def = self.lookup(method)?;
        let seqid = self.send(&def, args)?;
        if def.oneway {
            return Ok(None);
        }
        self.receive(&def, seqid)
    }

    /// Writes a `CALL` (or `ONEWAY`) message and flushes the transport.
    pub fn send(&mut self, method: &MethodDef, args: StructValue) -> Result<i32> {
        self.seqid = self.seqid.wrapping_add(1);
        let seqid = self.seqid;
        let header = MessageHeader {
            name: method.name.clone(),
            kind: if method.oneway {
                MessageKind::Oneway
            } else {
                MessageKind::Call
            },
            seqid,
        };
        tracing::trace!(method = %method.name, seqid, "sending call");
        codec::write_message(&mut *self.oprot, &self.schema, &header, &method.args, &args)?;
        self.oprot.flush()?;
        Ok(seqid)
    }

    /// Reads one reply for the given method and sequence id.
    pub fn receive(&mut self, method: &MethodDef, seqid: i32) -> Result<Option<Value>> {
        let header = self.iprot.read_message_begin()?;

        if header.kind == MessageKind::Exception {
            let exc = ApplicationError::read(&mut *self.iprot)?;
            self.iprot.read_message_end()?;
            return Err(CallError::Application(exc));
        }
        if header.kind != MessageKind::Reply {
            return Err(CallError::Application(ApplicationError::new(
                ApplicationErrorKind::InvalidMessageType,
                format!("unexpected message kind {:?}", header.kind),
            )));
        }
        if header.name != method.name {
            return Err(CallError::Application(ApplicationError::new(
                ApplicationErrorKind::WrongMethodName,
                format!("expected reply for `{}`, got `{}`", method.name, header.name),
            )));
        }
        if header.seqid != seqid {
            return Err(CallError::Application(ApplicationError::new(
                ApplicationErrorKind::BadSequenceId,
                format!("expected seqid {}, got {}", seqid, header.seqid),
            )));
        }

        let mut result = codec::read_struct(&mut *self.iprot, &self.schema, &method.result)?;
        self.iprot.read_message_end()?;

        if let Some(value) = result.take(SUCCESS_FIELD_ID) {
            return Ok(Some(value));
        }
        for field in method.throws() {
            if let Some(Value::Struct(exc)) = result.take(field.id) {
                let name = match self.schema.resolve_alias(&field.ty) {
                    TypeRef::Struct(name) => name.clone(),
                    _ => exc.ty.clone(),
                };
                return Err(CallError::Declared { name, value: exc });
            }
        }
        if method.returns.is_none() {
            return Ok(None);
        }
        Err(CallError::Application(ApplicationError::new(
            ApplicationErrorKind::MissingResult,
            format!("`{}` reply carried no result", method.name),
        )))
    }

    fn lookup(&self, method: &str) -> Result<Arc<MethodDef>> {
        self.schema
            .method(&self.service, method)
            .ok_or_else(|| CallError::UnknownMethod(method.to_string()))
    }
}

//! Server-side method dispatch.

use std::collections::HashMap;
use std::sync::Arc;

use super::{ApplicationError, ApplicationErrorKind};
use crate::error::{Result, RiftError};
use crate::protocol::{
    codec, skip, MessageHeader, MessageKind, Protocol, ProtocolResult, WireType,
};
use crate::schema::{MethodDef, Schema, TypeRef, SUCCESS_FIELD_ID};
use crate::value::{StructValue, Value};

/// What a handler may return: `Some` success value, `None` for void.
pub type HandlerResult = std::result::Result<Option<Value>, HandlerError>;

/// Error channel out of a handler.
#[derive(Debug)]
pub enum HandlerError {
    /// A thrown exception; encoded into the reply when its type matches one
    /// of the method's declared `throws` fields, otherwise reported as an
    /// internal error.
    Declared(StructValue),
    /// Anything else; becomes `INTERNAL_ERROR` on the wire.
    Internal(String),
}

pub type Handler = Box<dyn Fn(&StructValue) -> HandlerResult + Send + Sync>;

/// Dispatches incoming calls for one service against registered handlers.
///
/// The processor is shared across however many connection workers the host
/// runs; per-request state lives entirely on the protocol pair passed to
/// [`Processor::process`].
pub struct Processor {
    schema: Arc<Schema>,
    service: String,
    handlers: HashMap<String, Handler>,
}

impl Processor {
    pub fn new(schema: Arc<Schema>, service: &str) -> Result<Self> {
        if schema.service_def(service).is_none() {
            return Err(RiftError::UnknownService(service.to_string()));
        }
        Ok(Self {
            schema,
            service: service.to_string(),
            handlers: HashMap::new(),
        })
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Registers a handler for a method declared on the service (or one of
    /// its ancestors).
    pub fn register<F>(&mut self, method: &str, handler: F) -> Result<()>
    where
        F: Fn(&StructValue) -> HandlerResult + Send + Sync + 'static,
    {
        if self.schema.method(&self.service, method).is_none() {
            return Err(RiftError::UnknownMethod(method.to_string()));
        }
        self.handlers.insert(method.to_string(), Box::new(handler));
        Ok(())
    }

    /// Serves a single request from `iprot`, writing any reply to `oprot`.
    ///
    /// Returns `Ok(())` when the session may continue; protocol and
    /// transport errors propagate and end the session (`Eof` on the first
    /// header read is the clean-shutdown case).
    pub fn process(
        &self,
        iprot: &mut dyn Protocol,
        oprot: &mut dyn Protocol,
    ) -> ProtocolResult<()> {
        let header = iprot.read_message_begin()?;

        if !matches!(header.kind, MessageKind::Call | MessageKind::Oneway) {
            skip(iprot, WireType::Struct)?;
            iprot.read_message_end()?;
            tracing::warn!(method = %header.name, kind = ?header.kind, "unexpected message kind");
            return self.send_exception(
                oprot,
                &header,
                ApplicationError::new(
                    ApplicationErrorKind::InvalidMessageType,
                    format!("unexpected message kind {:?}", header.kind),
                ),
            );
        }

        let Some(method) = self.schema.method(&self.service, &header.name) else {
            skip(iprot, WireType::Struct)?;
            iprot.read_message_end()?;
            tracing::warn!(method = %header.name, "call for unknown method");
            return self.send_exception(
                oprot,
                &header,
                ApplicationError::new(
                    ApplicationErrorKind::UnknownMethod,
                    format!("unknown method `{}`", header.name),
                ),
            );
        };

        let args = codec::read_struct(iprot, &self.schema, &method.args)?;
        iprot.read_message_end()?;

        let outcome = match self.handlers.get(&header.name) {
            Some(handler) => handler(&args),
            None => Err(HandlerError::Internal(format!(
                "no handler registered for `{}`",
                header.name
            ))),
        };

        if method.oneway {
            // No reply path exists; failures are only logged.
            if let Err(e) = outcome {
                tracing::error!(method = %header.name, error = ?e, "oneway handler failed");
            }
            return Ok(());
        }

        match outcome {
            Ok(success) => {
                let mut result = StructValue::new(method.result.name.clone());
                match (&method.returns, success) {
                    (Some(_), Some(value)) => result.set(SUCCESS_FIELD_ID, value),
                    (None, _) => {}
                    (Some(_), None) => {
                        return self.send_exception(
                            oprot,
                            &header,
                            ApplicationError::new(
                                ApplicationErrorKind::MissingResult,
                                format!("handler for `{}` produced no result", header.name),
                            ),
                        );
                    }
                }
                self.send_reply(oprot, &header, &method, result)
            }
            Err(HandlerError::Declared(exc)) => {
                let declared = method.throws().find(|field| {
                    matches!(
                        self.schema.resolve_alias(&field.ty),
                        TypeRef::Struct(name) if *name == exc.ty
                    )
                });
                match declared {
                    Some(field) => {
                        let mut result = StructValue::new(method.result.name.clone());
                        result.set(field.id, Value::Struct(exc));
                        self.send_reply(oprot, &header, &method, result)
                    }
                    None => {
                        tracing::error!(
                            method = %header.name,
                            exception = %exc.ty,
                            "handler threw an undeclared exception"
                        );
                        self.send_exception(
                            oprot,
                            &header,
                            ApplicationError::new(
                                ApplicationErrorKind::InternalError,
                                format!("undeclared exception `{}`", exc.ty),
                            ),
                        )
                    }
                }
            }
            Err(HandlerError::Internal(message)) => {
                tracing::error!(method = %header.name, %message, "handler failed");
                self.send_exception(
                    oprot,
                    &header,
                    ApplicationError::new(ApplicationErrorKind::InternalError, message),
                )
            }
        }
    }

    fn send_reply(
        &self,
        oprot: &mut dyn Protocol,
        request: &MessageHeader,
        method: &MethodDef,
        result: StructValue,
    ) -> ProtocolResult<()> {
        let header = MessageHeader {
            name: request.name.clone(),
            kind: MessageKind::Reply,
            seqid: request.seqid,
        };
        codec::write_message(oprot, &self.schema, &header, &method.result, &result)?;
        oprot.flush()
    }

    fn send_exception(
        &self,
        oprot: &mut dyn Protocol,
        request: &MessageHeader,
        exc: ApplicationError,
    ) -> ProtocolResult<()> {
        let header = MessageHeader {
            name: request.name.clone(),
            kind: MessageKind::Exception,
            seqid: request.seqid,
        };
        oprot.write_message_begin(&header)?;
        exc.write(oprot)?;
        oprot.write_message_end()?;
        oprot.flush()
    }
}

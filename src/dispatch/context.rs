//! Per-request transaction context.

use crate::protocol::selftest::SelfTestRequest;
use crate::protocol::slmp::{ResponseFrame, SlmpFrame, StreamType};

/// A command object produced by a dispatch entry's decode function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlmpCommand {
    SelfTest(SelfTestRequest),
}

/// What a handler decided to do with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerHint {
    /// A response was produced and should be sent
    Continue,
    /// No response for this request
    Skip,
}

/// Scratch state for one request, alive from decode until the reply is sent.
///
/// Borrows the request frame and decoded command; owns the response once a
/// handler creates it.
#[derive(Debug)]
pub struct TransactionContext<'a> {
    pub stream: StreamType,
    /// Also carries the frame category, see [`SlmpFrame::category`]
    pub request: &'a SlmpFrame,
    /// `None` when the entry has no decoder or decoding failed
    pub command: Option<&'a SlmpCommand>,
    response: Option<ResponseFrame>,
}

impl<'a> TransactionContext<'a> {
    pub fn new(request: &'a SlmpFrame, command: Option<&'a SlmpCommand>) -> Self {
        Self {
            stream: request.stream,
            request,
            command,
            response: None,
        }
    }

    pub fn set_response(&mut self, response: ResponseFrame) {
        self.response = Some(response);
    }

    pub fn response(&self) -> Option<&ResponseFrame> {
        self.response.as_ref()
    }

    /// Ends the transaction, handing over the response if one was produced.
    pub fn into_response(self) -> Option<ResponseFrame> {
        self.response
    }
}

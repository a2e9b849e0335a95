//! Loopback test handler.

use crate::dispatch::context::{HandlerHint, SlmpCommand, TransactionContext};
use crate::dispatch::table::AddressWidth;
use crate::protocol::selftest::{SelfTestRequest, SelfTestResponse};
use crate::protocol::slmp::{ResponseFrame, SlmpError, StreamType};
use tracing::{debug, trace};

pub fn decode(raw: &[u8], stream: StreamType, _width: AddressWidth) -> Result<SlmpCommand, SlmpError> {
    SelfTestRequest::decode(raw, stream).map(SlmpCommand::SelfTest)
}

/// Echoes the loopback data back in a response addressed like the request.
pub fn handle(ctx: &mut TransactionContext<'_>) -> HandlerHint {
    let Some(SlmpCommand::SelfTest(request)) = ctx.command else {
        return HandlerHint::Skip;
    };

    let payload = match SelfTestResponse::echo(request).encode(ctx.stream) {
        Ok(payload) => payload,
        Err(e) => {
            debug!(error = %e, "Loopback response not encodable");
            return HandlerHint::Skip;
        }
    };
    trace!(bytes = request.data.len(), stream = %ctx.stream, "Loopback echo");

    ctx.set_response(ResponseFrame::for_request(ctx.request, payload));
    HandlerHint::Continue
}

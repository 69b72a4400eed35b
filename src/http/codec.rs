use crate::base::neterror::NetError;
use crate::http::request::ExecRequest;
use crate::http::response::HttpResponse;
use crate::socket::connection::ManagedConnection;
use futures::future::BoxFuture;

/// Writes a request onto an open connection and reads the response head.
///
/// Implementations either buffer the body into a full [`ResponseBody`]
/// or return a streaming one that keeps reading from the connection.
/// A one-shot request body must be taken with `take_stream` so the
/// execution chain can tell it has been spent.
///
/// [`ResponseBody`]: crate::http::responsebody::ResponseBody
pub trait WireCodec: Send + Sync {
    fn send<'a>(
        &'a self,
        request: &'a mut ExecRequest,
        connection: &'a mut dyn ManagedConnection,
    ) -> BoxFuture<'a, Result<HttpResponse, NetError>>;
}

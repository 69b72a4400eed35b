use crate::exec::context::ExecContext;
use crate::route::plan::Route;
use crate::socket::connection::AffinityToken;

/// Derives the affinity token for a connection after a completed call.
pub trait UserTokenHandler: Send + Sync {
    fn user_token(&self, route: &Route, ctx: &ExecContext) -> Option<AffinityToken>;
}

/// The principal of a completed connection-based scheme (target first,
/// then proxy). Connections authenticated that way are bound to it.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultUserTokenHandler;

impl UserTokenHandler for DefaultUserTokenHandler {
    fn user_token(&self, _route: &Route, ctx: &ExecContext) -> Option<AffinityToken> {
        [ctx.target_auth(), ctx.proxy_auth()].into_iter().find_map(|exchange| {
            let scheme = exchange.scheme()?;
            if !(scheme.is_complete() && scheme.is_connection_based()) {
                return None;
            }
            exchange.credentials().map(|c| AffinityToken::new(c.username()))
        })
    }
}

/// Keeps every connection stateless.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopUserTokenHandler;

impl UserTokenHandler for NoopUserTokenHandler {
    fn user_token(&self, _route: &Route, _ctx: &ExecContext) -> Option<AffinityToken> {
        None
    }
}

//! Route establishment and the CONNECT tunnel sub-protocol.

use crate::base::cancel::{abortable, CancellationToken};
use crate::base::neterror::NetError;
use crate::exec::context::ExecContext;
use crate::exec::mainexec::MainExec;
use crate::http::request::ExecRequest;
use crate::route::director::RouteStep;
use crate::route::plan::Route;
use crate::route::tracker::RouteTracker;
use crate::socket::connection::Lease;
use http::header::{HeaderValue, PROXY_AUTHORIZATION, USER_AGENT};
use http::Version;

impl MainExec {
    /// Drive the leased connection step by step onto `route`.
    pub(crate) async fn establish_route(
        &self,
        route: &Route,
        user_agent: Option<&HeaderValue>,
        ctx: &mut ExecContext,
        lease: &mut Lease,
        cancel: &CancellationToken,
    ) -> Result<(), NetError> {
        let connect_timeout = ctx.config().connect_timeout;
        let mut tracker = RouteTracker::for_route(route);
        loop {
            let fact = tracker.to_route();
            let step = self.director.next_step(route, fact.as_ref());
            tracing::debug!(route = %route, step = ?step, "route step");
            match step {
                RouteStep::ConnectTarget => {
                    abortable(cancel, self.manager.connect(lease, connect_timeout)).await?;
                    tracker.connect_target(route.is_secure());
                }
                RouteStep::ConnectProxy => {
                    abortable(cancel, self.manager.connect(lease, connect_timeout)).await?;
                    let proxy = route.first_hop().clone();
                    tracker.connect_proxy(proxy, false);
                }
                RouteStep::TunnelTarget => {
                    let secure = self.create_tunnel_to_target(route, user_agent, ctx, lease, cancel).await?;
                    tracing::debug!(route = %route, "tunnel to target created");
                    tracker.tunnel_target(secure);
                }
                RouteStep::TunnelProxy => return Err(NetError::ProxyChainUnsupported),
                RouteStep::LayerProtocol => {
                    abortable(cancel, self.manager.upgrade(lease)).await?;
                    tracker.layer_protocol(route.is_secure());
                }
                RouteStep::Unreachable => {
                    return Err(NetError::RouteUnreachable {
                        planned: route.to_string(),
                        current: fact.map_or_else(|| "none".to_string(), |r| r.to_string()),
                    });
                }
                RouteStep::Complete => return Ok(()),
            }
        }
    }

    /// Send CONNECT to the proxy until the tunnel is accepted, answering
    /// proxy challenges on the way. Returns whether the connection layer
    /// reports the tunnelled stream as secure.
    async fn create_tunnel_to_target(
        &self,
        route: &Route,
        user_agent: Option<&HeaderValue>,
        ctx: &mut ExecContext,
        lease: &mut Lease,
        cancel: &CancellationToken,
    ) -> Result<bool, NetError> {
        let target = route.target();
        let proxy = route.first_hop();
        let connect_timeout = ctx.config().connect_timeout;
        let authentication_enabled = ctx.config().authentication_enabled;

        let mut connect = ExecRequest::connect(&target.authority(), Version::HTTP_11)
            .map_err(|e| NetError::InvalidRequest(e.to_string()))?;
        if let Some(agent) = user_agent {
            connect.headers_mut().insert(USER_AGENT, agent.clone());
        }

        loop {
            if !lease.connection().is_open() {
                abortable(cancel, self.manager.connect(lease, connect_timeout)).await?;
            }
            connect.headers_mut().remove(PROXY_AUTHORIZATION);
            self.authenticator.generate_response(
                &mut connect,
                self.proxy_strategy.as_ref(),
                &mut ctx.proxy_auth,
            );

            tracing::debug!(proxy = %proxy, target = %target.authority(), "sending CONNECT");
            let mut response =
                abortable(cancel, self.codec.send(&mut connect, lease.connection_mut())).await?;
            let status = response.status();
            if status.as_u16() < 200 {
                return Err(NetError::Protocol(format!(
                    "Unexpected response to CONNECT request: {}",
                    status
                )));
            }

            if authentication_enabled
                && self.authenticator.is_challenge_present(
                    proxy,
                    &response,
                    self.proxy_strategy.as_ref(),
                    &mut ctx.proxy_auth,
                )
                && self.authenticator.handle_challenge(
                    proxy,
                    &response,
                    self.proxy_strategy.as_ref(),
                    &mut ctx.proxy_auth,
                )
            {
                if self.reuse.keep_alive(&connect, &response) {
                    tracing::debug!("connection kept alive");
                    abortable(cancel, response.body_mut().consume()).await?;
                } else {
                    lease.connection_mut().shutdown();
                }
                continue;
            }

            if status.as_u16() > 299 {
                let buffered = abortable(cancel, response.buffer()).await?;
                lease.connection_mut().shutdown();
                tracing::debug!(proxy = %proxy, status = %status, "tunnel refused");
                return Err(NetError::TunnelRefused(Box::new(buffered)));
            }

            return Ok(lease.connection().is_secure());
        }
    }
}

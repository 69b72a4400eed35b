//! The innermost executor: lease, establish, exchange, authenticate.

use crate::auth::authenticator::HttpAuthenticator;
use crate::auth::state::AuthProtocolState;
use crate::auth::strategy::AuthStrategy;
use crate::base::cancel::abortable;
use crate::base::neterror::NetError;
use crate::exec::context::ExecContext;
use crate::exec::usertoken::{DefaultUserTokenHandler, UserTokenHandler};
use crate::exec::ExecChain;
use crate::http::codec::WireCodec;
use crate::http::request::ExecRequest;
use crate::http::response::HttpResponse;
use crate::http::reuse::{DefaultKeepAliveStrategy, DefaultReuseStrategy, KeepAliveStrategy, ReuseStrategy};
use crate::route::director::{BasicRouteDirector, RouteDirector};
use crate::route::plan::Route;
use crate::socket::connection::ConnectionManager;
use crate::socket::holder::ConnectionHolder;
use futures::future::BoxFuture;
use http::header::{AUTHORIZATION, PROXY_AUTHORIZATION, USER_AGENT};
use std::sync::Arc;

/// Leases a connection for the route, brings it onto the route, and runs
/// the exchange until neither endpoint asks for authentication.
pub struct MainExec {
    pub(crate) manager: Arc<dyn ConnectionManager>,
    pub(crate) codec: Arc<dyn WireCodec>,
    pub(crate) reuse: Arc<dyn ReuseStrategy>,
    pub(crate) keep_alive: Arc<dyn KeepAliveStrategy>,
    pub(crate) director: Arc<dyn RouteDirector>,
    pub(crate) target_strategy: Arc<dyn AuthStrategy>,
    pub(crate) proxy_strategy: Arc<dyn AuthStrategy>,
    pub(crate) user_tokens: Arc<dyn UserTokenHandler>,
    pub(crate) authenticator: HttpAuthenticator,
}

impl MainExec {
    pub fn new(
        manager: Arc<dyn ConnectionManager>,
        codec: Arc<dyn WireCodec>,
        target_strategy: Arc<dyn AuthStrategy>,
        proxy_strategy: Arc<dyn AuthStrategy>,
    ) -> Self {
        Self {
            manager,
            codec,
            reuse: Arc::new(DefaultReuseStrategy),
            keep_alive: Arc::new(DefaultKeepAliveStrategy),
            director: Arc::new(BasicRouteDirector),
            target_strategy,
            proxy_strategy,
            user_tokens: Arc::new(DefaultUserTokenHandler),
            authenticator: HttpAuthenticator::new(),
        }
    }

    pub fn with_reuse_strategy(mut self, reuse: Arc<dyn ReuseStrategy>) -> Self {
        self.reuse = reuse;
        self
    }

    pub fn with_keep_alive_strategy(mut self, keep_alive: Arc<dyn KeepAliveStrategy>) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn with_director(mut self, director: Arc<dyn RouteDirector>) -> Self {
        self.director = director;
        self
    }

    pub fn with_user_token_handler(mut self, handler: Arc<dyn UserTokenHandler>) -> Self {
        self.user_tokens = handler;
        self
    }

    async fn run(
        &self,
        route: &Route,
        request: &mut ExecRequest,
        ctx: &mut ExecContext,
    ) -> Result<HttpResponse, NetError> {
        let cancel = ctx.cancel_token().clone();
        let config = ctx.config().clone();
        let state = ctx.user_token().cloned();
        let user_agent = request.headers().get(USER_AGENT).cloned();

        let lease = abortable(
            &cancel,
            self.manager.lease(route, state.as_ref(), config.connection_request_timeout),
        )
        .await?;
        let mut holder = ConnectionHolder::new(Arc::clone(&self.manager), lease);

        if config.stale_connection_check {
            let conn = holder.lease_mut()?.connection_mut();
            if conn.is_open() && conn.is_stale() {
                tracing::debug!(route = %route, "stale connection check failed, reopening");
                conn.shutdown();
            }
        }

        let mut exec_count = 0u32;
        let mut response = loop {
            exec_count += 1;
            if exec_count > 1 && !request.can_resend() {
                return Err(NetError::NonRepeatableRequest);
            }
            if cancel.is_cancelled() {
                return Err(NetError::Aborted);
            }

            let lease = holder.lease_mut()?;
            if !lease.connection().is_open() {
                tracing::debug!(route = %route, lease = lease.id(), "opening connection");
                self.establish_route(route, user_agent.as_ref(), ctx, lease, &cancel).await?;
            }
            lease.connection_mut().set_socket_timeout(config.socket_timeout);

            if cancel.is_cancelled() {
                return Err(NetError::Aborted);
            }

            if !request.headers().contains_key(AUTHORIZATION) {
                tracing::trace!(state = ?ctx.target_auth.state(), "target auth");
                self.authenticator.generate_response(
                    request,
                    self.target_strategy.as_ref(),
                    &mut ctx.target_auth,
                );
            }
            if !request.headers().contains_key(PROXY_AUTHORIZATION) && !route.is_tunnelled() {
                tracing::trace!(state = ?ctx.proxy_auth.state(), "proxy auth");
                self.authenticator.generate_response(
                    request,
                    self.proxy_strategy.as_ref(),
                    &mut ctx.proxy_auth,
                );
            }

            tracing::debug!(route = %route, attempt = exec_count, method = %request.method(), "executing request");
            let mut response =
                abortable(&cancel, self.codec.send(request, lease.connection_mut())).await?;

            if self.reuse.keep_alive(request, &response) {
                let valid_for = self.keep_alive.keep_alive_duration(&response);
                tracing::debug!(valid_for = ?valid_for, "connection can be kept alive");
                holder.set_valid_for(valid_for);
                holder.mark_reusable();
            } else {
                holder.mark_non_reusable();
            }

            if !self.needs_authentication(route, &response, ctx) {
                break response;
            }

            if holder.is_reusable() {
                abortable(&cancel, response.body_mut().consume()).await?;
            } else {
                holder.lease_mut()?.connection_mut().shutdown();
                if ctx.proxy_auth.state() == AuthProtocolState::Success
                    && ctx.proxy_auth.is_connection_based()
                {
                    tracing::debug!("resetting proxy auth state");
                    ctx.proxy_auth.reset();
                }
                if ctx.target_auth.state() == AuthProtocolState::Success
                    && ctx.target_auth.is_connection_based()
                {
                    tracing::debug!("resetting target auth state");
                    ctx.target_auth.reset();
                }
            }
            drop(response);

            if !request.original_headers().contains_key(AUTHORIZATION) {
                request.headers_mut().remove(AUTHORIZATION);
            }
            if !request.original_headers().contains_key(PROXY_AUTHORIZATION) {
                request.headers_mut().remove(PROXY_AUTHORIZATION);
            }
        };

        let token = match ctx.user_token().cloned() {
            Some(token) => Some(token),
            None => {
                let token = self.user_tokens.user_token(route, ctx);
                ctx.set_user_token(token.clone());
                token
            }
        };
        if token.is_some() {
            holder.set_state(token);
        }

        if response.body().is_streaming() {
            response.body_mut().attach_holder(holder);
        } else {
            holder.release_connection();
        }
        Ok(response)
    }

    fn needs_authentication(&self, route: &Route, response: &HttpResponse, ctx: &mut ExecContext) -> bool {
        if !ctx.config().authentication_enabled {
            return false;
        }
        let target = route.target();
        let proxy = route.proxy().unwrap_or(target);

        let target_challenged = self.authenticator.is_challenge_present(
            target,
            response,
            self.target_strategy.as_ref(),
            &mut ctx.target_auth,
        );
        let proxy_challenged = self.authenticator.is_challenge_present(
            proxy,
            response,
            self.proxy_strategy.as_ref(),
            &mut ctx.proxy_auth,
        );

        if target_challenged {
            return self.authenticator.handle_challenge(
                target,
                response,
                self.target_strategy.as_ref(),
                &mut ctx.target_auth,
            );
        }
        if proxy_challenged {
            return self.authenticator.handle_challenge(
                proxy,
                response,
                self.proxy_strategy.as_ref(),
                &mut ctx.proxy_auth,
            );
        }
        false
    }
}

impl ExecChain for MainExec {
    fn execute<'a>(
        &'a self,
        route: &'a Route,
        request: &'a mut ExecRequest,
        ctx: &'a mut ExecContext,
    ) -> BoxFuture<'a, Result<HttpResponse, NetError>> {
        Box::pin(self.run(route, request, ctx))
    }
}

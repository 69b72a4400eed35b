//! Route director: decides the next establishment step.
//!
//! The director is a pure function of the planned route and the route
//! established so far, so chains of any length are driven by the same
//! loop: connect the first hop, tunnel through it to the next, and finish
//! with an optional protocol layering step.

use crate::route::plan::Route;

/// Next action required to bring a connection onto the planned route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteStep {
    /// Open a connection straight to the target.
    ConnectTarget,
    /// Open a connection to the first proxy.
    ConnectProxy,
    /// Tunnel through the established chain to the target.
    TunnelTarget,
    /// Tunnel through the established chain to the next proxy.
    TunnelProxy,
    /// Layer a protocol (TLS) over the established stream.
    LayerProtocol,
    /// The established route matches the plan.
    Complete,
    /// The established route cannot be turned into the plan.
    Unreachable,
}

/// Maps (planned, established) to the next step.
pub trait RouteDirector: Send + Sync {
    fn next_step(&self, plan: &Route, fact: Option<&Route>) -> RouteStep;
}

/// Director for plain, proxied and tunnelled routes.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicRouteDirector;

impl RouteDirector for BasicRouteDirector {
    fn next_step(&self, plan: &Route, fact: Option<&Route>) -> RouteStep {
        match fact {
            None => first_step(plan),
            Some(fact) if plan.hop_count() > 1 => proxied_step(plan, fact),
            Some(fact) => direct_step(plan, fact),
        }
    }
}

fn first_step(plan: &Route) -> RouteStep {
    if plan.hop_count() > 1 {
        RouteStep::ConnectProxy
    } else {
        RouteStep::ConnectTarget
    }
}

fn direct_step(plan: &Route, fact: &Route) -> RouteStep {
    if fact.hop_count() > 1 || plan.target() != fact.target() {
        return RouteStep::Unreachable;
    }
    if plan.is_secure() != fact.is_secure() {
        return RouteStep::Unreachable;
    }
    RouteStep::Complete
}

fn proxied_step(plan: &Route, fact: &Route) -> RouteStep {
    let planned = plan.hop_count();
    let established = fact.hop_count();

    if established <= 1 || plan.target() != fact.target() || planned < established {
        return RouteStep::Unreachable;
    }
    let same_proxies =
        (0..established - 1).all(|hop| plan.hop_target(hop) == fact.hop_target(hop));
    if !same_proxies {
        return RouteStep::Unreachable;
    }
    if planned > established {
        return RouteStep::TunnelProxy;
    }

    // Same chain and target; tunnelling, layering and security remain.
    if (fact.is_tunnelled() && !plan.is_tunnelled()) || (fact.is_layered() && !plan.is_layered())
    {
        return RouteStep::Unreachable;
    }
    if plan.is_tunnelled() && !fact.is_tunnelled() {
        return RouteStep::TunnelTarget;
    }
    if plan.is_layered() && !fact.is_layered() {
        return RouteStep::LayerProtocol;
    }
    if plan.is_secure() != fact.is_secure() {
        return RouteStep::Unreachable;
    }
    RouteStep::Complete
}

// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! GradeMyProf Common
//!
//! Shared pieces of the auth bridge and the review API:
//!
//! - Fixed-window visitor tracking and per-policy rate limiters
//! - Axum middleware that enforces a limiter per client IP, honouring
//!   forwarding headers only from trusted proxies
//! - Injectable clocks for window and expiry arithmetic
//! - JSON wire types spoken between the two services

pub mod clock;
pub mod limiter;
pub mod middleware;
pub mod protocol;
pub mod proxy;
pub mod visitor;

pub use clock::{Clock, ManualClock, SystemClock};
pub use limiter::{RateLimitPolicy, RateLimitResult, RateLimiter};
pub use middleware::{client_identity, enforce_rate_limit};
pub use proxy::{ProxyParseError, TrustedProxies};
pub use visitor::{VisitorRecord, VisitorTracker};

//! API middleware stack.
//!
//! Execution order (outermost → innermost):
//! 1. Audit logger: sees every request, public ones included
//! 2. Auth validator: protected routes only, injects `Actor`

pub mod audit;
pub mod auth;

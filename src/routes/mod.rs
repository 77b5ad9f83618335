/// Router Module Index
///
/// Splits the routing table by access level. Access control is applied to each module
/// as a whole (via Axum layers in `create_router`), so a handler cannot end up exposed
/// by accident.

/// Routes accessible without a session: health probe, registration, login.
pub mod public;

/// Routes protected by the `AuthUser` middleware. Requires a valid, unrevoked token.
pub mod authenticated;
